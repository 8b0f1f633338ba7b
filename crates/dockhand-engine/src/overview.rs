//! Cross-cutting views over containers, images, volumes and networks.
//!
//! Aggregations are point-in-time and best-effort per item: one container
//! whose logs or stats cannot be read is skipped, never fatal.

use std::collections::HashSet;

use dockhand_common::api::{
    ContainerStats, DockerImageSummary, DockerNetworkOverview, DockerOverview,
    DockerVolumeSummary, GraphLink, GraphNode, ImageContainerInfo, NetworkContainerInfo,
    NetworkGraph, NetworkSelectItem, VolumeContainerInfo, VolumeSelectItem, VolumeSelectList,
};
use dockhand_common::{ContainerEngine, ContainerRecord, ImageRecord, LogQuery, Result};
use tracing::{debug, instrument, warn};

use crate::classify::classify_status;
use crate::metrics;

/// Networks the engine manages itself; hidden from the overview.
pub const PROTECTED_NETWORKS: [&str; 3] = ["bridge", "host", "none"];

/// Trailing lines sampled per container for the log volume estimate.
pub const LOG_SAMPLE_LINES: usize = 1000;

pub const TOP_CONTAINERS: usize = 4;

fn truncate_id(id: &str) -> String {
    id.chars().take(12).collect()
}

#[instrument(skip(engine))]
pub async fn docker_overview(engine: &dyn ContainerEngine) -> Result<DockerOverview> {
    let (version, _) = engine.version().await?;
    let containers = engine.list_containers(true).await?;
    let images = engine.list_images().await?;
    let volumes = engine.list_volumes().await?;

    let is_swarm_active = match engine.swarm_state().await {
        Ok(state) => state.as_deref() == Some("active"),
        Err(e) => {
            debug!(error = %e, "Swarm state unavailable");
            false
        }
    };

    let mut logs_count = 0;
    for container in &containers {
        match engine
            .container_logs(&container.id, LogQuery::tail(LOG_SAMPLE_LINES))
            .await
        {
            Ok(lines) => logs_count += lines.len(),
            Err(e) => warn!(container = %container.name, error = %e, "Skipping log count"),
        }
    }

    Ok(DockerOverview {
        version,
        total_containers: containers.len(),
        running_containers: containers.iter().filter(|c| c.raw_status == "running").count(),
        failed_containers: containers.iter().filter(|c| c.raw_status == "exited").count(),
        images: images.len(),
        volumes: volumes.len(),
        logs_count,
        is_swarm_active,
    })
}

/// User networks with their member containers.
#[instrument(skip(engine))]
pub async fn network_overview(engine: &dyn ContainerEngine) -> Result<Vec<DockerNetworkOverview>> {
    let networks = engine.list_networks().await?;
    let containers = engine.list_containers(true).await?;

    let overview = networks
        .into_iter()
        .filter(|n| !PROTECTED_NETWORKS.contains(&n.name.as_str()))
        .map(|network| {
            let members: Vec<NetworkContainerInfo> = containers
                .iter()
                .filter_map(|c| {
                    c.networks.get(&network.name).map(|endpoint| NetworkContainerInfo {
                        id: c.id.clone(),
                        name: c.name.clone(),
                        status: c.raw_status.clone(),
                        ipv4_address: endpoint.ip_address.clone(),
                    })
                })
                .collect();
            let running = members.iter().filter(|m| m.status == "running").count();
            DockerNetworkOverview {
                id: network.id,
                name: network.name,
                driver: network.driver,
                scope: network.scope,
                labels: network.labels,
                internal: network.internal,
                attachable: network.attachable,
                containers_count: members.len(),
                running_containers_count: running,
                containers: members,
            }
        })
        .collect();
    Ok(overview)
}

/// Container/network adjacency graph.
///
/// A container attached to several networks is clustered under the last
/// one visited; networks are visited in name order.
#[instrument(skip(engine))]
pub async fn network_graph(engine: &dyn ContainerEngine) -> Result<NetworkGraph> {
    let containers = engine.list_containers(true).await?;

    let mut graph = NetworkGraph::default();
    let mut seen_networks = HashSet::new();

    for container in &containers {
        let container_id = truncate_id(&container.id);
        let mut cluster_id = None;

        for (network_name, endpoint) in &container.networks {
            let network_id = truncate_id(endpoint.network_id.as_deref().unwrap_or_default());
            if network_id.is_empty() {
                continue;
            }
            if seen_networks.insert(network_id.clone()) {
                graph.nodes.push(GraphNode::Network {
                    id: network_id.clone(),
                    label: network_name.clone(),
                });
            }
            graph.links.push(GraphLink {
                source: network_id.clone(),
                target: container_id.clone(),
            });
            cluster_id = Some(network_id);
        }

        graph.nodes.push(GraphNode::Container {
            id: container_id,
            label: container.name.clone(),
            status: container.raw_status.clone(),
            cluster_id,
        });
    }
    Ok(graph)
}

/// Build an image summary listing the containers created from it.
pub fn image_summary(image: ImageRecord, containers: &[ContainerRecord]) -> DockerImageSummary {
    let used_by = containers
        .iter()
        .filter(|c| c.image_id == image.id)
        .map(|c| ImageContainerInfo {
            id: c.id.clone(),
            name: c.name.clone(),
            status: classify_status(&c.raw_status),
        })
        .collect();
    DockerImageSummary {
        id: image.short_id(),
        tags: image.tags,
        size: image.size,
        created: image.created,
        architecture: image.architecture,
        os: image.os,
        containers: used_by,
    }
}

#[instrument(skip(engine))]
pub async fn list_images(engine: &dyn ContainerEngine) -> Result<Vec<DockerImageSummary>> {
    let images = engine.list_images().await?;
    let containers = engine.list_containers(true).await?;
    Ok(images
        .into_iter()
        .map(|image| image_summary(image, &containers))
        .collect())
}

#[instrument(skip(engine))]
pub async fn list_volumes(engine: &dyn ContainerEngine) -> Result<Vec<DockerVolumeSummary>> {
    let volumes = engine.list_volumes().await?;
    let containers = engine.list_containers(true).await?;

    Ok(volumes
        .into_iter()
        .map(|volume| {
            let users = containers
                .iter()
                .filter_map(|c| {
                    c.mounts
                        .iter()
                        .find(|m| m.name.as_deref() == Some(volume.name.as_str()))
                        .map(|m| VolumeContainerInfo {
                            id: c.id.clone(),
                            name: c.name.clone(),
                            status: classify_status(&c.raw_status),
                            mountpoint: m.destination.clone(),
                        })
                })
                .collect();
            DockerVolumeSummary {
                name: Some(volume.name.clone()),
                mount_type: "volume".to_string(),
                source: volume.name.clone(),
                destination: format!("/var/lib/docker/volumes/{}/_data", volume.name),
                driver: Some(volume.driver),
                mountpoint: Some(volume.mountpoint),
                created_at: volume.created_at,
                size: None,
                labels: volume.labels,
                containers: users,
            }
        })
        .collect())
}

pub async fn volumes_lite(engine: &dyn ContainerEngine) -> Result<VolumeSelectList> {
    let volumes = engine.list_volumes().await?;
    Ok(VolumeSelectList {
        volumes: volumes
            .into_iter()
            .map(|v| VolumeSelectItem {
                id: v.name.clone(),
                name: v.name,
            })
            .collect(),
    })
}

pub async fn networks_lite(engine: &dyn ContainerEngine) -> Result<Vec<NetworkSelectItem>> {
    let networks = engine.list_networks().await?;
    Ok(networks
        .into_iter()
        .map(|n| NetworkSelectItem {
            id: n.id,
            name: n.name,
            gateway: n.gateway,
        })
        .collect())
}

/// Busiest running containers by CPU, one stats sample each.
#[instrument(skip(engine))]
pub async fn top_containers(engine: &dyn ContainerEngine) -> Result<Vec<ContainerStats>> {
    let containers = engine.list_containers(false).await?;

    let mut stats = Vec::new();
    for container in containers.iter().filter(|c| c.is_running()) {
        let sample = match engine.stats_once(&container.id).await {
            Ok(sample) => sample,
            Err(e) => {
                warn!(container = %container.name, error = %e, "Skipping stats");
                continue;
            }
        };
        stats.push(ContainerStats {
            id: container.short_id(),
            name: container.name.clone(),
            cpu: metrics::sample_cpu_percent(&sample),
            memory: metrics::memory_percent(
                sample.memory_stats.usage.unwrap_or(0),
                sample.memory_stats.limit.unwrap_or(0),
            ),
        });
    }

    stats.sort_by(|a, b| b.cpu.total_cmp(&a.cpu));
    stats.truncate(TOP_CONTAINERS);
    Ok(stats)
}
