//! Read-only container views.

use std::collections::HashMap;

use chrono::Utc;
use dockhand_common::api::{
    ContainerDetails, ContainerSummary, DockerVolumeSummary, MountInfo, PortBinding,
};
use dockhand_common::{ContainerEngine, ContainerRecord, ImageRecord, Result};
use futures::stream::{self, StreamExt};
use tracing::{debug, instrument, warn};

use crate::classify::{classify_status, scan_container_errors};
use crate::metrics;
use crate::resolve_container;

const SUMMARY_CONCURRENCY: usize = 8;

fn image_tags(record: &ContainerRecord, images: &HashMap<String, Vec<String>>) -> Vec<String> {
    match images.get(&record.image_id) {
        Some(tags) if !tags.is_empty() => tags.clone(),
        _ => vec![record.image.clone()],
    }
}

fn tag_index(images: Vec<ImageRecord>) -> HashMap<String, Vec<String>> {
    images.into_iter().map(|i| (i.id, i.tags)).collect()
}

async fn summarize(
    engine: &dyn ContainerEngine,
    record: &ContainerRecord,
    images: &HashMap<String, Vec<String>>,
) -> ContainerSummary {
    let (error_count, latest_error_message) =
        scan_container_errors(engine, &record.id, &record.name).await;

    let uptime_seconds = if record.is_running() {
        metrics::uptime_seconds(record.started_at.as_deref(), Utc::now())
    } else {
        None
    };

    ContainerSummary {
        id: record.short_id(),
        name: record.name.clone(),
        status: classify_status(&record.raw_status),
        image: image_tags(record, images),
        command: record
            .command
            .as_ref()
            .map(|cmd| cmd.join(" "))
            .unwrap_or_default(),
        created_at: record.created.clone(),
        uptime_seconds,
        ports: record
            .ports
            .iter()
            .map(|p| PortBinding {
                container_port: p.container_port.clone(),
                host_ip: p.host_ip.clone(),
                host_port: p.host_port.clone(),
            })
            .collect(),
        error_count,
        latest_error_message,
        volumes: record.mounts.len(),
    }
}

/// List containers as summaries. Image tags are looked up once; a failing
/// image listing falls back to each container's configured image.
#[instrument(skip(engine))]
pub async fn list_containers(
    engine: &dyn ContainerEngine,
    all: bool,
) -> Result<Vec<ContainerSummary>> {
    let records = engine.list_containers(all).await?;
    let images = match engine.list_images().await {
        Ok(images) => tag_index(images),
        Err(e) => {
            warn!(error = %e, "Could not list images for container tags");
            HashMap::new()
        }
    };

    let images = &images;
    let pending: Vec<_> = records
        .iter()
        .map(|record| summarize(engine, record, images))
        .collect();
    let summaries = stream::iter(pending)
        .buffered(SUMMARY_CONCURRENCY)
        .collect::<Vec<_>>()
        .await;
    debug!(count = summaries.len(), "Listed containers");
    Ok(summaries)
}

/// Full detail view. Live CPU and memory figures are sampled once when the
/// container runs; a failed sample leaves them at zero.
#[instrument(skip(engine))]
pub async fn container_details(
    engine: &dyn ContainerEngine,
    container: &str,
) -> Result<ContainerDetails> {
    let record = resolve_container(engine, container).await?;
    let images = match engine.inspect_image(&record.image_id).await {
        Ok(image) => HashMap::from([(image.id, image.tags)]),
        Err(_) => HashMap::new(),
    };
    let summary = summarize(engine, &record, &images).await;

    let (mut cpu_percent, mut memory_usage, mut memory_limit) = (0.0, 0, 0);
    if record.is_running() {
        match engine.stats_once(&record.id).await {
            Ok(sample) => {
                cpu_percent = metrics::sample_cpu_percent(&sample);
                memory_usage = sample.memory_stats.usage.unwrap_or(0);
                memory_limit = sample.memory_stats.limit.unwrap_or(0);
            }
            Err(e) => warn!(container = %record.name, error = %e, "Stats sample failed"),
        }
    }

    let ip_address = record
        .networks
        .values()
        .find_map(|n| n.ip_address.clone().filter(|ip| !ip.is_empty()))
        .or_else(|| record.ip_address.clone().filter(|ip| !ip.is_empty()))
        .unwrap_or_else(|| "N/A".to_string());

    Ok(ContainerDetails {
        summary,
        ip_address,
        network_mode: record
            .network_mode
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        created: record.created.clone(),
        platform: record
            .platform
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        cpu_percent,
        memory_usage,
        memory_limit,
        cpu_limit: metrics::cpu_limit_cores(record.cpu_quota, record.cpu_period),
        mounts: record
            .mounts
            .iter()
            .map(|m| MountInfo {
                source: m.source.clone(),
                destination: m.destination.clone(),
                mode: m.mode.clone(),
                mount_type: Some(m.mount_type.clone()),
            })
            .collect(),
        labels: record.labels.clone(),
        env: record.env.clone(),
        restart_policy: record.restart_policy.clone(),
        privileged: record.privileged.unwrap_or(false),
        log_path: record.log_path.clone(),
        entrypoint: record.entrypoint.as_ref().map(|e| e.join(" ")),
        pid: record.pid,
        exit_code: record.exit_code,
        state: Some(record.raw_status.clone()),
    })
}

/// Named volumes mounted by one container. Volumes removed from the engine
/// since the container was created are skipped.
#[instrument(skip(engine))]
pub async fn container_volumes(
    engine: &dyn ContainerEngine,
    container: &str,
) -> Result<Vec<DockerVolumeSummary>> {
    let record = resolve_container(engine, container).await?;
    let mut volumes = Vec::new();

    for mount in record.mounts.iter().filter(|m| m.mount_type == "volume") {
        let Some(name) = mount.name.as_deref() else {
            continue;
        };
        let volume = match engine.inspect_volume(name).await {
            Ok(volume) => volume,
            Err(e) if e.is_not_found() => {
                debug!(container = %record.name, volume = %name, "Mounted volume no longer exists");
                continue;
            }
            Err(e) => return Err(e),
        };
        volumes.push(DockerVolumeSummary {
            name: Some(volume.name),
            mount_type: mount.mount_type.clone(),
            source: mount.source.clone().unwrap_or_default(),
            destination: mount.destination.clone(),
            driver: Some(volume.driver),
            mountpoint: Some(volume.mountpoint),
            created_at: volume.created_at,
            size: None,
            labels: volume.labels,
            containers: Vec::new(),
        });
    }
    Ok(volumes)
}
