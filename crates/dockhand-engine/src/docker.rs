use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions, LogOutput,
    LogsOptions, RemoveContainerOptions, RestartContainerOptions, StartContainerOptions, Stats,
    StatsOptions, StopContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};
use bollard::image::{CreateImageOptions, ListImagesOptions, RemoveImageOptions};
use bollard::models::{
    ContainerInspectResponse, EndpointIpamConfig, EndpointSettings, HostConfig, Mount,
    MountTypeEnum, Network, PortBinding, RestartPolicyNameEnum, Volume,
};
use bollard::network::{
    ConnectNetworkOptions, CreateNetworkOptions, DisconnectNetworkOptions, InspectNetworkOptions,
    ListNetworksOptions,
};
use bollard::volume::{CreateVolumeOptions, ListVolumesOptions, RemoveVolumeOptions};
use bollard::Docker;
use dockhand_common::{
    ContainerConfig, ContainerEngine, ContainerRecord, DockhandError, EndpointRecord,
    ExecChannel, HostPortBinding, ImageRecord, LogQuery, LogTail, MountRecord, MountType,
    NetworkMember, NetworkRecord, NetworkSpec, PortRecord, PullProgress, Result, StatsSample,
    VolumeRecord, VolumeSpec,
};
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

// --- Custom Error Type ---
#[derive(Error, Debug)]
pub enum DockerError {
    #[error("Docker API error: {0}")]
    Api(#[from] BollardError),
    #[error("Stats payload could not be decoded: {0}")]
    StatsDecode(#[source] serde_json::Error),
    #[error("Exec session for '{0}' started detached")]
    ExecDetached(String),
}

impl From<DockerError> for DockhandError {
    fn from(err: DockerError) -> Self {
        match err {
            DockerError::Api(e) => map_bollard_error(e),
            other => DockhandError::Internal(other.to_string()),
        }
    }
}

/// Translate a bollard error into the shared error taxonomy.
pub fn map_bollard_error(err: BollardError) -> DockhandError {
    match err {
        BollardError::DockerResponseServerError {
            status_code: 404,
            message,
        } => DockhandError::NotFound(message),
        BollardError::DockerResponseServerError {
            status_code: 409,
            message,
        } => DockhandError::Conflict(message),
        BollardError::DockerResponseServerError {
            status_code: 304,
            message,
        } => DockhandError::PreconditionFailed(message),
        BollardError::DockerResponseServerError {
            status_code: 400,
            message,
        } => DockhandError::InvalidRequest(message),
        BollardError::DockerResponseServerError { message, .. } => DockhandError::Engine(message),
        BollardError::IOError { err } => DockhandError::EngineUnavailable(err.to_string()),
        BollardError::RequestTimeoutError => {
            DockhandError::EngineUnavailable("request to Docker timed out".to_string())
        }
        other if is_connection_failure(&other) => {
            DockhandError::EngineUnavailable(other.to_string())
        }
        other => DockhandError::Engine(other.to_string()),
    }
}

fn is_connection_failure(err: &(dyn std::error::Error + 'static)) -> bool {
    use std::io::ErrorKind;

    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            return matches!(
                io.kind(),
                ErrorKind::ConnectionRefused
                    | ErrorKind::ConnectionReset
                    | ErrorKind::NotFound
                    | ErrorKind::PermissionDenied
                    | ErrorKind::TimedOut
            );
        }
        current = e.source();
    }
    false
}

// --- DockerEngine Implementation ---

#[derive(Clone)]
pub struct DockerEngine {
    docker_client: Arc<Docker>,
}

impl DockerEngine {
    pub fn new(docker_client: Arc<Docker>) -> Self {
        Self { docker_client }
    }

    /// Connect using `DOCKER_HOST` or the platform's default socket.
    pub fn connect_local() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults().map_err(DockerError::Api)?;
        Ok(Self::new(Arc::new(docker)))
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn ping(&self) -> Result<()> {
        self.docker_client.ping().await.map_err(DockerError::Api)?;
        Ok(())
    }

    async fn version(&self) -> Result<(String, String)> {
        let version = self.docker_client.version().await.map_err(DockerError::Api)?;
        Ok((
            version.version.unwrap_or_else(|| "unknown".to_string()),
            version.api_version.unwrap_or_else(|| "unknown".to_string()),
        ))
    }

    async fn swarm_state(&self) -> Result<Option<String>> {
        let info = self.docker_client.info().await.map_err(DockerError::Api)?;
        Ok(info
            .swarm
            .and_then(|swarm| swarm.local_node_state)
            .map(|state| state.to_string()))
    }

    #[instrument(skip(self))]
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerRecord>> {
        let summaries = self
            .docker_client
            .list_containers(Some(ListContainersOptions::<String> {
                all,
                ..Default::default()
            }))
            .await
            .map_err(DockerError::Api)?;

        let ids: Vec<String> = summaries.into_iter().filter_map(|s| s.id).collect();
        let inspected: Vec<Result<ContainerRecord>> = stream::iter(ids)
            .map(|id| async move { self.inspect_container(&id).await })
            .buffered(8)
            .collect()
            .await;

        Ok(collect_inspected(inspected))
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerRecord> {
        let response = self
            .docker_client
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(DockerError::Api)?;
        Ok(container_record(response))
    }

    #[instrument(skip(self, query), fields(container = %id))]
    async fn container_logs(&self, id: &str, query: LogQuery) -> Result<Vec<String>> {
        let options = LogsOptions::<String> {
            follow: false,
            stdout: true,
            stderr: true,
            since: query.since.unwrap_or(0),
            until: query.until.unwrap_or(0),
            timestamps: query.timestamps,
            tail: match query.tail {
                LogTail::All => "all".to_string(),
                LogTail::Lines(n) => n.to_string(),
            },
        };

        let chunks: Vec<LogOutput> = self
            .docker_client
            .logs(id, Some(options))
            .try_collect()
            .await
            .map_err(DockerError::Api)?;

        let mut raw = Vec::new();
        for chunk in chunks {
            raw.extend_from_slice(&chunk.into_bytes());
        }
        Ok(String::from_utf8_lossy(&raw)
            .lines()
            .map(str::to_string)
            .collect())
    }

    fn stats_stream(&self, id: &str) -> BoxStream<'static, Result<StatsSample>> {
        let docker = self.docker_client.clone();
        let id = id.to_string();
        Box::pin(async_stream::stream! {
            let mut stats = Box::pin(docker.stats(
                &id,
                Some(StatsOptions {
                    stream: true,
                    one_shot: false,
                }),
            ));
            while let Some(item) = stats.next().await {
                yield item
                    .map_err(|e| DockhandError::from(DockerError::Api(e)))
                    .and_then(stats_sample);
            }
        })
    }

    async fn stats_once(&self, id: &str) -> Result<StatsSample> {
        let mut stats = Box::pin(self.docker_client.stats(
            id,
            Some(StatsOptions {
                stream: false,
                one_shot: false,
            }),
        ));
        match stats.next().await {
            Some(item) => stats_sample(item.map_err(DockerError::Api)?),
            None => Err(DockhandError::Engine(format!(
                "Docker returned no stats for container '{id}'"
            ))),
        }
    }

    #[instrument(skip(self))]
    async fn start_container(&self, id: &str) -> Result<()> {
        self.docker_client
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(DockerError::Api)?;
        info!(container = %id, "Container started");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn stop_container(&self, id: &str) -> Result<()> {
        self.docker_client
            .stop_container(id, None::<StopContainerOptions>)
            .await
            .map_err(DockerError::Api)?;
        info!(container = %id, "Container stopped");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn restart_container(&self, id: &str) -> Result<()> {
        self.docker_client
            .restart_container(id, None::<RestartContainerOptions>)
            .await
            .map_err(DockerError::Api)?;
        info!(container = %id, "Container restarted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_container(&self, id: &str, force: bool) -> Result<()> {
        self.docker_client
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force,
                    ..Default::default()
                }),
            )
            .await
            .map_err(DockerError::Api)?;
        info!(container = %id, force, "Container removed");
        Ok(())
    }

    #[instrument(skip(self, config), fields(container = %config.name, image = %config.image))]
    async fn create_container(&self, config: &ContainerConfig) -> Result<String> {
        let created = self
            .docker_client
            .create_container(
                Some(CreateContainerOptions {
                    name: config.name.clone(),
                    ..Default::default()
                }),
                create_body(config),
            )
            .await
            .map_err(DockerError::Api)?;
        for warning in &created.warnings {
            warn!(container = %config.name, %warning, "Docker reported a create warning");
        }
        info!(container_id = %created.id, "Container created");
        Ok(created.id)
    }

    async fn list_networks(&self) -> Result<Vec<NetworkRecord>> {
        let networks = self
            .docker_client
            .list_networks(None::<ListNetworksOptions<String>>)
            .await
            .map_err(DockerError::Api)?;
        let mut records: Vec<NetworkRecord> = networks.into_iter().map(network_record).collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    async fn inspect_network(&self, id: &str) -> Result<NetworkRecord> {
        let network = self
            .docker_client
            .inspect_network(id, None::<InspectNetworkOptions<String>>)
            .await
            .map_err(DockerError::Api)?;
        Ok(network_record(network))
    }

    #[instrument(skip(self, spec), fields(network = %spec.name))]
    async fn create_network(&self, spec: &NetworkSpec) -> Result<()> {
        self.docker_client
            .create_network(CreateNetworkOptions {
                name: spec.name.clone(),
                check_duplicate: spec.check_duplicate,
                driver: spec.driver.clone().unwrap_or_else(|| "bridge".to_string()),
                labels: spec.labels.clone().into_iter().collect(),
                ..Default::default()
            })
            .await
            .map_err(DockerError::Api)?;
        info!(network = %spec.name, "Network created");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove_network(&self, id: &str) -> Result<()> {
        self.docker_client
            .remove_network(id)
            .await
            .map_err(DockerError::Api)?;
        info!(network = %id, "Network removed");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn connect_network(
        &self,
        network: &str,
        container: &str,
        ipv4_address: Option<&str>,
    ) -> Result<()> {
        let endpoint_config = EndpointSettings {
            ipam_config: ipv4_address.map(|ip| EndpointIpamConfig {
                ipv4_address: Some(ip.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        self.docker_client
            .connect_network(
                network,
                ConnectNetworkOptions {
                    container: container.to_string(),
                    endpoint_config,
                },
            )
            .await
            .map_err(DockerError::Api)?;
        info!(%network, %container, "Container connected to network");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn disconnect_network(&self, network: &str, container: &str) -> Result<()> {
        self.docker_client
            .disconnect_network(
                network,
                DisconnectNetworkOptions {
                    container: container.to_string(),
                    force: false,
                },
            )
            .await
            .map_err(DockerError::Api)?;
        info!(%network, %container, "Container disconnected from network");
        Ok(())
    }

    async fn list_volumes(&self) -> Result<Vec<VolumeRecord>> {
        let response = self
            .docker_client
            .list_volumes(None::<ListVolumesOptions<String>>)
            .await
            .map_err(DockerError::Api)?;
        let mut records: Vec<VolumeRecord> = response
            .volumes
            .unwrap_or_default()
            .into_iter()
            .map(volume_record)
            .collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    async fn inspect_volume(&self, name: &str) -> Result<VolumeRecord> {
        let volume = self
            .docker_client
            .inspect_volume(name)
            .await
            .map_err(DockerError::Api)?;
        Ok(volume_record(volume))
    }

    #[instrument(skip(self, spec), fields(volume = %spec.name))]
    async fn create_volume(&self, spec: &VolumeSpec) -> Result<VolumeRecord> {
        let volume = self
            .docker_client
            .create_volume(CreateVolumeOptions {
                name: spec.name.clone(),
                driver: spec.driver.clone().unwrap_or_else(|| "local".to_string()),
                driver_opts: spec.driver_opts.clone().into_iter().collect(),
                labels: spec.labels.clone().into_iter().collect(),
                ..Default::default()
            })
            .await
            .map_err(DockerError::Api)?;
        info!(volume = %volume.name, "Volume created");
        Ok(volume_record(volume))
    }

    #[instrument(skip(self))]
    async fn remove_volume(&self, name: &str) -> Result<()> {
        self.docker_client
            .remove_volume(name, Some(RemoveVolumeOptions { force: false }))
            .await
            .map_err(DockerError::Api)?;
        info!(volume = %name, "Volume removed");
        Ok(())
    }

    async fn list_images(&self) -> Result<Vec<ImageRecord>> {
        let summaries = self
            .docker_client
            .list_images(Some(ListImagesOptions::<String> {
                all: false,
                ..Default::default()
            }))
            .await
            .map_err(DockerError::Api)?;

        let mut records = Vec::with_capacity(summaries.len());
        for summary in summaries {
            // The summary lacks platform fields; inspect fills them in.
            match self.inspect_image(&summary.id).await {
                Ok(record) => records.push(record),
                Err(e) => {
                    debug!(image = %summary.id, error = %e, "Falling back to image summary");
                    records.push(ImageRecord {
                        id: summary.id,
                        tags: summary.repo_tags,
                        repo_digests: summary.repo_digests,
                        size: summary.size,
                        created: chrono::DateTime::from_timestamp(summary.created, 0)
                            .map(|dt| dt.to_rfc3339()),
                        architecture: None,
                        os: None,
                    });
                }
            }
        }
        Ok(records)
    }

    async fn inspect_image(&self, reference: &str) -> Result<ImageRecord> {
        let image = self
            .docker_client
            .inspect_image(reference)
            .await
            .map_err(DockerError::Api)?;
        Ok(ImageRecord {
            id: image.id.unwrap_or_default(),
            tags: image.repo_tags.unwrap_or_default(),
            repo_digests: image.repo_digests.unwrap_or_default(),
            size: image.size.unwrap_or(0),
            created: image.created,
            architecture: image.architecture,
            os: image.os,
        })
    }

    #[instrument(skip(self))]
    async fn remove_image(&self, id: &str, force: bool) -> Result<()> {
        self.docker_client
            .remove_image(
                id,
                Some(RemoveImageOptions {
                    force,
                    noprune: false,
                }),
                None,
            )
            .await
            .map_err(DockerError::Api)?;
        info!(image = %id, "Image removed");
        Ok(())
    }

    fn pull_image(&self, repository: &str, tag: &str) -> BoxStream<'static, Result<PullProgress>> {
        let docker = self.docker_client.clone();
        let repository = repository.to_string();
        let tag = tag.to_string();
        Box::pin(async_stream::stream! {
            let mut events = Box::pin(docker.create_image(
                Some(CreateImageOptions {
                    from_image: repository.clone(),
                    tag: tag.clone(),
                    ..Default::default()
                }),
                None,
                None,
            ));
            while let Some(event) = events.next().await {
                yield event
                    .map(|info| {
                        let detail = info.progress_detail.unwrap_or_default();
                        PullProgress {
                            id: info.id,
                            status: info.status,
                            progress: info.progress,
                            current: detail.current,
                            total: detail.total,
                            error: info.error,
                        }
                    })
                    .map_err(|e| DockhandError::from(DockerError::Api(e)));
            }
        })
    }

    #[instrument(skip(self, cmd))]
    async fn open_exec(&self, container: &str, cmd: Vec<String>) -> Result<ExecChannel> {
        let exec = self
            .docker_client
            .create_exec(
                container,
                CreateExecOptions {
                    attach_stdin: Some(true),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    tty: Some(true),
                    cmd: Some(cmd),
                    ..Default::default()
                },
            )
            .await
            .map_err(DockerError::Api)?;

        let started = self
            .docker_client
            .start_exec(
                &exec.id,
                Some(StartExecOptions {
                    detach: false,
                    ..Default::default()
                }),
            )
            .await
            .map_err(DockerError::Api)?;

        match started {
            StartExecResults::Attached { output, input } => {
                info!(%container, exec_id = %exec.id, "Exec session attached");
                Ok(ExecChannel {
                    output: output
                        .map(|chunk| {
                            chunk
                                .map(|out| out.into_bytes().to_vec())
                                .map_err(|e| DockhandError::from(DockerError::Api(e)))
                        })
                        .boxed(),
                    input,
                })
            }
            StartExecResults::Detached => {
                Err(DockerError::ExecDetached(container.to_string()).into())
            }
        }
    }
}

/// Keep the containers that could be inspected. One failing container
/// must not hide all the others.
fn collect_inspected(inspected: Vec<Result<ContainerRecord>>) -> Vec<ContainerRecord> {
    let mut records = Vec::with_capacity(inspected.len());
    for result in inspected {
        match result {
            Ok(record) => records.push(record),
            // Removed between list and inspect.
            Err(e) if e.is_not_found() => {
                debug!(error = %e, "Container vanished during listing")
            }
            Err(e) => warn!(error = %e, "Skipping container that could not be inspected"),
        }
    }
    records
}

fn stats_sample(stats: Stats) -> Result<StatsSample> {
    serde_json::to_value(&stats)
        .and_then(serde_json::from_value)
        .map_err(|e| DockerError::StatsDecode(e).into())
}

fn restart_policy_name(name: &str) -> RestartPolicyNameEnum {
    match name {
        "always" => RestartPolicyNameEnum::ALWAYS,
        "unless-stopped" => RestartPolicyNameEnum::UNLESS_STOPPED,
        "on-failure" => RestartPolicyNameEnum::ON_FAILURE,
        "no" => RestartPolicyNameEnum::NO,
        _ => RestartPolicyNameEnum::EMPTY,
    }
}

/// Build the engine's create payload from a recreatable configuration.
fn create_body(config: &ContainerConfig) -> Config<String> {
    let exposed_ports: HashMap<String, HashMap<(), ()>> = config
        .port_bindings
        .keys()
        .map(|port| (port.clone(), HashMap::new()))
        .collect();

    let port_bindings: HashMap<String, Option<Vec<PortBinding>>> = config
        .port_bindings
        .iter()
        .map(|(port, bindings)| {
            let bindings = bindings
                .iter()
                .map(|b| PortBinding {
                    host_ip: b.host_ip.clone(),
                    host_port: Some(b.host_port.clone()),
                })
                .collect();
            (port.clone(), Some(bindings))
        })
        .collect();

    let mounts: Vec<Mount> = config
        .mounts
        .iter()
        .map(|m| Mount {
            target: Some(m.target.clone()),
            source: Some(m.source.clone()),
            typ: Some(match m.mount_type {
                MountType::Volume => MountTypeEnum::VOLUME,
                MountType::Bind => MountTypeEnum::BIND,
            }),
            read_only: Some(m.read_only),
            ..Default::default()
        })
        .collect();

    Config {
        image: Some(config.image.clone()),
        cmd: config.command.clone(),
        entrypoint: config.entrypoint.clone(),
        env: (!config.env.is_empty()).then(|| config.env.clone()),
        labels: (!config.labels.is_empty())
            .then(|| config.labels.clone().into_iter().collect()),
        working_dir: config.working_dir.clone(),
        user: config.user.clone(),
        tty: Some(config.tty),
        exposed_ports: (!exposed_ports.is_empty()).then_some(exposed_ports),
        host_config: Some(HostConfig {
            port_bindings: (!port_bindings.is_empty()).then_some(port_bindings),
            restart_policy: Some(bollard::models::RestartPolicy {
                name: Some(restart_policy_name(&config.restart_policy.name)),
                maximum_retry_count: Some(config.restart_policy.maximum_retry_count),
            }),
            mounts: (!mounts.is_empty()).then_some(mounts),
            network_mode: config.network_mode.clone(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn container_record(response: ContainerInspectResponse) -> ContainerRecord {
    let config = response.config.unwrap_or_default();
    let state = response.state.unwrap_or_default();
    let host_config = response.host_config.unwrap_or_default();
    let network_settings = response.network_settings.unwrap_or_default();

    let mounts = response
        .mounts
        .unwrap_or_default()
        .into_iter()
        .map(|m| MountRecord {
            mount_type: m.typ.map(|t| t.to_string()).unwrap_or_default(),
            name: m.name.filter(|n| !n.is_empty()),
            source: m.source.filter(|s| !s.is_empty()),
            destination: m.destination.unwrap_or_default(),
            mode: m.mode,
            rw: m.rw.unwrap_or(true),
        })
        .collect();

    let mut ports = Vec::new();
    let mut port_map: Vec<(String, Option<Vec<PortBinding>>)> =
        network_settings.ports.unwrap_or_default().into_iter().collect();
    port_map.sort_by(|a, b| a.0.cmp(&b.0));
    for (container_port, bindings) in port_map {
        match bindings.filter(|b| !b.is_empty()) {
            Some(bindings) => {
                for binding in bindings {
                    ports.push(PortRecord {
                        container_port: container_port.clone(),
                        host_ip: binding.host_ip,
                        host_port: binding.host_port,
                    });
                }
            }
            None => ports.push(PortRecord {
                container_port,
                host_ip: None,
                host_port: None,
            }),
        }
    }

    let networks: BTreeMap<String, EndpointRecord> = network_settings
        .networks
        .unwrap_or_default()
        .into_iter()
        .map(|(name, endpoint)| {
            (
                name,
                EndpointRecord {
                    network_id: endpoint.network_id.filter(|id| !id.is_empty()),
                    ip_address: endpoint.ip_address.filter(|ip| !ip.is_empty()),
                },
            )
        })
        .collect();

    let port_bindings: BTreeMap<String, Vec<HostPortBinding>> = host_config
        .port_bindings
        .unwrap_or_default()
        .into_iter()
        .map(|(port, bindings)| {
            let bindings = bindings
                .unwrap_or_default()
                .into_iter()
                .map(|b| HostPortBinding {
                    host_ip: b.host_ip.filter(|ip| !ip.is_empty()),
                    host_port: b.host_port.unwrap_or_default(),
                })
                .collect();
            (port, bindings)
        })
        .collect();

    let restart_policy = host_config.restart_policy.and_then(|policy| {
        let name = policy.name.map(|n| n.to_string()).unwrap_or_default();
        (!name.is_empty()).then(|| dockhand_common::RestartPolicy {
            name,
            maximum_retry_count: policy.maximum_retry_count.unwrap_or(0),
        })
    });

    ContainerRecord {
        id: response.id.unwrap_or_default(),
        name: response
            .name
            .map(|n| n.trim_start_matches('/').to_string())
            .unwrap_or_default(),
        image: config.image.unwrap_or_default(),
        image_id: response.image.unwrap_or_default(),
        raw_status: state.status.map(|s| s.to_string()).unwrap_or_default(),
        created: response.created.unwrap_or_default(),
        started_at: state.started_at.filter(|s| !s.starts_with("0001-")),
        exit_code: state.exit_code,
        pid: state.pid,
        platform: response.platform,
        command: config.cmd,
        entrypoint: config.entrypoint,
        env: config.env.unwrap_or_default(),
        labels: config.labels.unwrap_or_default().into_iter().collect(),
        working_dir: config.working_dir,
        user: config.user,
        tty: config.tty.unwrap_or(false),
        mounts,
        ports,
        port_bindings,
        restart_policy,
        network_mode: host_config.network_mode,
        networks,
        ip_address: network_settings.ip_address.filter(|ip| !ip.is_empty()),
        cpu_quota: host_config.cpu_quota,
        cpu_period: host_config.cpu_period,
        privileged: host_config.privileged,
        log_path: response.log_path.filter(|p| !p.is_empty()),
    }
}

fn network_record(network: Network) -> NetworkRecord {
    let gateway = network
        .ipam
        .and_then(|ipam| ipam.config)
        .and_then(|configs| configs.into_iter().next())
        .and_then(|config| config.gateway);

    let containers = network
        .containers
        .unwrap_or_default()
        .into_iter()
        .map(|(id, member)| {
            (
                id,
                NetworkMember {
                    name: member.name.unwrap_or_else(|| "<unknown>".to_string()),
                    ipv4_address: member.ipv4_address.filter(|ip| !ip.is_empty()),
                },
            )
        })
        .collect();

    NetworkRecord {
        id: network.id.unwrap_or_default(),
        name: network.name.unwrap_or_default(),
        driver: network.driver.unwrap_or_else(|| "unknown".to_string()),
        scope: network.scope.unwrap_or_else(|| "unknown".to_string()),
        labels: network.labels.unwrap_or_default().into_iter().collect(),
        internal: network.internal.unwrap_or(false),
        attachable: network.attachable.unwrap_or(false),
        gateway,
        containers,
    }
}

fn volume_record(volume: Volume) -> VolumeRecord {
    VolumeRecord {
        name: volume.name,
        driver: volume.driver,
        mountpoint: volume.mountpoint,
        created_at: volume.created_at,
        labels: volume.labels.into_iter().collect(),
        options: volume.options.into_iter().collect(),
    }
}
