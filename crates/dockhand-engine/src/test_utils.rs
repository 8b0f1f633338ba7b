//! Test utilities: conditional live-daemon execution and an in-memory engine

use std::collections::HashMap;
use std::pin::Pin;
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use async_trait::async_trait;
use chrono::DateTime;
use dockhand_common::{
    ContainerConfig, ContainerEngine, ContainerRecord, DockhandError, EndpointRecord, ExecChannel,
    ImageRecord, LogQuery, LogTail, MountRecord, MountType, NetworkMember, NetworkRecord,
    NetworkSpec, PortRecord, PullProgress, Result, StatsSample, VolumeRecord, VolumeSpec,
};
use futures::stream::{self, BoxStream, StreamExt};
use futures::Sink;
use tokio::io::AsyncWrite;

use crate::streaming::SessionFrame;

pub fn has_docker() -> bool {
    // Check if docker command exists
    Command::new("docker")
        .arg("info")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Macro to skip tests when requirements aren't met
#[macro_export]
macro_rules! require_docker {
    () => {
        if !$crate::test_utils::has_docker() {
            eprintln!("Test ignored: Docker not available");
            return;
        }
    };
}

/// Deterministic 64-hex-char id with distinct 12-char prefixes per seed.
pub fn fake_id(seed: u64) -> String {
    let mixed = seed.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    format!("{mixed:016x}").repeat(4)
}

pub fn container(name: &str, seed: u64, raw_status: &str) -> ContainerRecord {
    ContainerRecord {
        id: fake_id(seed),
        name: name.to_string(),
        image: "alpine:3.19".to_string(),
        image_id: image_id("alpine:3.19"),
        raw_status: raw_status.to_string(),
        created: "2024-05-01T12:00:00Z".to_string(),
        started_at: (raw_status == "running").then(|| "2024-05-01T12:00:01Z".to_string()),
        command: Some(vec!["sleep".to_string(), "infinity".to_string()]),
        restart_policy: Some(Default::default()),
        network_mode: Some("bridge".to_string()),
        ..Default::default()
    }
}

pub fn volume_mount(volume: &str, destination: &str) -> MountRecord {
    MountRecord {
        mount_type: "volume".to_string(),
        name: Some(volume.to_string()),
        source: Some(format!("/var/lib/docker/volumes/{volume}/_data")),
        destination: destination.to_string(),
        mode: Some("z".to_string()),
        rw: true,
    }
}

pub fn published_port(container_port: &str, host_port: &str) -> PortRecord {
    PortRecord {
        container_port: container_port.to_string(),
        host_ip: Some("0.0.0.0".to_string()),
        host_port: Some(host_port.to_string()),
    }
}

pub fn network(name: &str, seed: u64) -> NetworkRecord {
    NetworkRecord {
        id: fake_id(1000 + seed),
        name: name.to_string(),
        driver: "bridge".to_string(),
        scope: "local".to_string(),
        gateway: Some(format!("172.{}.0.1", 18 + seed)),
        ..Default::default()
    }
}

pub fn volume(name: &str) -> VolumeRecord {
    VolumeRecord {
        name: name.to_string(),
        driver: "local".to_string(),
        mountpoint: format!("/var/lib/docker/volumes/{name}/_data"),
        created_at: Some("2024-05-01T12:00:00Z".to_string()),
        ..Default::default()
    }
}

pub fn image_id(tag: &str) -> String {
    let seed = tag.bytes().fold(7u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
    format!("sha256:{}", fake_id(seed))
}

pub fn image(tag: &str) -> ImageRecord {
    ImageRecord {
        id: image_id(tag),
        tags: vec![tag.to_string()],
        repo_digests: vec![format!("{tag}@sha256:abc")],
        size: 7_000_000,
        created: Some("2024-04-01T00:00:00Z".to_string()),
        architecture: Some("amd64".to_string()),
        os: Some("linux".to_string()),
    }
}

type ErrorFactory = Arc<dyn Fn() -> DockhandError + Send + Sync>;

struct Failure {
    op: String,
    target: Option<String>,
    remaining: Option<usize>,
    error: ErrorFactory,
}

#[derive(Default)]
pub struct MockState {
    pub containers: Vec<ContainerRecord>,
    pub networks: Vec<NetworkRecord>,
    pub volumes: Vec<VolumeRecord>,
    pub images: Vec<ImageRecord>,
    /// Log lines per container id as `(unix seconds, message)`.
    pub logs: HashMap<String, Vec<(i64, String)>>,
    pub stats: HashMap<String, Vec<StatsSample>>,
    /// When set, stats streams stay open after the queued samples.
    pub stats_stall: bool,
    pub exec_output: Vec<Vec<u8>>,
    /// When set, exec output ends after the queued chunks.
    pub exec_exits: bool,
    pub pull_events: Vec<PullProgress>,
    pub version: (String, String),
    pub swarm_state: Option<String>,
    pub unavailable: bool,
    calls: Vec<String>,
    failures: Vec<Failure>,
    next_seed: u64,
}

/// In-memory [`ContainerEngine`] with a call journal and failure
/// injection per operation and target.
#[derive(Clone)]
pub struct MockEngine {
    state: Arc<Mutex<MockState>>,
    exec_input: RecordingWriter,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    pub fn new() -> Self {
        let state = MockState {
            version: ("24.0.7".to_string(), "1.43".to_string()),
            swarm_state: Some("inactive".to_string()),
            next_seed: 500,
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            exec_input: RecordingWriter::default(),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn with_container(self, record: ContainerRecord) -> Self {
        self.state().containers.push(record);
        self
    }

    pub fn with_network(self, record: NetworkRecord) -> Self {
        self.state().networks.push(record);
        self
    }

    pub fn with_volume(self, record: VolumeRecord) -> Self {
        self.state().volumes.push(record);
        self
    }

    pub fn with_image(self, record: ImageRecord) -> Self {
        self.state().images.push(record);
        self
    }

    pub fn with_logs(self, container_id: &str, lines: &[(i64, &str)]) -> Self {
        self.state().logs.insert(
            container_id.to_string(),
            lines.iter().map(|(ts, m)| (*ts, m.to_string())).collect(),
        );
        self
    }

    pub fn with_stats(self, container_id: &str, samples: Vec<StatsSample>) -> Self {
        self.state().stats.insert(container_id.to_string(), samples);
        self
    }

    /// Attach an existing container to an existing network, on both sides.
    pub fn with_attachment(self, container: &str, network: &str, ip: &str) -> Self {
        {
            let mut state = self.state();
            let net = state.networks.iter().find(|n| n.name == network).cloned();
            let member = state
                .containers
                .iter()
                .find(|c| c.name == container)
                .map(|c| (c.id.clone(), c.name.clone()));
            if let (Some(net), Some((id, name))) = (net, member) {
                if let Some(c) = state.containers.iter_mut().find(|c| c.id == id) {
                    c.networks.insert(
                        net.name.clone(),
                        EndpointRecord {
                            network_id: Some(net.id.clone()),
                            ip_address: Some(ip.to_string()),
                        },
                    );
                }
                if let Some(n) = state.networks.iter_mut().find(|n| n.id == net.id) {
                    n.containers.insert(
                        id,
                        NetworkMember {
                            name,
                            ipv4_address: Some(ip.to_string()),
                        },
                    );
                }
            }
        }
        self
    }

    /// Fail the next `op` call (optionally only for `target`) once.
    pub fn fail_once(
        &self,
        op: &str,
        target: Option<&str>,
        error: impl Fn() -> DockhandError + Send + Sync + 'static,
    ) {
        self.push_failure(op, target, Some(1), Arc::new(error));
    }

    pub fn fail_always(
        &self,
        op: &str,
        target: Option<&str>,
        error: impl Fn() -> DockhandError + Send + Sync + 'static,
    ) {
        self.push_failure(op, target, None, Arc::new(error));
    }

    fn push_failure(
        &self,
        op: &str,
        target: Option<&str>,
        remaining: Option<usize>,
        error: ErrorFactory,
    ) {
        self.state().failures.push(Failure {
            op: op.to_string(),
            target: target.map(str::to_string),
            remaining,
            error,
        });
    }

    /// Journal of calls as `op:target`.
    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn call_count(&self, op: &str) -> usize {
        let prefix = format!("{op}:");
        self.state()
            .calls
            .iter()
            .filter(|c| c.starts_with(&prefix))
            .count()
    }

    pub fn container_named(&self, name: &str) -> Option<ContainerRecord> {
        self.state().containers.iter().find(|c| c.name == name).cloned()
    }

    /// Bytes written to the stdin of exec sessions so far.
    pub fn exec_input(&self) -> Vec<u8> {
        self.exec_input.contents()
    }

    pub fn exec_input_closed(&self) -> bool {
        self.exec_input.is_shut_down()
    }

    /// Record a call and apply any matching injected failure.
    fn enter(&self, op: &str, target: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(format!("{op}:{target}"));
        if state.unavailable {
            return Err(DockhandError::EngineUnavailable(
                "connection refused".to_string(),
            ));
        }
        let hit = state.failures.iter_mut().find(|f| {
            f.op == op
                && f.target.as_deref().map_or(true, |t| t == target)
                && f.remaining != Some(0)
        });
        match hit {
            Some(failure) => {
                if let Some(n) = failure.remaining.as_mut() {
                    *n -= 1;
                }
                Err((failure.error)())
            }
            None => Ok(()),
        }
    }
}

fn find_container<'a>(state: &'a mut MockState, ident: &str) -> Result<&'a mut ContainerRecord> {
    state
        .containers
        .iter_mut()
        .find(|c| {
            c.id == ident || c.name == ident || (ident.len() >= 12 && c.id.starts_with(ident))
        })
        .ok_or_else(|| DockhandError::NotFound(format!("No such container: {ident}")))
}

fn find_network<'a>(state: &'a mut MockState, ident: &str) -> Result<&'a mut NetworkRecord> {
    state
        .networks
        .iter_mut()
        .find(|n| n.id == ident || n.name == ident)
        .ok_or_else(|| DockhandError::NotFound(format!("network {ident} not found")))
}

/// Published ports as the engine reports them once a container runs.
fn publish(record: &mut ContainerRecord) {
    if record.port_bindings.is_empty() {
        return;
    }
    record.ports = record
        .port_bindings
        .iter()
        .flat_map(|(port, bindings)| {
            bindings.iter().map(move |b| PortRecord {
                container_port: port.clone(),
                host_ip: b.host_ip.clone(),
                host_port: Some(b.host_port.clone()),
            })
        })
        .collect();
}

fn format_ts(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true))
        .unwrap_or_default()
}

#[async_trait]
impl ContainerEngine for MockEngine {
    async fn ping(&self) -> Result<()> {
        self.enter("ping", "")
    }

    async fn version(&self) -> Result<(String, String)> {
        self.enter("version", "")?;
        Ok(self.state().version.clone())
    }

    async fn swarm_state(&self) -> Result<Option<String>> {
        self.enter("swarm_state", "")?;
        Ok(self.state().swarm_state.clone())
    }

    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerRecord>> {
        self.enter("list_containers", if all { "all" } else { "running" })?;
        Ok(self
            .state()
            .containers
            .iter()
            .filter(|c| all || c.is_running())
            .cloned()
            .collect())
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerRecord> {
        self.enter("inspect_container", id)?;
        let mut state = self.state();
        find_container(&mut state, id).map(|c| c.clone())
    }

    async fn container_logs(&self, id: &str, query: LogQuery) -> Result<Vec<String>> {
        self.enter("container_logs", id)?;
        let mut state = self.state();
        let id = find_container(&mut state, id)?.id.clone();
        let lines: Vec<&(i64, String)> = state
            .logs
            .get(&id)
            .map(|l| l.iter().collect())
            .unwrap_or_default();
        let mut selected: Vec<&(i64, String)> = lines
            .into_iter()
            .filter(|(ts, _)| query.since.map_or(true, |s| *ts >= s))
            .filter(|(ts, _)| query.until.map_or(true, |u| *ts <= u))
            .collect();
        if let LogTail::Lines(n) = query.tail {
            let skip = selected.len().saturating_sub(n);
            selected.drain(..skip);
        }
        Ok(selected
            .into_iter()
            .map(|(ts, msg)| {
                if query.timestamps {
                    format!("{} {msg}", format_ts(*ts))
                } else {
                    msg.clone()
                }
            })
            .collect())
    }

    fn stats_stream(&self, id: &str) -> BoxStream<'static, Result<StatsSample>> {
        if let Err(e) = self.enter("stats_stream", id) {
            return Box::pin(stream::iter(vec![Err(e)]));
        }
        let (samples, stall) = {
            let state = self.state();
            (state.stats.get(id).cloned().unwrap_or_default(), state.stats_stall)
        };
        let samples = stream::iter(samples.into_iter().map(Ok));
        if stall {
            Box::pin(samples.chain(stream::pending()))
        } else {
            Box::pin(samples)
        }
    }

    async fn stats_once(&self, id: &str) -> Result<StatsSample> {
        self.enter("stats_once", id)?;
        self.state()
            .stats
            .get(id)
            .and_then(|s| s.first().cloned())
            .ok_or_else(|| DockhandError::Engine(format!("no stats for {id}")))
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        self.enter("start_container", id)?;
        let mut state = self.state();
        let c = find_container(&mut state, id)?;
        c.raw_status = "running".to_string();
        c.started_at = Some(chrono::Utc::now().to_rfc3339());
        publish(c);
        Ok(())
    }

    async fn stop_container(&self, id: &str) -> Result<()> {
        self.enter("stop_container", id)?;
        let mut state = self.state();
        let c = find_container(&mut state, id)?;
        c.raw_status = "exited".to_string();
        c.exit_code = Some(0);
        // Only the configured bindings outlive a stop.
        c.ports.clear();
        Ok(())
    }

    async fn restart_container(&self, id: &str) -> Result<()> {
        self.enter("restart_container", id)?;
        let mut state = self.state();
        let c = find_container(&mut state, id)?;
        c.raw_status = "running".to_string();
        c.started_at = Some(chrono::Utc::now().to_rfc3339());
        publish(c);
        Ok(())
    }

    async fn remove_container(&self, id: &str, force: bool) -> Result<()> {
        self.enter("remove_container", id)?;
        let mut state = self.state();
        let record = find_container(&mut state, id)?.clone();
        if record.is_running() && !force {
            return Err(DockhandError::Conflict(format!(
                "cannot remove running container {}",
                record.short_id()
            )));
        }
        state.containers.retain(|c| c.id != record.id);
        for network in state.networks.iter_mut() {
            network.containers.remove(&record.id);
        }
        Ok(())
    }

    async fn create_container(&self, config: &ContainerConfig) -> Result<String> {
        self.enter("create_container", &config.name)?;
        let mut state = self.state();
        if state.containers.iter().any(|c| c.name == config.name) {
            return Err(DockhandError::Conflict(format!(
                "container name \"/{}\" is already in use",
                config.name
            )));
        }
        state.next_seed += 1;
        let image_id = state
            .images
            .iter()
            .find(|i| i.tags.contains(&config.image))
            .map(|i| i.id.clone())
            .unwrap_or_else(|| image_id(&config.image));
        let record = ContainerRecord {
            id: fake_id(state.next_seed),
            name: config.name.clone(),
            image: config.image.clone(),
            image_id,
            raw_status: "created".to_string(),
            created: chrono::Utc::now().to_rfc3339(),
            command: config.command.clone(),
            entrypoint: config.entrypoint.clone(),
            env: config.env.clone(),
            labels: config.labels.clone(),
            working_dir: config.working_dir.clone(),
            user: config.user.clone(),
            tty: config.tty,
            mounts: config
                .mounts
                .iter()
                .map(|m| match m.mount_type {
                    MountType::Volume => MountRecord {
                        rw: !m.read_only,
                        ..volume_mount(&m.source, &m.target)
                    },
                    MountType::Bind => MountRecord {
                        mount_type: "bind".to_string(),
                        name: None,
                        source: Some(m.source.clone()),
                        destination: m.target.clone(),
                        mode: None,
                        rw: !m.read_only,
                    },
                })
                .collect(),
            port_bindings: config.port_bindings.clone(),
            restart_policy: Some(config.restart_policy.clone()),
            network_mode: config.network_mode.clone(),
            ..Default::default()
        };
        let id = record.id.clone();
        state.containers.push(record);
        Ok(id)
    }

    async fn list_networks(&self) -> Result<Vec<NetworkRecord>> {
        self.enter("list_networks", "")?;
        let mut networks = self.state().networks.clone();
        networks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(networks)
    }

    async fn inspect_network(&self, id: &str) -> Result<NetworkRecord> {
        self.enter("inspect_network", id)?;
        let mut state = self.state();
        find_network(&mut state, id).map(|n| n.clone())
    }

    async fn create_network(&self, spec: &NetworkSpec) -> Result<()> {
        self.enter("create_network", &spec.name)?;
        let mut state = self.state();
        state.next_seed += 1;
        let mut record = network(&spec.name, state.next_seed);
        record.driver = spec.driver.clone().unwrap_or_else(|| "bridge".to_string());
        record.labels = spec.labels.clone();
        state.networks.push(record);
        Ok(())
    }

    async fn remove_network(&self, id: &str) -> Result<()> {
        self.enter("remove_network", id)?;
        let mut state = self.state();
        let id = find_network(&mut state, id)?.id.clone();
        state.networks.retain(|n| n.id != id);
        Ok(())
    }

    async fn connect_network(
        &self,
        network: &str,
        container: &str,
        ipv4_address: Option<&str>,
    ) -> Result<()> {
        self.enter("connect_network", &format!("{network}/{container}"))?;
        let mut state = self.state();
        let net = find_network(&mut state, network)?.clone();
        let c = find_container(&mut state, container)?;
        if c.networks.contains_key(&net.name) {
            return Err(DockhandError::Conflict(format!(
                "endpoint with name {} already exists in network {}",
                c.name, net.name
            )));
        }
        let ip = ipv4_address
            .map(str::to_string)
            .unwrap_or_else(|| format!("172.30.0.{}", net.containers.len() + 2));
        c.networks.insert(
            net.name.clone(),
            EndpointRecord {
                network_id: Some(net.id.clone()),
                ip_address: Some(ip.clone()),
            },
        );
        let member = (c.id.clone(), c.name.clone());
        find_network(&mut state, &net.id)?.containers.insert(
            member.0,
            NetworkMember {
                name: member.1,
                ipv4_address: Some(ip),
            },
        );
        Ok(())
    }

    async fn disconnect_network(&self, network: &str, container: &str) -> Result<()> {
        self.enter("disconnect_network", &format!("{network}/{container}"))?;
        let mut state = self.state();
        let net = find_network(&mut state, network)?.clone();
        let c = find_container(&mut state, container)?;
        c.networks.remove(&net.name);
        let id = c.id.clone();
        find_network(&mut state, &net.id)?.containers.remove(&id);
        Ok(())
    }

    async fn list_volumes(&self) -> Result<Vec<VolumeRecord>> {
        self.enter("list_volumes", "")?;
        Ok(self.state().volumes.clone())
    }

    async fn inspect_volume(&self, name: &str) -> Result<VolumeRecord> {
        self.enter("inspect_volume", name)?;
        self.state()
            .volumes
            .iter()
            .find(|v| v.name == name)
            .cloned()
            .ok_or_else(|| DockhandError::NotFound(format!("get {name}: no such volume")))
    }

    async fn create_volume(&self, spec: &VolumeSpec) -> Result<VolumeRecord> {
        self.enter("create_volume", &spec.name)?;
        let mut state = self.state();
        if let Some(existing) = state.volumes.iter().find(|v| v.name == spec.name) {
            return Ok(existing.clone());
        }
        let record = VolumeRecord {
            driver: spec.driver.clone().unwrap_or_else(|| "local".to_string()),
            labels: spec.labels.clone(),
            options: spec.driver_opts.clone(),
            ..volume(&spec.name)
        };
        state.volumes.push(record.clone());
        Ok(record)
    }

    async fn remove_volume(&self, name: &str) -> Result<()> {
        self.enter("remove_volume", name)?;
        let mut state = self.state();
        let before = state.volumes.len();
        state.volumes.retain(|v| v.name != name);
        if state.volumes.len() == before {
            return Err(DockhandError::NotFound(format!("get {name}: no such volume")));
        }
        Ok(())
    }

    async fn list_images(&self) -> Result<Vec<ImageRecord>> {
        self.enter("list_images", "")?;
        Ok(self.state().images.clone())
    }

    async fn inspect_image(&self, reference: &str) -> Result<ImageRecord> {
        self.enter("inspect_image", reference)?;
        let latest = format!("{reference}:latest");
        self.state()
            .images
            .iter()
            .find(|i| {
                i.id == reference
                    || i.id.trim_start_matches("sha256:").starts_with(reference)
                    || i.tags.iter().any(|t| t == reference || *t == latest)
            })
            .cloned()
            .ok_or_else(|| DockhandError::NotFound(format!("No such image: {reference}")))
    }

    async fn remove_image(&self, id: &str, _force: bool) -> Result<()> {
        self.enter("remove_image", id)?;
        let mut state = self.state();
        let before = state.images.len();
        state.images.retain(|i| i.id != id);
        if state.images.len() == before {
            return Err(DockhandError::NotFound(format!("No such image: {id}")));
        }
        Ok(())
    }

    fn pull_image(&self, repository: &str, tag: &str) -> BoxStream<'static, Result<PullProgress>> {
        let reference = format!("{repository}:{tag}");
        if let Err(e) = self.enter("pull_image", &reference) {
            return Box::pin(stream::iter(vec![Err(e)]));
        }
        let mut state = self.state();
        let events = state.pull_events.clone();
        if !state.images.iter().any(|i| i.tags.contains(&reference)) {
            state.images.push(image(&reference));
        }
        Box::pin(stream::iter(events.into_iter().map(Ok)))
    }

    async fn open_exec(&self, container: &str, cmd: Vec<String>) -> Result<ExecChannel> {
        self.enter("open_exec", &format!("{container}:{}", cmd.join(" ")))?;
        let (chunks, exits) = {
            let mut state = self.state();
            let record = find_container(&mut state, container)?;
            if !record.is_running() {
                return Err(DockhandError::Conflict(format!(
                    "container {} is not running",
                    record.short_id()
                )));
            }
            (state.exec_output.clone(), state.exec_exits)
        };
        let output = stream::iter(chunks.into_iter().map(Ok));
        let output: BoxStream<'static, Result<Vec<u8>>> = if exits {
            Box::pin(output)
        } else {
            Box::pin(output.chain(stream::pending()))
        };
        Ok(ExecChannel {
            output,
            input: Box::pin(self.exec_input.clone()),
        })
    }
}

/// `AsyncWrite` that keeps everything written to it.
#[derive(Clone, Default)]
pub struct RecordingWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
    shut_down: Arc<AtomicUsize>,
}

impl RecordingWriter {
    pub fn contents(&self) -> Vec<u8> {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst) > 0
    }
}

impl AsyncWrite for RecordingWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.buffer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        self.shut_down.fetch_add(1, Ordering::SeqCst);
        Poll::Ready(Ok(()))
    }
}

/// Session sink that records frames and counts close calls.
#[derive(Clone, Default)]
pub struct RecordingSink {
    frames: Arc<Mutex<Vec<SessionFrame>>>,
    closes: Arc<AtomicUsize>,
}

impl RecordingSink {
    pub fn frames(&self) -> Vec<SessionFrame> {
        self.frames.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Text frames parsed as JSON.
    pub fn json_frames(&self) -> Vec<serde_json::Value> {
        self.frames()
            .into_iter()
            .filter_map(|f| match f {
                SessionFrame::Text(text) => serde_json::from_str(&text).ok(),
                _ => None,
            })
            .collect()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Sink<SessionFrame> for RecordingSink {
    type Error = std::convert::Infallible;

    fn poll_ready(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(
        self: Pin<&mut Self>,
        item: SessionFrame,
    ) -> std::result::Result<(), Self::Error> {
        self.frames
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(item);
        Ok(())
    }

    fn poll_flush(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<std::result::Result<(), Self::Error>> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Poll::Ready(Ok(()))
    }
}
