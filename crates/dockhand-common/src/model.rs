//! Typed records exchanged with the container engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{DockhandError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContainerStatus {
    Running,
    Stopped,
    Restarted,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountType {
    Volume,
    Bind,
}

/// One entry of a container's mount set, in recreatable form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountSpec {
    /// Volume name for volume mounts, host path for binds.
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub mount_type: MountType,
    #[serde(default)]
    pub read_only: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostPortBinding {
    pub host_ip: Option<String>,
    pub host_port: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartPolicy {
    pub name: String,
    pub maximum_retry_count: i64,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            name: "no".to_string(),
            maximum_retry_count: 0,
        }
    }
}

/// Full creation-time configuration of a container. Captured from a live
/// container before a destructive recreate and also used for fresh creates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContainerConfig {
    pub name: String,
    pub image: String,
    pub command: Option<Vec<String>>,
    pub entrypoint: Option<Vec<String>>,
    /// `KEY=VALUE` entries, order preserved.
    pub env: Vec<String>,
    pub labels: BTreeMap<String, String>,
    pub working_dir: Option<String>,
    pub user: Option<String>,
    pub tty: bool,
    /// Container port (`"80/tcp"`) to published host bindings.
    pub port_bindings: BTreeMap<String, Vec<HostPortBinding>>,
    pub restart_policy: RestartPolicy,
    pub mounts: Vec<MountSpec>,
    pub network_mode: Option<String>,
    /// Networks to connect after creation, by name.
    pub networks: Vec<String>,
}

impl ContainerConfig {
    /// Capture the recreatable configuration of an inspected container.
    ///
    /// Fails with `PreconditionFailed` when the container carries a mount
    /// kind that cannot be expressed as a [`MountSpec`] (tmpfs, npipe, ...),
    /// so callers can refuse before anything destructive happens.
    pub fn snapshot(record: &ContainerRecord) -> Result<Self> {
        let mut mounts = Vec::with_capacity(record.mounts.len());
        for m in &record.mounts {
            let spec = match m.mount_type.as_str() {
                "volume" => MountSpec {
                    source: m
                        .name
                        .clone()
                        .or_else(|| m.source.clone())
                        .unwrap_or_default(),
                    target: m.destination.clone(),
                    mount_type: MountType::Volume,
                    read_only: !m.rw,
                },
                "bind" => MountSpec {
                    source: m.source.clone().unwrap_or_default(),
                    target: m.destination.clone(),
                    mount_type: MountType::Bind,
                    read_only: !m.rw,
                },
                other => {
                    return Err(DockhandError::PreconditionFailed(format!(
                        "Container '{}' has a '{}' mount at '{}' which cannot be recreated.",
                        record.name, other, m.destination
                    )))
                }
            };
            mounts.push(spec);
        }

        // Published ports are only reported while the container runs; the
        // configured bindings survive a stop.
        let mut port_bindings: BTreeMap<String, Vec<HostPortBinding>> = BTreeMap::new();
        if record.port_bindings.is_empty() {
            for port in &record.ports {
                if let Some(host_port) = port.host_port.as_ref().filter(|p| !p.is_empty()) {
                    port_bindings
                        .entry(port.container_port.clone())
                        .or_default()
                        .push(HostPortBinding {
                            host_ip: port.host_ip.clone().filter(|ip| !ip.is_empty()),
                            host_port: host_port.clone(),
                        });
                }
            }
        } else {
            for (port, bindings) in &record.port_bindings {
                let bound: Vec<HostPortBinding> = bindings
                    .iter()
                    .filter(|b| !b.host_port.is_empty())
                    .cloned()
                    .collect();
                if !bound.is_empty() {
                    port_bindings.insert(port.clone(), bound);
                }
            }
        }

        Ok(Self {
            name: record.name.clone(),
            image: record.image.clone(),
            command: record.command.clone(),
            entrypoint: record.entrypoint.clone(),
            env: record.env.clone(),
            labels: record.labels.clone(),
            working_dir: record.working_dir.clone().filter(|d| !d.is_empty()),
            user: record.user.clone().filter(|u| !u.is_empty()),
            tty: record.tty,
            port_bindings,
            restart_policy: record.restart_policy.clone().unwrap_or_default(),
            mounts,
            network_mode: record.network_mode.clone(),
            networks: record.networks.keys().cloned().collect(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MountRecord {
    /// Raw engine mount type (`volume`, `bind`, `tmpfs`, ...).
    pub mount_type: String,
    pub name: Option<String>,
    pub source: Option<String>,
    pub destination: String,
    pub mode: Option<String>,
    pub rw: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PortRecord {
    pub container_port: String,
    pub host_ip: Option<String>,
    pub host_port: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EndpointRecord {
    pub network_id: Option<String>,
    pub ip_address: Option<String>,
}

/// Inspected container state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub id: String,
    /// Name without the engine's leading slash.
    pub name: String,
    /// Image reference from the container config.
    pub image: String,
    pub image_id: String,
    /// Raw engine status (`running`, `exited`, ...).
    pub raw_status: String,
    pub created: String,
    pub started_at: Option<String>,
    pub exit_code: Option<i64>,
    pub pid: Option<i64>,
    pub platform: Option<String>,
    pub command: Option<Vec<String>>,
    pub entrypoint: Option<Vec<String>>,
    pub env: Vec<String>,
    pub labels: BTreeMap<String, String>,
    pub working_dir: Option<String>,
    pub user: Option<String>,
    pub tty: bool,
    pub mounts: Vec<MountRecord>,
    /// Published-port metadata; one entry per binding, or one bare entry
    /// for an exposed port without bindings.
    pub ports: Vec<PortRecord>,
    /// Configured host bindings per container port. Unlike `ports`, these
    /// are kept while the container is stopped.
    pub port_bindings: BTreeMap<String, Vec<HostPortBinding>>,
    pub restart_policy: Option<RestartPolicy>,
    pub network_mode: Option<String>,
    /// Connected networks keyed by network name.
    pub networks: BTreeMap<String, EndpointRecord>,
    pub ip_address: Option<String>,
    pub cpu_quota: Option<i64>,
    pub cpu_period: Option<i64>,
    pub privileged: Option<bool>,
    pub log_path: Option<String>,
}

impl ContainerRecord {
    pub fn short_id(&self) -> String {
        self.id.chars().take(12).collect()
    }

    pub fn is_running(&self) -> bool {
        self.raw_status == "running"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetworkMember {
    pub name: String,
    pub ipv4_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NetworkRecord {
    pub id: String,
    pub name: String,
    pub driver: String,
    pub scope: String,
    pub labels: BTreeMap<String, String>,
    pub internal: bool,
    pub attachable: bool,
    /// Gateway of the first IPAM config block.
    pub gateway: Option<String>,
    /// Attached containers keyed by container id. Only populated by inspect.
    pub containers: BTreeMap<String, NetworkMember>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub name: String,
    pub driver: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub check_duplicate: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VolumeRecord {
    pub name: String,
    pub driver: String,
    pub mountpoint: String,
    pub created_at: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub options: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VolumeSpec {
    pub name: String,
    pub driver: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub driver_opts: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: String,
    pub tags: Vec<String>,
    pub repo_digests: Vec<String>,
    pub size: i64,
    pub created: Option<String>,
    pub architecture: Option<String>,
    pub os: Option<String>,
}

impl ImageRecord {
    /// `sha256:` prefixed short id, the way the engine CLI prints it.
    pub fn short_id(&self) -> String {
        match self.id.strip_prefix("sha256:") {
            Some(hex) => format!("sha256:{}", &hex[..hex.len().min(10)]),
            None => self.id.chars().take(10).collect(),
        }
    }
}

/// One event of an image pull.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PullProgress {
    pub id: Option<String>,
    pub status: Option<String>,
    pub progress: Option<String>,
    pub current: Option<i64>,
    pub total: Option<i64>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTail {
    All,
    Lines(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogQuery {
    pub tail: LogTail,
    /// Unix seconds, inclusive lower bound.
    pub since: Option<i64>,
    /// Unix seconds, inclusive upper bound.
    pub until: Option<i64>,
    /// Prefix each line with its RFC 3339 timestamp.
    pub timestamps: bool,
}

impl LogQuery {
    pub fn tail(lines: usize) -> Self {
        Self {
            tail: LogTail::Lines(lines),
            since: None,
            until: None,
            timestamps: false,
        }
    }
}

// Stats payload, field names follow the engine's JSON so samples can be
// decoded straight from it. Missing sections decode as zeroes.

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CpuUsage {
    #[serde(default)]
    pub total_usage: u64,
    #[serde(default)]
    pub percpu_usage: Option<Vec<u64>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CpuStats {
    #[serde(default)]
    pub cpu_usage: CpuUsage,
    #[serde(default)]
    pub system_cpu_usage: Option<u64>,
    #[serde(default)]
    pub online_cpus: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MemoryStats {
    #[serde(default)]
    pub usage: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NetworkCounters {
    #[serde(default)]
    pub rx_bytes: u64,
    #[serde(default)]
    pub tx_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlkioEntry {
    #[serde(default)]
    pub op: String,
    #[serde(default)]
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BlkioStats {
    #[serde(default)]
    pub io_service_bytes_recursive: Option<Vec<BlkioEntry>>,
}

/// Point-in-time counters, current and previous CPU readings included.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatsSample {
    #[serde(default)]
    pub cpu_stats: CpuStats,
    #[serde(default)]
    pub precpu_stats: CpuStats,
    #[serde(default)]
    pub memory_stats: MemoryStats,
    #[serde(default)]
    pub networks: Option<BTreeMap<String, NetworkCounters>>,
    #[serde(default)]
    pub blkio_stats: BlkioStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stopped_record() -> ContainerRecord {
        let mut networks = BTreeMap::new();
        networks.insert("net1".to_string(), EndpointRecord::default());
        ContainerRecord {
            id: "abc123".to_string(),
            name: "web".to_string(),
            image: "nginx:latest".to_string(),
            raw_status: "exited".to_string(),
            command: Some(vec!["nginx".to_string()]),
            env: vec!["A=1".to_string()],
            mounts: vec![
                MountRecord {
                    mount_type: "volume".to_string(),
                    name: Some("data".to_string()),
                    source: Some("/var/lib/docker/volumes/data/_data".to_string()),
                    destination: "/data".to_string(),
                    mode: Some("z".to_string()),
                    rw: true,
                },
                MountRecord {
                    mount_type: "bind".to_string(),
                    name: None,
                    source: Some("/etc/app".to_string()),
                    destination: "/config".to_string(),
                    mode: None,
                    rw: false,
                },
            ],
            ports: vec![
                PortRecord {
                    container_port: "80/tcp".to_string(),
                    host_ip: Some("0.0.0.0".to_string()),
                    host_port: Some("8080".to_string()),
                },
                PortRecord {
                    container_port: "443/tcp".to_string(),
                    host_ip: None,
                    host_port: None,
                },
            ],
            networks,
            ..Default::default()
        }
    }

    #[test]
    fn test_snapshot_captures_mounts_ports_and_networks() {
        let config = ContainerConfig::snapshot(&stopped_record()).unwrap();
        assert_eq!(config.mounts.len(), 2);
        assert_eq!(config.mounts[0].source, "data");
        assert_eq!(config.mounts[0].mount_type, MountType::Volume);
        assert!(!config.mounts[0].read_only);
        assert_eq!(config.mounts[1].source, "/etc/app");
        assert!(config.mounts[1].read_only);
        assert_eq!(config.port_bindings.len(), 1);
        assert_eq!(config.port_bindings["80/tcp"][0].host_port, "8080");
        assert_eq!(config.networks, vec!["net1".to_string()]);
    }

    #[test]
    fn test_snapshot_prefers_configured_bindings_of_stopped_container() {
        let mut record = stopped_record();
        record.ports.clear();
        record.port_bindings.insert(
            "5432/tcp".to_string(),
            vec![HostPortBinding {
                host_ip: Some("127.0.0.1".to_string()),
                host_port: "15432".to_string(),
            }],
        );
        record.port_bindings.insert("9000/tcp".to_string(), Vec::new());

        let config = ContainerConfig::snapshot(&record).unwrap();
        assert_eq!(config.port_bindings.len(), 1);
        let binding = &config.port_bindings["5432/tcp"][0];
        assert_eq!(binding.host_port, "15432");
        assert_eq!(binding.host_ip.as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn test_snapshot_defaults_missing_restart_policy() {
        let config = ContainerConfig::snapshot(&stopped_record()).unwrap();
        assert_eq!(config.restart_policy.name, "no");
        assert_eq!(config.restart_policy.maximum_retry_count, 0);
    }

    #[test]
    fn test_snapshot_refuses_tmpfs() {
        let mut record = stopped_record();
        record.mounts.push(MountRecord {
            mount_type: "tmpfs".to_string(),
            destination: "/scratch".to_string(),
            rw: true,
            ..Default::default()
        });
        let err = ContainerConfig::snapshot(&record).unwrap_err();
        assert!(matches!(err, DockhandError::PreconditionFailed(_)));
    }

    #[test]
    fn test_status_serializes_uppercase() {
        let json = serde_json::to_string(&ContainerStatus::Running).unwrap();
        assert_eq!(json, "\"RUNNING\"");
    }

    #[test]
    fn test_stats_sample_tolerates_sparse_payload() {
        let sample: StatsSample = serde_json::from_str(
            r#"{"cpu_stats":{"cpu_usage":{"total_usage":10}},"memory_stats":{}}"#,
        )
        .unwrap();
        assert_eq!(sample.cpu_stats.cpu_usage.total_usage, 10);
        assert!(sample.cpu_stats.system_cpu_usage.is_none());
        assert!(sample.networks.is_none());
    }

    #[test]
    fn test_image_short_id() {
        let image = ImageRecord {
            id: "sha256:0123456789abcdef".to_string(),
            ..Default::default()
        };
        assert_eq!(image.short_id(), "sha256:0123456789");
    }
}
