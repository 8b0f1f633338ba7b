//! Request and response shapes of the management API.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{ContainerStatus, RestartPolicy};

/// Outcome of a command. `success = false` with a 4xx `code` is a soft
/// failure: nothing was changed and the message says why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericMessageResponse {
    pub success: bool,
    pub code: u16,
    pub message: String,
}

impl GenericMessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            code: 200,
            message: message.into(),
        }
    }

    pub fn rejected(code: u16, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    pub container_port: String,
    pub host_ip: Option<String>,
    pub host_port: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountInfo {
    pub source: Option<String>,
    pub destination: String,
    pub mode: Option<String>,
    #[serde(rename = "type")]
    pub mount_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub status: ContainerStatus,
    pub image: Vec<String>,
    pub command: String,
    pub created_at: String,
    pub uptime_seconds: Option<i64>,
    pub ports: Vec<PortBinding>,
    pub error_count: usize,
    pub latest_error_message: Option<String>,
    pub volumes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerDetails {
    #[serde(flatten)]
    pub summary: ContainerSummary,
    pub ip_address: String,
    pub network_mode: String,
    pub created: String,
    pub platform: String,
    pub cpu_percent: f64,
    pub memory_usage: u64,
    pub memory_limit: u64,
    pub cpu_limit: Option<f64>,
    pub mounts: Vec<MountInfo>,
    pub labels: BTreeMap<String, String>,
    pub env: Vec<String>,
    pub restart_policy: Option<RestartPolicy>,
    pub privileged: bool,
    pub log_path: Option<String>,
    pub entrypoint: Option<String>,
    pub pid: Option<i64>,
    pub exit_code: Option<i64>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageContainerInfo {
    pub id: String,
    pub name: String,
    pub status: ContainerStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockerImageSummary {
    pub id: String,
    pub tags: Vec<String>,
    pub size: i64,
    pub created: Option<String>,
    pub architecture: Option<String>,
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub containers: Vec<ImageContainerInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeContainerInfo {
    pub id: String,
    pub name: String,
    pub status: ContainerStatus,
    pub mountpoint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockerVolumeSummary {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub mount_type: String,
    pub source: String,
    pub destination: String,
    pub driver: Option<String>,
    pub mountpoint: Option<String>,
    pub created_at: Option<String>,
    pub size: Option<String>,
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub containers: Vec<VolumeContainerInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerOverview {
    pub version: String,
    pub total_containers: usize,
    pub running_containers: usize,
    pub failed_containers: usize,
    pub images: usize,
    pub volumes: usize,
    pub logs_count: usize,
    pub is_swarm_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerStats {
    pub id: String,
    pub name: String,
    pub cpu: f64,
    pub memory: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkContainerInfo {
    pub id: String,
    pub name: String,
    pub status: String,
    pub ipv4_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DockerNetworkOverview {
    pub id: String,
    pub name: String,
    pub driver: String,
    pub scope: String,
    pub labels: BTreeMap<String, String>,
    pub internal: bool,
    pub attachable: bool,
    pub containers: Vec<NetworkContainerInfo>,
    pub containers_count: usize,
    pub running_containers_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GraphNode {
    Container {
        id: String,
        label: String,
        status: String,
        #[serde(rename = "clusterId")]
        cluster_id: Option<String>,
    },
    Network {
        id: String,
        label: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphLink {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetworkGraph {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSelectItem {
    pub id: String,
    pub name: String,
    pub gateway: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSelectItem {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VolumeSelectList {
    pub volumes: Vec<VolumeSelectItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContainerLogsResponse {
    pub logs: Vec<LogEntry>,
    /// Unix seconds of the last returned line; pass back as `since` to
    /// fetch the next page.
    pub next_since: Option<i64>,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedVolumeResponse {
    pub name: String,
    pub driver: String,
    pub mountpoint: String,
    pub created_at: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub options: BTreeMap<String, String>,
}

// --- Requests ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachVolumeRequest {
    pub volume_name: String,
    pub mount_path: String,
    #[serde(default)]
    pub read_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignNetworkRequest {
    pub network_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignMultipleNetworksRequest {
    pub network_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignNetworkWithStaticIpRequest {
    pub network_name: String,
    #[serde(default)]
    pub ipv4_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisconnectNetworkRequest {
    pub network_name: String,
}

fn default_volume_driver() -> String {
    "local".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVolumeRequest {
    pub name: String,
    #[serde(default = "default_volume_driver")]
    pub driver: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub driver_opts: BTreeMap<String, String>,
}

fn default_network_driver() -> String {
    "bridge".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDockerNetworkRequest {
    pub name: String,
    #[serde(default = "default_network_driver")]
    pub driver: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default = "default_true")]
    pub check_duplicate: bool,
}

fn default_tag() -> String {
    "latest".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullImageRequest {
    pub repository: String,
    #[serde(default = "default_tag")]
    pub tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeMountRequest {
    pub volume_name: String,
    pub mount_path: String,
    #[serde(default)]
    pub read_only: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateContainerRequest {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub command: Option<Vec<String>>,
    /// Container port to host port, both TCP.
    #[serde(default)]
    pub ports: BTreeMap<u16, u16>,
    #[serde(default)]
    pub volume_mounts: Vec<VolumeMountRequest>,
    #[serde(default)]
    pub networks: Vec<String>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(default)]
    pub entrypoint: Option<Vec<String>>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub tty: Option<bool>,
    #[serde(default)]
    pub restart_policy: Option<RestartPolicy>,
    #[serde(default)]
    pub start_after_create: Option<bool>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub force_recreate: bool,
}
