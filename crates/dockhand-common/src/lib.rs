// Re-export dependencies used in public interfaces of common types

use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::BoxStream;
pub use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod api;
pub mod model;

pub use model::{
    ContainerConfig, ContainerRecord, ContainerStatus, EndpointRecord, HostPortBinding,
    ImageRecord, LogQuery, LogTail, MountRecord, MountSpec, MountType, NetworkMember,
    NetworkRecord, NetworkSpec, PortRecord, PullProgress, RestartPolicy, StatsSample,
    VolumeRecord, VolumeSpec,
};

#[derive(Error, Debug)]
pub enum DockhandError {
    #[error("Resource Not Found: {0}")]
    NotFound(String),

    #[error("{0}")]
    PreconditionFailed(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid Request: {0}")]
    InvalidRequest(String),

    #[error("Docker is not running or unreachable: {0}")]
    EngineUnavailable(String),

    #[error("Engine Error: {0}")]
    Engine(String),

    /// Recreation failed but the original container was put back.
    #[error("Failed to {action}. Original container restored.")]
    RecreateRestored {
        container: String,
        action: String,
        cause: String,
    },

    /// Recreation and rollback both failed; the container may be gone.
    #[error("Failed to {action} and rollback failed. Manual intervention required.")]
    RecreateFatal {
        container: String,
        action: String,
        cause: String,
        rollback_cause: String,
    },

    #[error("Session Error: {0}")]
    Session(String),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal Error: {0}")]
    Internal(String),
}

impl DockhandError {
    /// Stable machine-readable code surfaced to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            DockhandError::NotFound(_) => "NOT_FOUND",
            DockhandError::PreconditionFailed(_) => "PRECONDITION_FAILED",
            DockhandError::Conflict(_) => "CONFLICT",
            DockhandError::InvalidRequest(_) => "INVALID_REQUEST",
            DockhandError::EngineUnavailable(_) => "ENGINE_UNAVAILABLE",
            DockhandError::Engine(_) => "ENGINE_ERROR",
            DockhandError::RecreateRestored { .. } => "RECREATE_ROLLED_BACK",
            DockhandError::RecreateFatal { .. } => "ROLLBACK_FAILED",
            DockhandError::Session(_) => "SESSION_ERROR",
            DockhandError::Io(_) => "IO_ERROR",
            DockhandError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DockhandError::NotFound(_))
    }
}

// Define the primary Result type for dockhand operations
pub type Result<T> = std::result::Result<T, DockhandError>;

/// Byte stream produced by an interactive exec, plus its stdin half.
pub struct ExecChannel {
    pub output: BoxStream<'static, Result<Vec<u8>>>,
    pub input: Pin<Box<dyn tokio::io::AsyncWrite + Send>>,
}

/// Typed facade over the container engine. Every value crossing this
/// boundary is an explicit record; raw engine payloads never leak upward.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    async fn ping(&self) -> Result<()>;
    /// Returns `(engine version, api version)`.
    async fn version(&self) -> Result<(String, String)>;
    /// Swarm local node state (`"active"`, `"inactive"`, ...), if reported.
    async fn swarm_state(&self) -> Result<Option<String>>;

    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerRecord>>;
    async fn inspect_container(&self, id: &str) -> Result<ContainerRecord>;
    async fn container_logs(&self, id: &str, query: LogQuery) -> Result<Vec<String>>;
    fn stats_stream(&self, id: &str) -> BoxStream<'static, Result<StatsSample>>;
    async fn stats_once(&self, id: &str) -> Result<StatsSample>;

    async fn start_container(&self, id: &str) -> Result<()>;
    async fn stop_container(&self, id: &str) -> Result<()>;
    async fn restart_container(&self, id: &str) -> Result<()>;
    async fn remove_container(&self, id: &str, force: bool) -> Result<()>;
    /// Creates (never starts) a container and returns its id.
    async fn create_container(&self, config: &ContainerConfig) -> Result<String>;

    async fn list_networks(&self) -> Result<Vec<NetworkRecord>>;
    async fn inspect_network(&self, id: &str) -> Result<NetworkRecord>;
    async fn create_network(&self, spec: &NetworkSpec) -> Result<()>;
    async fn remove_network(&self, id: &str) -> Result<()>;
    async fn connect_network(
        &self,
        network: &str,
        container: &str,
        ipv4_address: Option<&str>,
    ) -> Result<()>;
    async fn disconnect_network(&self, network: &str, container: &str) -> Result<()>;

    async fn list_volumes(&self) -> Result<Vec<VolumeRecord>>;
    async fn inspect_volume(&self, name: &str) -> Result<VolumeRecord>;
    async fn create_volume(&self, spec: &VolumeSpec) -> Result<VolumeRecord>;
    async fn remove_volume(&self, name: &str) -> Result<()>;

    async fn list_images(&self) -> Result<Vec<ImageRecord>>;
    async fn inspect_image(&self, reference: &str) -> Result<ImageRecord>;
    async fn remove_image(&self, id: &str, force: bool) -> Result<()>;
    fn pull_image(&self, repository: &str, tag: &str) -> BoxStream<'static, Result<PullProgress>>;

    async fn open_exec(&self, container: &str, cmd: Vec<String>) -> Result<ExecChannel>;
}
