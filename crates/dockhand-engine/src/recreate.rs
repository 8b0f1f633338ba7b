//! Snapshot and recreate transaction for configuration changes the engine
//! cannot apply to an existing container, such as adding a mount.
//!
//! The transaction runs `validate -> snapshot -> remove -> recreate ->
//! reconnect`. Everything before `remove` is side-effect free. Once the
//! container is removed, a failed recreate always routes through a
//! rollback that recreates the captured configuration.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dockhand_common::{
    ContainerConfig, ContainerEngine, ContainerRecord, DockhandError, MountSpec, MountType,
    Result,
};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info, instrument, warn};

use crate::resolve_container;

/// A change to a container's creation-time configuration.
#[async_trait]
pub trait ConfigMutation: Send + Sync {
    /// Short verb phrase used in messages, e.g. `attach volume`.
    fn describe(&self) -> String;

    /// Whether the live container already reflects this change.
    fn is_satisfied(&self, container: &ContainerRecord) -> bool;

    /// Check external prerequisites before anything destructive happens.
    async fn validate(&self, engine: &dyn ContainerEngine) -> Result<()>;

    /// Apply the change to a captured configuration.
    fn apply(&self, config: &mut ContainerConfig) -> Result<()>;

    fn satisfied_message(&self, container: &str) -> String;

    fn must_stop_message(&self) -> String {
        "Container must be stopped before it can be recreated. Please stop it first.".to_string()
    }

    fn success_message(&self, container: &str) -> String;
}

/// Adds a volume or bind mount to a container.
#[derive(Debug, Clone)]
pub struct AttachMount {
    pub mount: MountSpec,
}

impl AttachMount {
    pub fn volume(name: impl Into<String>, target: impl Into<String>, read_only: bool) -> Self {
        Self {
            mount: MountSpec {
                source: name.into(),
                target: target.into(),
                mount_type: MountType::Volume,
                read_only,
            },
        }
    }

    fn noun(&self) -> &'static str {
        match self.mount.mount_type {
            MountType::Volume => "Volume",
            MountType::Bind => "Bind mount",
        }
    }
}

#[async_trait]
impl ConfigMutation for AttachMount {
    fn describe(&self) -> String {
        match self.mount.mount_type {
            MountType::Volume => "attach volume".to_string(),
            MountType::Bind => "attach bind mount".to_string(),
        }
    }

    fn is_satisfied(&self, container: &ContainerRecord) -> bool {
        container.mounts.iter().any(|m| {
            let source = match self.mount.mount_type {
                MountType::Volume => m.name.as_deref(),
                MountType::Bind => m.source.as_deref(),
            };
            m.destination == self.mount.target && source == Some(self.mount.source.as_str())
        })
    }

    async fn validate(&self, engine: &dyn ContainerEngine) -> Result<()> {
        if self.mount.target.is_empty() || !self.mount.target.starts_with('/') {
            return Err(DockhandError::InvalidRequest(format!(
                "Mount path '{}' must be an absolute path.",
                self.mount.target
            )));
        }
        if self.mount.mount_type == MountType::Volume {
            engine.inspect_volume(&self.mount.source).await.map_err(|e| {
                if e.is_not_found() {
                    DockhandError::NotFound(format!("Volume '{}' not found", self.mount.source))
                } else {
                    e
                }
            })?;
        }
        Ok(())
    }

    fn apply(&self, config: &mut ContainerConfig) -> Result<()> {
        if let Some(existing) = config.mounts.iter().find(|m| m.target == self.mount.target) {
            return Err(DockhandError::PreconditionFailed(format!(
                "Mount path '{}' is already used by '{}' in container '{}'.",
                self.mount.target, existing.source, config.name
            )));
        }
        config.mounts.push(self.mount.clone());
        Ok(())
    }

    fn satisfied_message(&self, container: &str) -> String {
        format!(
            "{} '{}' is already mounted at '{}' in container '{}'.",
            self.noun(),
            self.mount.source,
            self.mount.target,
            container
        )
    }

    fn must_stop_message(&self) -> String {
        format!(
            "Container must be stopped before attaching a {}. Please stop it first.",
            self.noun().to_lowercase()
        )
    }

    fn success_message(&self, container: &str) -> String {
        format!(
            "{} '{}' attached and container '{}' was recreated successfully.",
            self.noun(),
            self.mount.source,
            container
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecreateOutcome {
    /// Nothing to do; no snapshot taken and the engine was not touched.
    AlreadySatisfied { container: String, message: String },
    Completed {
        container: String,
        container_id: String,
        message: String,
    },
}

impl RecreateOutcome {
    pub fn message(&self) -> &str {
        match self {
            RecreateOutcome::AlreadySatisfied { message, .. } => message,
            RecreateOutcome::Completed { message, .. } => message,
        }
    }
}

/// Per-container-name mutual exclusion for recreate transactions.
#[derive(Clone, Default)]
pub struct ContainerLocks {
    inner: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

pub struct ContainerLockGuard {
    name: String,
    guard: Option<OwnedMutexGuard<()>>,
    table: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl ContainerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for `name`, or fail with `Conflict` if another
    /// transaction holds it.
    pub fn try_acquire(&self, name: &str) -> Result<ContainerLockGuard> {
        let lock = self.inner.entry(name.to_string()).or_default().clone();
        let guard = lock.try_lock_owned().map_err(|_| {
            DockhandError::Conflict(format!(
                "Another recreate is already in progress for container '{name}'."
            ))
        })?;
        Ok(ContainerLockGuard {
            name: name.to_string(),
            guard: Some(guard),
            table: self.inner.clone(),
        })
    }

    pub fn held(&self) -> usize {
        self.inner.len()
    }
}

impl Drop for ContainerLockGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the table itself still references an idle lock.
        self.table
            .remove_if(&self.name, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[derive(Clone)]
pub struct RecreateManager {
    engine: Arc<dyn ContainerEngine>,
    locks: ContainerLocks,
}

impl RecreateManager {
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self {
            engine,
            locks: ContainerLocks::new(),
        }
    }

    pub fn with_locks(engine: Arc<dyn ContainerEngine>, locks: ContainerLocks) -> Self {
        Self { engine, locks }
    }

    pub fn locks(&self) -> &ContainerLocks {
        &self.locks
    }

    #[instrument(skip(self, mutation), fields(action = %mutation.describe()))]
    pub async fn apply(
        &self,
        container: &str,
        mutation: &dyn ConfigMutation,
    ) -> Result<RecreateOutcome> {
        let engine = self.engine.as_ref();
        let resolved = resolve_container(engine, container).await?;
        let name = resolved.name.clone();

        if mutation.is_satisfied(&resolved) {
            info!(container = %name, "Mutation already satisfied, nothing to recreate");
            return Ok(RecreateOutcome::AlreadySatisfied {
                message: mutation.satisfied_message(&name),
                container: name,
            });
        }

        let _lock = self.locks.try_acquire(&name)?;

        // Re-read under the lock; the listing may be stale.
        let record = engine.inspect_container(&resolved.id).await?;
        if record.is_running() {
            return Err(DockhandError::PreconditionFailed(
                mutation.must_stop_message(),
            ));
        }
        mutation.validate(engine).await?;

        let snapshot = ContainerConfig::snapshot(&record)?;
        let mut desired = snapshot.clone();
        mutation.apply(&mut desired)?;

        info!(container = %name, "Removing container for recreate");
        engine.remove_container(&record.id, false).await?;

        match engine.create_container(&desired).await {
            Ok(container_id) => {
                self.reconnect(&name, &container_id, &desired.networks).await;
                info!(container = %name, %container_id, "Container recreated");
                Ok(RecreateOutcome::Completed {
                    message: mutation.success_message(&name),
                    container: name,
                    container_id,
                })
            }
            Err(cause) => self.roll_back(&snapshot, mutation, cause).await,
        }
    }

    /// Convenience wrapper for the volume case.
    pub async fn attach_volume(
        &self,
        container: &str,
        volume: &str,
        mount_path: &str,
        read_only: bool,
    ) -> Result<RecreateOutcome> {
        self.apply(container, &AttachMount::volume(volume, mount_path, read_only))
            .await
    }

    async fn roll_back(
        &self,
        snapshot: &ContainerConfig,
        mutation: &dyn ConfigMutation,
        cause: DockhandError,
    ) -> Result<RecreateOutcome> {
        let container = snapshot.name.clone();
        warn!(%container, error = %cause, "Recreate failed, restoring original container");

        match self.engine.create_container(snapshot).await {
            Ok(container_id) => {
                self.reconnect(&container, &container_id, &snapshot.networks)
                    .await;
                info!(%container, %container_id, "Original container restored");
                Err(DockhandError::RecreateRestored {
                    container,
                    action: mutation.describe(),
                    cause: cause.to_string(),
                })
            }
            Err(rollback_err) => {
                error!(
                    target: "dockhand::rollback",
                    severity = "critical",
                    %container,
                    error = %cause,
                    rollback_error = %rollback_err,
                    "Rollback failed, container is gone and needs manual recovery"
                );
                Err(DockhandError::RecreateFatal {
                    container,
                    action: mutation.describe(),
                    cause: cause.to_string(),
                    rollback_cause: rollback_err.to_string(),
                })
            }
        }
    }

    /// Best-effort: reconnect networks the new container is not already on.
    async fn reconnect(&self, container: &str, container_id: &str, networks: &[String]) {
        let attached = match self.engine.inspect_container(container_id).await {
            Ok(record) => record.networks,
            Err(e) => {
                warn!(%container, error = %e, "Could not inspect recreated container");
                Default::default()
            }
        };

        for network in networks.iter().filter(|n| !attached.contains_key(*n)) {
            if let Err(e) = self
                .engine
                .connect_network(network, container_id, None)
                .await
            {
                warn!(%container, %network, error = %e, "Failed to reconnect network");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_conflicts_then_releases() {
        let locks = ContainerLocks::new();
        let guard = locks.try_acquire("web").unwrap();
        assert!(matches!(
            locks.try_acquire("web"),
            Err(DockhandError::Conflict(_))
        ));
        assert!(locks.try_acquire("db").is_ok());
        drop(guard);
        assert_eq!(locks.held(), 0);
        assert!(locks.try_acquire("web").is_ok());
    }

    #[test]
    fn test_attach_mount_rejects_target_collision() {
        let mut config = ContainerConfig {
            name: "web".to_string(),
            mounts: vec![MountSpec {
                source: "a".to_string(),
                target: "/data".to_string(),
                mount_type: MountType::Volume,
                read_only: false,
            }],
            ..Default::default()
        };
        let err = AttachMount::volume("b", "/data", false)
            .apply(&mut config)
            .unwrap_err();
        assert!(matches!(err, DockhandError::PreconditionFailed(_)));
        assert_eq!(config.mounts.len(), 1);

        AttachMount::volume("b", "/other", true)
            .apply(&mut config)
            .unwrap();
        assert_eq!(config.mounts.len(), 2);
        assert!(config.mounts[1].read_only);
    }

    #[test]
    fn test_attach_mount_messages() {
        let mutation = AttachMount::volume("data", "/data", false);
        assert_eq!(mutation.describe(), "attach volume");
        assert_eq!(
            mutation.success_message("web"),
            "Volume 'data' attached and container 'web' was recreated successfully."
        );
    }
}
