use dockhand_common::{ContainerEngine, ContainerRecord, DockhandError, Result};
use tracing::{debug, warn};

// Re-export dependencies potentially needed by consumers (like the gateway)
pub use bollard;
pub use dockhand_common as common;

pub mod classify;
pub mod commands;
pub mod create;
pub mod docker;
pub mod logs;
pub mod metrics;
pub mod overview;
pub mod pull;
pub mod queries;
pub mod recreate;
pub mod streaming;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use docker::{map_bollard_error, DockerEngine, DockerError};
pub use recreate::{AttachMount, ConfigMutation, ContainerLocks, RecreateManager, RecreateOutcome};
pub use streaming::{CloseOnce, SessionFrame, StatsMessage};

/// Find a container by exact name or by id prefix, across stopped ones too.
///
/// The engine resolves ids, names and unique id prefixes in one inspect;
/// only a miss falls back to scanning the listing for a case-insensitive
/// id prefix.
pub async fn resolve_container(
    engine: &dyn ContainerEngine,
    ident: &str,
) -> Result<ContainerRecord> {
    let ident = ident.trim();
    if ident.is_empty() {
        return Err(DockhandError::NotFound("Container '' not found".to_string()));
    }

    match engine.inspect_container(ident).await {
        Ok(record) => return Ok(record),
        Err(e @ DockhandError::EngineUnavailable(_)) => return Err(e),
        Err(e) => debug!(%ident, error = %e, "Direct inspect missed, scanning containers"),
    }

    let id_prefix = ident.to_lowercase();
    let containers = engine.list_containers(true).await?;
    match containers.into_iter().find(|c| c.id.starts_with(&id_prefix)) {
        Some(container) => {
            debug!(container = %container.name, id = %container.short_id(), "Matched container");
            Ok(container)
        }
        None => {
            warn!(%ident, "Container not found");
            Err(DockhandError::NotFound(format!("Container '{ident}' not found")))
        }
    }
}
