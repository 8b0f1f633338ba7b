//! Mutating operations on containers, images, volumes and networks.
//!
//! Advisory refusals (already connected, not connected, container running
//! during an attach) come back as a soft `GenericMessageResponse` with
//! `success = false`; workflow refusals are raised as errors.

use dockhand_common::api::{
    CreateDockerNetworkRequest, CreateVolumeRequest, CreatedVolumeResponse,
    GenericMessageResponse,
};
use dockhand_common::{
    ContainerEngine, ContainerRecord, DockhandError, NetworkSpec, Result, VolumeSpec,
};
use tracing::{info, instrument, warn};

use crate::recreate::{RecreateManager, RecreateOutcome};
use crate::resolve_container;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Start,
    Stop,
    Restart,
}

impl Lifecycle {
    fn past_tense(self) -> &'static str {
        match self {
            Lifecycle::Start => "started",
            Lifecycle::Stop => "stopped",
            Lifecycle::Restart => "restarted",
        }
    }
}

#[instrument(skip(engine))]
pub async fn lifecycle(
    engine: &dyn ContainerEngine,
    container: &str,
    action: Lifecycle,
) -> Result<GenericMessageResponse> {
    let record = resolve_container(engine, container).await?;
    match action {
        Lifecycle::Start => engine.start_container(&record.id).await?,
        Lifecycle::Stop => engine.stop_container(&record.id).await?,
        Lifecycle::Restart => engine.restart_container(&record.id).await?,
    }
    info!(container = %record.name, id = %record.short_id(), "Container {}", action.past_tense());
    Ok(GenericMessageResponse::ok(format!(
        "Container '{}' {}.",
        record.name,
        action.past_tense()
    )))
}

#[instrument(skip(engine))]
pub async fn delete_container(
    engine: &dyn ContainerEngine,
    container: &str,
    force: bool,
) -> Result<GenericMessageResponse> {
    let record = resolve_container(engine, container).await?;
    if record.is_running() && !force {
        return Err(DockhandError::PreconditionFailed(format!(
            "Container '{}' is running. Use `force=true` to remove it.",
            record.name
        )));
    }
    engine.remove_container(&record.id, force).await?;
    info!(container = %record.name, "Container deleted");
    Ok(GenericMessageResponse::ok(format!(
        "Container '{}' deleted successfully.",
        record.name
    )))
}

#[instrument(skip(engine, request), fields(volume = %request.name))]
pub async fn create_volume(
    engine: &dyn ContainerEngine,
    request: &CreateVolumeRequest,
) -> Result<CreatedVolumeResponse> {
    let spec = VolumeSpec {
        name: request.name.clone(),
        driver: Some(request.driver.clone()),
        labels: request.labels.clone(),
        driver_opts: request.driver_opts.clone(),
    };
    let volume = engine.create_volume(&spec).await.map_err(|e| match e {
        DockhandError::Engine(msg)
        | DockhandError::Conflict(msg)
        | DockhandError::InvalidRequest(msg) => {
            warn!(volume = %request.name, error = %msg, "Engine rejected volume");
            DockhandError::InvalidRequest(format!("Error creating volume: {msg}"))
        }
        other => other,
    })?;
    info!(volume = %volume.name, "Volume created");
    Ok(CreatedVolumeResponse {
        name: volume.name,
        driver: volume.driver,
        mountpoint: volume.mountpoint,
        created_at: volume.created_at,
        labels: volume.labels,
        options: volume.options,
    })
}

fn mounting_volume<'a>(
    containers: &'a [ContainerRecord],
    volume: &str,
) -> Option<&'a ContainerRecord> {
    containers
        .iter()
        .find(|c| c.mounts.iter().any(|m| m.name.as_deref() == Some(volume)))
}

#[instrument(skip(engine))]
pub async fn delete_volume(
    engine: &dyn ContainerEngine,
    name: &str,
) -> Result<GenericMessageResponse> {
    engine.inspect_volume(name).await.map_err(|e| {
        if e.is_not_found() {
            DockhandError::NotFound(format!("Volume '{name}' not found"))
        } else {
            e
        }
    })?;

    let containers = engine.list_containers(true).await?;
    if let Some(user) = mounting_volume(&containers, name) {
        return Err(DockhandError::PreconditionFailed(format!(
            "Cannot delete volume '{name}': in use by container '{}'",
            user.name
        )));
    }

    engine.remove_volume(name).await?;
    info!(volume = %name, "Volume deleted");
    Ok(GenericMessageResponse::ok(format!(
        "Volume '{name}' deleted successfully."
    )))
}

#[instrument(skip(engine, request), fields(network = %request.name))]
pub async fn create_network(
    engine: &dyn ContainerEngine,
    request: &CreateDockerNetworkRequest,
) -> Result<GenericMessageResponse> {
    if request.check_duplicate {
        let networks = engine.list_networks().await?;
        if networks.iter().any(|n| n.name == request.name) {
            return Err(DockhandError::Conflict(format!(
                "A network with the name '{}' already exists.",
                request.name
            )));
        }
    }

    let spec = NetworkSpec {
        name: request.name.clone(),
        driver: Some(request.driver.clone()),
        labels: request.labels.clone(),
        check_duplicate: request.check_duplicate,
    };
    engine.create_network(&spec).await?;
    info!(network = %request.name, driver = %request.driver, "Network created");
    Ok(GenericMessageResponse::ok(format!(
        "Network '{}' created successfully.",
        request.name
    )))
}

#[instrument(skip(engine))]
pub async fn delete_network(
    engine: &dyn ContainerEngine,
    network: &str,
    dry_run: bool,
) -> Result<GenericMessageResponse> {
    let record = engine.inspect_network(network).await.map_err(|e| {
        if e.is_not_found() {
            DockhandError::NotFound(format!("Network '{network}' not found"))
        } else {
            e
        }
    })?;

    if !record.containers.is_empty() {
        let names: Vec<&str> = record
            .containers
            .values()
            .map(|m| if m.name.is_empty() { "<unknown>" } else { m.name.as_str() })
            .collect();
        let message = format!(
            "Network '{}' is currently attached to container(s): {}. \
             Please disconnect all containers manually before deletion.",
            record.name,
            names.join(", ")
        );
        warn!(network = %record.name, "Deletion prevented, containers attached");
        return Err(DockhandError::PreconditionFailed(message));
    }

    if dry_run {
        return Ok(GenericMessageResponse::ok(format!(
            "Network '{}' can be safely deleted (no containers attached).",
            record.name
        )));
    }

    engine.remove_network(&record.id).await?;
    info!(network = %record.name, "Network deleted");
    Ok(GenericMessageResponse::ok(format!(
        "Network '{}' deleted successfully.",
        record.name
    )))
}

async fn require_network(engine: &dyn ContainerEngine, network: &str) -> Result<()> {
    engine.inspect_network(network).await.map(|_| ()).map_err(|e| {
        if e.is_not_found() {
            DockhandError::NotFound(format!("Network '{network}' not found"))
        } else {
            e
        }
    })
}

#[instrument(skip(engine))]
pub async fn assign_network(
    engine: &dyn ContainerEngine,
    container: &str,
    network: &str,
) -> Result<GenericMessageResponse> {
    let record = resolve_container(engine, container).await?;
    if record.networks.contains_key(network) {
        return Ok(GenericMessageResponse::rejected(
            400,
            format!(
                "Container '{}' is already connected to network '{network}'.",
                record.name
            ),
        ));
    }
    require_network(engine, network).await?;
    engine.connect_network(network, &record.id, None).await?;
    info!(container = %record.name, %network, "Network assigned");
    Ok(GenericMessageResponse::ok(format!(
        "Network '{network}' assigned to container '{}' successfully.",
        record.name
    )))
}

/// Connect several networks, reporting one line per network. Individual
/// failures are reported, not raised.
#[instrument(skip(engine))]
pub async fn assign_multiple_networks(
    engine: &dyn ContainerEngine,
    container: &str,
    networks: &[String],
) -> Result<GenericMessageResponse> {
    let record = resolve_container(engine, container).await?;
    let mut lines = Vec::with_capacity(networks.len());

    for network in networks {
        if record.networks.contains_key(network) {
            lines.push(format!("Already connected to '{network}'"));
            continue;
        }
        let connected = match require_network(engine, network).await {
            Ok(()) => engine.connect_network(network, &record.id, None).await,
            Err(e) => Err(e),
        };
        match connected {
            Ok(()) => lines.push(format!("Connected to '{network}'")),
            Err(e) if e.is_not_found() => lines.push(format!("Network '{network}' not found")),
            Err(e) => {
                warn!(container = %record.name, %network, error = %e, "Connect failed");
                lines.push(format!("Failed to connect to '{network}': {e}"));
            }
        }
    }

    Ok(GenericMessageResponse::ok(lines.join("\n")))
}

#[instrument(skip(engine))]
pub async fn assign_network_with_static_ip(
    engine: &dyn ContainerEngine,
    container: &str,
    network: &str,
    ipv4_address: Option<&str>,
) -> Result<GenericMessageResponse> {
    let record = resolve_container(engine, container).await?;
    if record.networks.contains_key(network) {
        return Ok(GenericMessageResponse::rejected(
            400,
            format!("Already connected to network '{network}'"),
        ));
    }
    require_network(engine, network).await?;
    engine
        .connect_network(network, &record.id, ipv4_address)
        .await?;

    let suffix = ipv4_address
        .map(|ip| format!(" with IP {ip}"))
        .unwrap_or_default();
    info!(container = %record.name, %network, ?ipv4_address, "Network assigned");
    Ok(GenericMessageResponse::ok(format!(
        "Network '{network}' assigned to container '{}'{suffix}.",
        record.name
    )))
}

#[instrument(skip(engine))]
pub async fn disconnect_network(
    engine: &dyn ContainerEngine,
    container: &str,
    network: &str,
) -> Result<GenericMessageResponse> {
    let record = resolve_container(engine, container).await?;
    if !record.networks.contains_key(network) {
        return Ok(GenericMessageResponse::rejected(
            400,
            format!(
                "Container '{}' is not connected to network '{network}'.",
                record.name
            ),
        ));
    }
    engine.disconnect_network(network, &record.id).await?;
    info!(container = %record.name, %network, "Network disconnected");
    Ok(GenericMessageResponse::ok(format!(
        "Network '{network}' disconnected from container '{}' successfully.",
        record.name
    )))
}

#[instrument(skip(engine))]
pub async fn delete_image(
    engine: &dyn ContainerEngine,
    image: &str,
) -> Result<GenericMessageResponse> {
    let record = engine.inspect_image(image).await.map_err(|e| {
        if e.is_not_found() {
            DockhandError::NotFound(format!("Image '{image}' not found"))
        } else {
            e
        }
    })?;

    let containers = engine.list_containers(true).await?;
    let users: Vec<&str> = containers
        .iter()
        .filter(|c| c.image_id == record.id)
        .map(|c| c.name.as_str())
        .collect();
    if !users.is_empty() {
        return Err(DockhandError::PreconditionFailed(format!(
            "Cannot delete image '{image}': used by container(s) {}",
            users.join(", ")
        )));
    }

    engine.remove_image(&record.id, true).await?;
    info!(%image, "Image deleted");
    Ok(GenericMessageResponse::ok(format!(
        "Image '{image}' deleted successfully."
    )))
}

/// Attach a named volume through the recreate transaction. A running
/// container is a soft refusal.
pub async fn attach_volume(
    manager: &RecreateManager,
    container: &str,
    volume: &str,
    mount_path: &str,
    read_only: bool,
) -> Result<GenericMessageResponse> {
    match manager
        .attach_volume(container, volume, mount_path, read_only)
        .await
    {
        Ok(RecreateOutcome::AlreadySatisfied { message, .. })
        | Ok(RecreateOutcome::Completed { message, .. }) => Ok(GenericMessageResponse::ok(message)),
        Err(DockhandError::PreconditionFailed(message)) => {
            Ok(GenericMessageResponse::rejected(400, message))
        }
        Err(e) => Err(e),
    }
}
