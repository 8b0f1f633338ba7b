//! Container creation with a step-by-step plain text narration.
//!
//! Every line is newline-terminated. A failure ends the stream after a
//! line explaining it; nothing is rolled back. A dry run performs every
//! read-only check and stops before the first mutation.

use std::fmt::Display;
use std::sync::Arc;

use chrono::Utc;
use dockhand_common::api::CreateContainerRequest;
use dockhand_common::{
    ContainerConfig, ContainerEngine, HostPortBinding, LogQuery, MountSpec, MountType,
    RestartPolicy, VolumeSpec,
};
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::{info, warn};

pub const TOTAL_STEPS: usize = 10;

/// Lines of output shown when a container exits right after starting.
pub const EXIT_LOG_LINES: usize = 10;

pub fn default_command() -> Vec<String> {
    vec![
        "sh".to_string(),
        "-c".to_string(),
        "while true; do sleep 30; done".to_string(),
    ]
}

pub fn default_restart_policy() -> RestartPolicy {
    RestartPolicy {
        name: "unless-stopped".to_string(),
        maximum_retry_count: 0,
    }
}

fn step(n: usize, title: &str) -> String {
    format!("\n[{n}/{TOTAL_STEPS}] {title}\n")
}

fn or_none<T: Display>(value: Option<T>, none: &str) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| none.to_string())
}

fn short(id: &str) -> String {
    id.chars().take(12).collect()
}

/// Resolve request defaults into a creation config. Networks are left
/// empty; they are connected after creation.
pub fn build_config(request: &CreateContainerRequest) -> ContainerConfig {
    let command = request
        .command
        .clone()
        .filter(|c| !c.is_empty())
        .unwrap_or_else(default_command);

    ContainerConfig {
        name: request.name.clone(),
        image: request.image.clone(),
        command: Some(command),
        entrypoint: request.entrypoint.clone().filter(|e| !e.is_empty()),
        env: request
            .environment
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect(),
        labels: request.labels.clone(),
        working_dir: request.working_dir.clone().filter(|w| !w.is_empty()),
        user: request.user.clone().filter(|u| !u.is_empty()),
        tty: request.tty.unwrap_or(true),
        port_bindings: request
            .ports
            .iter()
            .map(|(container, host)| {
                (
                    format!("{container}/tcp"),
                    vec![HostPortBinding {
                        host_ip: None,
                        host_port: host.to_string(),
                    }],
                )
            })
            .collect(),
        restart_policy: request
            .restart_policy
            .clone()
            .unwrap_or_else(default_restart_policy),
        mounts: request
            .volume_mounts
            .iter()
            .map(|v| MountSpec {
                source: v.volume_name.clone(),
                target: v.mount_path.clone(),
                mount_type: MountType::Volume,
                read_only: v.read_only,
            })
            .collect(),
        network_mode: None,
        networks: Vec::new(),
    }
}

fn describe_config(config: &ContainerConfig, request: &CreateContainerRequest) -> Vec<String> {
    let list = |items: Vec<String>| {
        if items.is_empty() {
            "None".to_string()
        } else {
            items.join(", ")
        }
    };
    vec![
        "\nConfiguration:\n".to_string(),
        format!("  - Image:         {}\n", config.image),
        format!("  - Name:          {}\n", config.name),
        format!("  - Command:       {}\n", list(config.command.clone().unwrap_or_default())),
        format!("  - TTY:           {}\n", config.tty),
        format!(
            "  - RestartPolicy: {} ({})\n",
            config.restart_policy.name, config.restart_policy.maximum_retry_count
        ),
        format!("  - Ports:         {}\n", list(config.port_bindings.iter().map(|(p, b)| {
            let host = b.first().map(|h| h.host_port.as_str()).unwrap_or_default();
            format!("{p} -> {host}")
        }).collect())),
        format!("  - Networks:      {}\n", list(request.networks.clone())),
        format!("  - Working Dir:   {}\n", or_none(config.working_dir.as_ref(), "None")),
        format!(
            "  - Entrypoint:    {}\n",
            or_none(config.entrypoint.as_ref().map(|e| e.join(" ")), "None")
        ),
        format!("  - User:          {}\n", or_none(config.user.as_ref(), "Default")),
        format!("  - Env:           {}\n", list(config.env.clone())),
        format!(
            "  - Labels:        {}\n",
            list(config.labels.iter().map(|(k, v)| format!("{k}={v}")).collect())
        ),
    ]
}

/// Create (and by default start) a container, narrating each step.
pub fn create_container_stream(
    engine: Arc<dyn ContainerEngine>,
    request: CreateContainerRequest,
) -> BoxStream<'static, String> {
    Box::pin(async_stream::stream! {
        let mode = if request.dry_run { "dry-run" } else { "creation" };
        yield format!(
            "Starting {mode} of container '{}' at {}\n",
            request.name,
            Utc::now().to_rfc3339()
        );

        // 1: engine handshake
        yield step(1, "Initializing Docker client...");
        match engine.version().await {
            Ok((version, api_version)) => {
                yield format!("Docker client ready (v{version}, API {api_version})\n");
            }
            Err(e) => {
                warn!(container = %request.name, error = %e, "Docker handshake failed");
                yield format!("Docker client init failed: {e}\n");
                return;
            }
        }

        // 2: configuration
        yield step(2, "Preparing and validating configuration...");
        if request.command.as_ref().map_or(true, |c| c.is_empty()) {
            yield "No command provided. Using default infinite loop to keep container alive.\n"
                .to_string();
        }
        let mut config = build_config(&request);
        let start_after_create = request.start_after_create.unwrap_or(true);
        for line in describe_config(&config, &request) {
            yield line;
        }

        // 3: image
        yield step(3, "Checking image...");
        match engine.inspect_image(&request.image).await {
            Ok(image) => {
                let tags = if image.tags.is_empty() {
                    "<none>".to_string()
                } else {
                    image.tags.join(", ")
                };
                let digest = image
                    .repo_digests
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "<unknown>".to_string());
                yield format!(
                    "Image '{}' found (tags: {tags}, digest: {digest}, created: {})\n",
                    request.image,
                    or_none(image.created.as_ref(), "Unknown")
                );
            }
            Err(e) if e.is_not_found() => {
                if request.dry_run {
                    yield format!(
                        "[Dry Run] Image '{}' would be pulled from registry.\n",
                        request.image
                    );
                } else {
                    yield format!("Pulling image '{}'...\n", request.image);
                    let (repository, tag) = split_reference(&request.image);
                    let mut events = engine.pull_image(&repository, &tag);
                    while let Some(event) = events.next().await {
                        match event {
                            Ok(event) => {
                                let status = event.status.unwrap_or_default();
                                let progress = event.progress.unwrap_or_default();
                                yield match event.id {
                                    Some(layer) => format!("    [{layer}] {status} {progress}\n"),
                                    None => format!("    {status}\n"),
                                };
                            }
                            Err(e) => {
                                yield format!("Failed to pull image '{}': {e}\n", request.image);
                                return;
                            }
                        }
                    }
                    yield format!("Image '{}' pulled.\n", request.image);
                }
            }
            Err(e) => {
                yield format!("Failed to inspect image '{}': {e}\n", request.image);
                return;
            }
        }

        // 4: volumes
        yield step(4, "Validating volumes...");
        if request.volume_mounts.is_empty() {
            yield "No volumes specified.\n".to_string();
        }
        for mount in &request.volume_mounts {
            match engine.inspect_volume(&mount.volume_name).await {
                Ok(volume) => {
                    yield format!(
                        "Volume '{}' exists. Driver: {}\n",
                        mount.volume_name, volume.driver
                    );
                }
                Err(e) if e.is_not_found() => {
                    if request.dry_run {
                        yield format!("[Dry Run] Would create volume '{}'\n", mount.volume_name);
                    } else {
                        let spec = VolumeSpec {
                            name: mount.volume_name.clone(),
                            ..Default::default()
                        };
                        match engine.create_volume(&spec).await {
                            Ok(_) => yield format!("Created volume '{}'\n", mount.volume_name),
                            Err(e) => {
                                yield format!(
                                    "Failed to create volume '{}': {e}\n",
                                    mount.volume_name
                                );
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    yield format!("Failed to inspect volume '{}': {e}\n", mount.volume_name);
                    return;
                }
            }
        }

        // 5: networks
        yield step(5, "Validating networks...");
        let mut networks = Vec::new();
        for name in &request.networks {
            match engine.inspect_network(name).await {
                Ok(network) => {
                    yield format!(
                        "Network '{}' is ready (ID: {}, Driver: {})\n",
                        network.name,
                        short(&network.id),
                        network.driver
                    );
                    networks.push(network.name);
                }
                Err(e) if e.is_not_found() => {
                    yield format!("Network '{name}' not found. Skipping connection.\n");
                }
                Err(e) => {
                    yield format!(
                        "Failed to inspect network '{name}': {e}. Skipping connection.\n"
                    );
                }
            }
        }

        // 6: name collision
        yield step(6, "Checking for existing container...");
        let existing = match engine.list_containers(true).await {
            Ok(containers) => containers.into_iter().find(|c| c.name == request.name),
            Err(e) => {
                yield format!("Failed to list containers: {e}\n");
                return;
            }
        };
        match existing {
            Some(existing) => {
                yield format!(
                    "A container named '{}' already exists (ID: {})\n",
                    request.name,
                    existing.short_id()
                );
                if request.dry_run {
                    let action = if request.force_recreate {
                        "removed"
                    } else {
                        "kept, aborting creation"
                    };
                    yield format!("[Dry Run] Existing container would be {action}.\n");
                } else if request.force_recreate {
                    yield "Removing existing container...\n".to_string();
                    if let Err(e) = engine.remove_container(&existing.id, true).await {
                        yield format!("Failed to remove existing container: {e}\n");
                        return;
                    }
                    yield "Existing container removed.\n".to_string();
                } else {
                    yield "Aborting. Use `force_recreate=true` to overwrite.\n".to_string();
                    return;
                }
            }
            None => yield "No existing container found.\n".to_string(),
        }

        if request.dry_run {
            yield "\nDry-run complete. No changes made.\n".to_string();
            return;
        }

        // 7: create
        yield step(7, "Creating container...");
        config.networks = networks.clone();
        let container_id = match engine.create_container(&config).await {
            Ok(id) => {
                info!(container = %request.name, container_id = %id, "Container created");
                yield format!("Container created (ID: {})\n", short(&id));
                id
            }
            Err(e) => {
                warn!(container = %request.name, error = %e, "Create failed");
                yield format!("Failed to create container: {e}\n");
                return;
            }
        };

        // 8: networks
        if !networks.is_empty() {
            yield step(8, "Connecting container to networks...");
            for network in &networks {
                match engine.connect_network(network, &container_id, None).await {
                    Ok(()) => yield format!("Connected to network '{network}'\n"),
                    Err(e) => yield format!("Failed to connect to '{network}': {e}\n"),
                }
            }
        }

        // 9: start
        if start_after_create {
            yield step(9, "Starting container...");
            if let Err(e) = engine.start_container(&container_id).await {
                yield format!("Failed to start container: {e}\n");
            } else {
                yield format!("Container '{}' started successfully.\n", request.name);
                match engine.inspect_container(&container_id).await {
                    Ok(record) if record.raw_status == "exited" => {
                        yield format!(
                            "Container exited immediately (ExitCode={})\n",
                            or_none(record.exit_code, "unknown")
                        );
                        match engine
                            .container_logs(&container_id, LogQuery::tail(EXIT_LOG_LINES))
                            .await
                        {
                            Ok(lines) if !lines.is_empty() => {
                                yield format!("\nLast logs:\n{}\n", lines.join("\n"));
                            }
                            _ => yield "No logs captured.\n".to_string(),
                        }
                    }
                    Ok(record) => {
                        let ip = record
                            .networks
                            .values()
                            .find_map(|n| n.ip_address.clone().filter(|ip| !ip.is_empty()))
                            .or(record.ip_address.clone().filter(|ip| !ip.is_empty()))
                            .unwrap_or_else(|| "unknown".to_string());
                        yield format!("Status: {} | IP: {ip}\n", record.raw_status);
                    }
                    Err(e) => yield format!("Could not inspect started container: {e}\n"),
                }
            }
        } else {
            yield "\nSkipping start due to `start_after_create=false`\n".to_string();
        }

        yield format!(
            "\n[{TOTAL_STEPS}/{TOTAL_STEPS}] Done. Container '{}' is ready.\n",
            request.name
        );
    })
}

/// Split `repo[:tag]` into repository and tag, keeping registry ports
/// (`host:5000/app`) in the repository.
pub fn split_reference(reference: &str) -> (String, String) {
    match reference.rsplit_once(':') {
        Some((repo, tag)) if !tag.contains('/') => (repo.to_string(), tag.to_string()),
        _ => (reference.to_string(), "latest".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockhand_common::api::VolumeMountRequest;
    use std::collections::BTreeMap;

    #[test]
    fn test_build_config_defaults() {
        let request = CreateContainerRequest {
            name: "web".to_string(),
            image: "nginx:1.25".to_string(),
            ports: BTreeMap::from([(80, 8080)]),
            environment: BTreeMap::from([("MODE".to_string(), "prod".to_string())]),
            volume_mounts: vec![VolumeMountRequest {
                volume_name: "data".to_string(),
                mount_path: "/data".to_string(),
                read_only: true,
            }],
            ..Default::default()
        };
        let config = build_config(&request);
        assert_eq!(config.command, Some(default_command()));
        assert!(config.tty);
        assert_eq!(config.restart_policy, default_restart_policy());
        assert_eq!(config.env, vec!["MODE=prod".to_string()]);
        assert_eq!(config.port_bindings["80/tcp"][0].host_port, "8080");
        assert_eq!(config.mounts[0].mount_type, MountType::Volume);
        assert!(config.mounts[0].read_only);
        assert!(config.networks.is_empty());
    }

    #[test]
    fn test_build_config_keeps_explicit_values() {
        let request = CreateContainerRequest {
            name: "job".to_string(),
            image: "alpine".to_string(),
            command: Some(vec!["echo".to_string(), "hi".to_string()]),
            tty: Some(false),
            working_dir: Some(String::new()),
            ..Default::default()
        };
        let config = build_config(&request);
        assert_eq!(config.command, Some(vec!["echo".to_string(), "hi".to_string()]));
        assert!(!config.tty);
        assert_eq!(config.working_dir, None);
    }

    #[test]
    fn test_split_reference() {
        assert_eq!(split_reference("alpine"), ("alpine".to_string(), "latest".to_string()));
        assert_eq!(split_reference("nginx:1.25"), ("nginx".to_string(), "1.25".to_string()));
        assert_eq!(
            split_reference("registry:5000/app"),
            ("registry:5000/app".to_string(), "latest".to_string())
        );
    }
}
