//! Recreate transaction tests against the in-memory engine

use std::collections::BTreeMap;
use std::sync::Arc;

use dockhand_common::{
    ContainerEngine, ContainerRecord, DockhandError, HostPortBinding, RestartPolicy,
};
use dockhand_engine::commands;
use dockhand_engine::test_utils::{container, network, volume, volume_mount, MockEngine};
use dockhand_engine::{RecreateManager, RecreateOutcome};

fn web_bindings() -> BTreeMap<String, Vec<HostPortBinding>> {
    BTreeMap::from([(
        "80/tcp".to_string(),
        vec![HostPortBinding {
            host_ip: Some("0.0.0.0".to_string()),
            host_port: "8080".to_string(),
        }],
    )])
}

/// A stopped container the way the engine reports it: configured port
/// bindings but no published ports.
fn stopped_web_record() -> ContainerRecord {
    let mut web = container("web", 1, "exited");
    web.mounts.push(volume_mount("logs", "/logs"));
    web.port_bindings = web_bindings();
    web.env = vec!["MODE=prod".to_string()];
    web.labels = BTreeMap::from([("team".to_string(), "infra".to_string())]);
    web.restart_policy = Some(RestartPolicy {
        name: "unless-stopped".to_string(),
        maximum_retry_count: 0,
    });
    web
}

fn stopped_web() -> MockEngine {
    MockEngine::new()
        .with_container(stopped_web_record())
        .with_network(network("backend", 1))
        .with_volume(volume("logs"))
        .with_volume(volume("data"))
        .with_attachment("web", "backend", "172.19.0.2")
}

fn destinations(record: &ContainerRecord) -> Vec<&str> {
    record.mounts.iter().map(|m| m.destination.as_str()).collect()
}

fn manager(engine: &MockEngine) -> RecreateManager {
    RecreateManager::new(Arc::new(engine.clone()))
}

#[tokio::test]
async fn test_attach_volume_recreates_with_mount() {
    let engine = stopped_web();
    let original = engine.container_named("web").unwrap();

    let outcome = manager(&engine)
        .attach_volume("web", "data", "/data", false)
        .await
        .unwrap();

    let RecreateOutcome::Completed {
        container,
        container_id,
        message,
    } = outcome
    else {
        panic!("expected a completed recreate");
    };
    assert_eq!(container, "web");
    assert_eq!(
        message,
        "Volume 'data' attached and container 'web' was recreated successfully."
    );

    let recreated = engine.container_named("web").unwrap();
    assert_eq!(recreated.id, container_id);
    assert_ne!(recreated.id, original.id);
    assert_eq!(recreated.image, original.image);
    assert_eq!(recreated.command, original.command);
    assert_eq!(destinations(&recreated), vec!["/logs", "/data"]);
    assert_eq!(recreated.mounts[0].name.as_deref(), Some("logs"));
    assert_eq!(recreated.mounts[1].name.as_deref(), Some("data"));
    assert_eq!(recreated.port_bindings, web_bindings());
    assert_eq!(recreated.env, original.env);
    assert_eq!(recreated.labels, original.labels);
    assert_eq!(recreated.restart_policy, original.restart_policy);
    assert!(recreated.networks.contains_key("backend"));
}

#[tokio::test]
async fn test_failed_create_restores_original() {
    let engine = stopped_web();
    engine.fail_once("create_container", Some("web"), || {
        DockhandError::Engine("invalid mount config".to_string())
    });

    let err = manager(&engine)
        .attach_volume("web", "data", "/data", false)
        .await
        .unwrap_err();

    assert!(matches!(err, DockhandError::RecreateRestored { .. }));
    assert_eq!(err.code(), "RECREATE_ROLLED_BACK");
    assert_eq!(err.to_string(), "Failed to attach volume. Original container restored.");

    let restored = engine.container_named("web").unwrap();
    assert_eq!(destinations(&restored), vec!["/logs"]);
    assert_eq!(restored.port_bindings, web_bindings());
    assert_eq!(restored.env, vec!["MODE=prod".to_string()]);
    assert!(restored.networks.contains_key("backend"));
    assert_eq!(engine.call_count("create_container"), 2);
}

#[tokio::test]
async fn test_failed_rollback_is_fatal() {
    let engine = stopped_web();
    engine.fail_always("create_container", Some("web"), || {
        DockhandError::Engine("daemon hiccup".to_string())
    });

    let err = manager(&engine)
        .attach_volume("web", "data", "/data", false)
        .await
        .unwrap_err();

    match &err {
        DockhandError::RecreateFatal {
            container,
            action,
            rollback_cause,
            ..
        } => {
            assert_eq!(container, "web");
            assert_eq!(action, "attach volume");
            assert!(rollback_cause.contains("daemon hiccup"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.code(), "ROLLBACK_FAILED");
    assert!(engine.container_named("web").is_none());
}

#[tokio::test]
async fn test_running_container_is_refused_before_any_change() {
    let engine = MockEngine::new()
        .with_container(container("web", 1, "running"))
        .with_volume(volume("data"));
    let manager = manager(&engine);

    let err = manager
        .attach_volume("web", "data", "/data", false)
        .await
        .unwrap_err();
    assert!(matches!(err, DockhandError::PreconditionFailed(_)));
    assert_eq!(engine.call_count("remove_container"), 0);

    let response = commands::attach_volume(&manager, "web", "data", "/data", false)
        .await
        .unwrap();
    assert!(!response.success);
    assert_eq!(response.code, 400);
    assert_eq!(
        response.message,
        "Container must be stopped before attaching a volume. Please stop it first."
    );
}

#[tokio::test]
async fn test_already_mounted_is_a_no_op() {
    let mut web = container("web", 1, "running");
    web.mounts.push(volume_mount("data", "/data"));
    let engine = MockEngine::new()
        .with_container(web)
        .with_volume(volume("data"));

    let outcome = manager(&engine)
        .attach_volume("web", "data", "/data", false)
        .await
        .unwrap();

    assert!(matches!(outcome, RecreateOutcome::AlreadySatisfied { .. }));
    assert_eq!(engine.call_count("inspect_volume"), 0);
    assert_eq!(engine.call_count("remove_container"), 0);
    assert_eq!(engine.call_count("create_container"), 0);
}

#[tokio::test]
async fn test_missing_volume_fails_validation() {
    let engine = MockEngine::new().with_container(container("web", 1, "exited"));

    let err = manager(&engine)
        .attach_volume("web", "ghost", "/data", false)
        .await
        .unwrap_err();

    assert!(matches!(err, DockhandError::NotFound(ref m) if m == "Volume 'ghost' not found"));
    assert_eq!(engine.call_count("remove_container"), 0);
    assert!(engine.container_named("web").is_some());
}

#[tokio::test]
async fn test_relative_mount_path_is_rejected() {
    let engine = stopped_web();
    let err = manager(&engine)
        .attach_volume("web", "data", "data", false)
        .await
        .unwrap_err();
    assert!(matches!(err, DockhandError::InvalidRequest(_)));
    assert_eq!(engine.call_count("remove_container"), 0);
}

#[tokio::test]
async fn test_concurrent_recreate_conflicts() {
    let engine = stopped_web();
    let manager = manager(&engine);

    let _held = manager.locks().try_acquire("web").unwrap();
    let err = manager
        .attach_volume("web", "data", "/data", false)
        .await
        .unwrap_err();

    assert!(matches!(err, DockhandError::Conflict(_)));
    assert_eq!(engine.call_count("remove_container"), 0);
}

#[tokio::test]
async fn test_network_reconnect_failure_does_not_fail_recreate() {
    let engine = stopped_web();
    engine.fail_always("connect_network", None, || {
        DockhandError::Engine("network is busy".to_string())
    });

    let manager = manager(&engine);
    let outcome = manager
        .attach_volume("web", "data", "/data", false)
        .await
        .unwrap();

    assert!(matches!(outcome, RecreateOutcome::Completed { .. }));
    let recreated = engine.container_named("web").unwrap();
    assert!(!recreated.networks.contains_key("backend"));
    assert_eq!(destinations(&recreated), vec!["/logs", "/data"]);
    assert_eq!(manager.locks().held(), 0);
}

#[tokio::test]
async fn test_mount_path_collision_is_refused_before_removal() {
    let engine = stopped_web();
    let err = manager(&engine)
        .attach_volume("web", "data", "/logs", false)
        .await
        .unwrap_err();
    assert!(matches!(err, DockhandError::PreconditionFailed(_)));
    assert_eq!(engine.call_count("remove_container"), 0);
    assert_eq!(destinations(&engine.container_named("web").unwrap()), vec!["/logs"]);
}

#[tokio::test]
async fn test_recreated_container_publishes_ports_once_started() {
    let engine = stopped_web();
    manager(&engine)
        .attach_volume("web", "data", "/data", false)
        .await
        .unwrap();

    commands::lifecycle(&engine, "web", commands::Lifecycle::Start)
        .await
        .unwrap();
    let web = engine.container_named("web").unwrap();
    assert_eq!(web.ports.len(), 1);
    assert_eq!(web.ports[0].container_port, "80/tcp");
    assert_eq!(web.ports[0].host_port.as_deref(), Some("8080"));
}

#[tokio::test]
async fn test_unknown_container_is_not_found() {
    let engine = stopped_web();
    let err = manager(&engine)
        .attach_volume("nope", "data", "/data", false)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(engine.list_containers(true).await.unwrap().len(), 1);
}
