//! Command tests: lifecycle, networks, volumes, images

use dockhand_common::api::{CreateDockerNetworkRequest, CreateVolumeRequest};
use dockhand_common::DockhandError;
use dockhand_engine::commands::{self, Lifecycle};
use dockhand_engine::resolve_container;
use dockhand_engine::test_utils::{
    container, fake_id, image, network, volume, volume_mount, MockEngine,
};

fn engine() -> MockEngine {
    MockEngine::new()
        .with_container(container("web", 1, "running"))
        .with_container(container("db", 2, "exited"))
        .with_network(network("frontend", 1))
        .with_network(network("backend", 2))
        .with_attachment("web", "frontend", "172.19.0.2")
}

#[tokio::test]
async fn test_lifecycle_messages_name_the_container() {
    let engine = engine();

    let stopped = commands::lifecycle(&engine, "web", Lifecycle::Stop).await.unwrap();
    assert_eq!(stopped.message, "Container 'web' stopped.");
    assert!(!engine.container_named("web").unwrap().is_running());

    let started = commands::lifecycle(&engine, "db", Lifecycle::Start).await.unwrap();
    assert!(started.success);
    assert_eq!(started.code, 200);
    assert_eq!(started.message, "Container 'db' started.");

    let db_prefix = fake_id(2)[..6].to_uppercase();
    let restarted = commands::lifecycle(&engine, &db_prefix, Lifecycle::Restart)
        .await
        .unwrap();
    assert_eq!(restarted.message, "Container 'db' restarted.");

    let err = commands::lifecycle(&engine, "nope", Lifecycle::Start)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_resolve_by_name_skips_the_listing() {
    let engine = engine();

    let web = resolve_container(&engine, " web ").await.unwrap();
    assert_eq!(web.id, fake_id(1));
    assert_eq!(engine.call_count("list_containers"), 0);

    let db = resolve_container(&engine, &fake_id(2)[..4]).await.unwrap();
    assert_eq!(db.name, "db");
    assert_eq!(engine.call_count("list_containers"), 1);

    // Names match exactly; only id prefixes ignore case.
    let err = resolve_container(&engine, "WEB").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_resolve_propagates_engine_outage() {
    let engine = engine();
    engine.state().unavailable = true;

    let err = resolve_container(&engine, "web").await.unwrap_err();
    assert!(matches!(err, DockhandError::EngineUnavailable(_)));
    assert_eq!(engine.call_count("list_containers"), 0);
}

#[tokio::test]
async fn test_delete_running_container_requires_force() {
    let engine = engine();

    let err = commands::delete_container(&engine, "web", false)
        .await
        .unwrap_err();
    assert!(matches!(err, DockhandError::PreconditionFailed(_)));
    assert!(engine.container_named("web").is_some());

    let response = commands::delete_container(&engine, "web", true).await.unwrap();
    assert_eq!(response.message, "Container 'web' deleted successfully.");
    assert!(engine.container_named("web").is_none());
}

#[tokio::test]
async fn test_assign_network_already_connected_is_soft() {
    let engine = engine();

    let response = commands::assign_network(&engine, "web", "frontend").await.unwrap();
    assert!(!response.success);
    assert_eq!(response.code, 400);
    assert_eq!(
        response.message,
        "Container 'web' is already connected to network 'frontend'."
    );
    assert_eq!(engine.call_count("connect_network"), 0);
}

#[tokio::test]
async fn test_assign_network_connects() {
    let engine = engine();

    let response = commands::assign_network(&engine, "web", "backend").await.unwrap();
    assert!(response.success);
    assert!(engine.container_named("web").unwrap().networks.contains_key("backend"));

    let err = commands::assign_network(&engine, "web", "missing")
        .await
        .unwrap_err();
    assert!(matches!(err, DockhandError::NotFound(ref m) if m == "Network 'missing' not found"));
}

#[tokio::test]
async fn test_assign_multiple_networks_reports_each() {
    let engine = engine();
    engine.fail_once("connect_network", None, || {
        DockhandError::Engine("address pool exhausted".to_string())
    });
    let extra = network("extra", 3);
    let engine = engine.with_network(extra);

    let networks = vec![
        "frontend".to_string(),
        "backend".to_string(),
        "missing".to_string(),
        "extra".to_string(),
    ];
    let response = commands::assign_multiple_networks(&engine, "web", &networks)
        .await
        .unwrap();

    assert!(response.success);
    let lines: Vec<&str> = response.message.lines().collect();
    assert_eq!(lines[0], "Already connected to 'frontend'");
    assert!(lines[1].starts_with("Failed to connect to 'backend'"));
    assert_eq!(lines[2], "Network 'missing' not found");
    assert_eq!(lines[3], "Connected to 'extra'");
}

#[tokio::test]
async fn test_static_ip_assignment() {
    let engine = engine();

    let response =
        commands::assign_network_with_static_ip(&engine, "web", "backend", Some("172.20.0.50"))
            .await
            .unwrap();
    assert_eq!(
        response.message,
        "Network 'backend' assigned to container 'web' with IP 172.20.0.50."
    );
    let web = engine.container_named("web").unwrap();
    assert_eq!(
        web.networks["backend"].ip_address.as_deref(),
        Some("172.20.0.50")
    );

    let again =
        commands::assign_network_with_static_ip(&engine, "web", "backend", None)
            .await
            .unwrap();
    assert!(!again.success);
    assert_eq!(again.message, "Already connected to network 'backend'");
}

#[tokio::test]
async fn test_disconnect_network() {
    let engine = engine();

    let response = commands::disconnect_network(&engine, "web", "frontend").await.unwrap();
    assert_eq!(
        response.message,
        "Network 'frontend' disconnected from container 'web' successfully."
    );

    let again = commands::disconnect_network(&engine, "web", "frontend").await.unwrap();
    assert!(!again.success);
    assert_eq!(again.code, 400);
    assert_eq!(engine.call_count("disconnect_network"), 1);
}

#[tokio::test]
async fn test_create_network_rejects_duplicates() {
    let engine = engine();
    let request = CreateDockerNetworkRequest {
        name: "frontend".to_string(),
        driver: "bridge".to_string(),
        labels: Default::default(),
        check_duplicate: true,
    };

    let err = commands::create_network(&engine, &request).await.unwrap_err();
    assert!(matches!(err, DockhandError::Conflict(_)));
    assert_eq!(engine.call_count("create_network"), 0);

    let fresh = CreateDockerNetworkRequest {
        name: "metrics".to_string(),
        ..request
    };
    let response = commands::create_network(&engine, &fresh).await.unwrap();
    assert_eq!(response.message, "Network 'metrics' created successfully.");
}

#[tokio::test]
async fn test_delete_network_with_members_is_refused() {
    let engine = engine();

    let err = commands::delete_network(&engine, "frontend", false)
        .await
        .unwrap_err();
    match err {
        DockhandError::PreconditionFailed(message) => {
            assert!(message.contains("attached to container(s): web"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let dry = commands::delete_network(&engine, "backend", true).await.unwrap();
    assert_eq!(
        dry.message,
        "Network 'backend' can be safely deleted (no containers attached)."
    );
    assert_eq!(engine.call_count("remove_network"), 0);

    let deleted = commands::delete_network(&engine, "backend", false).await.unwrap();
    assert_eq!(deleted.message, "Network 'backend' deleted successfully.");

    let err = commands::delete_network(&engine, "backend", false)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_volume_create_and_delete() {
    let mut db = container("db", 2, "exited");
    db.mounts.push(volume_mount("pgdata", "/var/lib/postgresql/data"));
    let engine = MockEngine::new()
        .with_container(db)
        .with_volume(volume("pgdata"));

    let request = CreateVolumeRequest {
        name: "cache".to_string(),
        driver: "local".to_string(),
        labels: [("team".to_string(), "infra".to_string())].into(),
        driver_opts: Default::default(),
    };
    let created = commands::create_volume(&engine, &request).await.unwrap();
    assert_eq!(created.name, "cache");
    assert_eq!(created.labels["team"], "infra");

    let err = commands::delete_volume(&engine, "pgdata").await.unwrap_err();
    match err {
        DockhandError::PreconditionFailed(message) => {
            assert_eq!(message, "Cannot delete volume 'pgdata': in use by container 'db'")
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let deleted = commands::delete_volume(&engine, "cache").await.unwrap();
    assert_eq!(deleted.message, "Volume 'cache' deleted successfully.");

    let err = commands::delete_volume(&engine, "cache").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_volume_create_rejection_is_a_bad_request() {
    let engine = MockEngine::new();
    engine.fail_once("create_volume", Some("bad"), || {
        DockhandError::Engine("invalid driver".to_string())
    });
    let request = CreateVolumeRequest {
        name: "bad".to_string(),
        driver: "nfs-nope".to_string(),
        labels: Default::default(),
        driver_opts: Default::default(),
    };

    let err = commands::create_volume(&engine, &request).await.unwrap_err();
    assert!(matches!(err, DockhandError::InvalidRequest(ref m) if m.contains("invalid driver")));
}

#[tokio::test]
async fn test_delete_image_in_use_is_refused() {
    let engine = engine()
        .with_image(image("alpine:3.19"))
        .with_image(image("redis:7"));

    let err = commands::delete_image(&engine, "alpine:3.19").await.unwrap_err();
    match err {
        DockhandError::PreconditionFailed(message) => {
            assert_eq!(
                message,
                "Cannot delete image 'alpine:3.19': used by container(s) web, db"
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let response = commands::delete_image(&engine, "redis:7").await.unwrap();
    assert_eq!(response.message, "Image 'redis:7' deleted successfully.");

    let err = commands::delete_image(&engine, "redis:7").await.unwrap_err();
    assert!(err.is_not_found());
}
