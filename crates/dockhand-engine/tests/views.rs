//! Overview, listing, log and stream tests against the in-memory engine

use std::sync::Arc;

use dockhand_common::api::{CreateContainerRequest, GraphNode, VolumeMountRequest};
use dockhand_common::model::{CpuStats, CpuUsage, MemoryStats};
use dockhand_common::{ContainerStatus, DockhandError, PullProgress, StatsSample};
use dockhand_engine::test_utils::{
    container, image, network, published_port, volume, volume_mount, MockEngine,
};
use dockhand_engine::{create, logs, overview, pull, queries};
use futures::StreamExt;

fn cpu_sample(cpu_delta: u64, usage: u64) -> StatsSample {
    StatsSample {
        cpu_stats: CpuStats {
            cpu_usage: CpuUsage {
                total_usage: 1000 + cpu_delta,
                percpu_usage: Some(vec![0]),
            },
            system_cpu_usage: Some(2000),
            online_cpus: Some(1),
        },
        precpu_stats: CpuStats {
            cpu_usage: CpuUsage {
                total_usage: 1000,
                percpu_usage: None,
            },
            system_cpu_usage: Some(1000),
            online_cpus: Some(1),
        },
        memory_stats: MemoryStats {
            usage: Some(usage),
            limit: Some(1000),
        },
        ..Default::default()
    }
}

fn cluster() -> MockEngine {
    let web = container("web", 1, "running");
    let db = container("db", 2, "exited");
    let cache = container("cache", 3, "restarting");
    let (web_id, db_id, cache_id) = (web.id.clone(), db.id.clone(), cache.id.clone());

    let engine = MockEngine::new()
        .with_container(web)
        .with_container(db)
        .with_container(cache)
        .with_network(network("bridge", 0))
        .with_network(network("frontend", 1))
        .with_network(network("backend", 2))
        .with_attachment("web", "frontend", "172.19.0.2")
        .with_attachment("web", "backend", "172.20.0.2")
        .with_attachment("db", "backend", "172.20.0.3")
        .with_image(image("alpine:3.19"))
        .with_image(image("redis:7"))
        .with_volume(volume("pgdata"))
        .with_logs(&web_id, &[(100, "boot"), (101, "ERROR: disk full"), (102, "ready")])
        .with_logs(&db_id, &[(100, "starting"), (101, "stopped")]);
    engine.fail_always("container_logs", Some(&cache_id), || {
        DockhandError::Engine("log driver none".to_string())
    });
    engine
}

#[tokio::test]
async fn test_overview_counts_and_skips_failing_logs() {
    let engine = cluster();
    engine.state().swarm_state = Some("active".to_string());

    let view = overview::docker_overview(&engine).await.unwrap();

    assert_eq!(view.version, "24.0.7");
    assert_eq!(view.total_containers, 3);
    assert_eq!(view.running_containers, 1);
    assert_eq!(view.failed_containers, 1);
    assert_eq!(view.images, 2);
    assert_eq!(view.volumes, 1);
    assert_eq!(view.logs_count, 5);
    assert!(view.is_swarm_active);
}

#[tokio::test]
async fn test_overview_swarm_failure_is_inactive() {
    let engine = cluster();
    engine.fail_always("swarm_state", None, || {
        DockhandError::Engine("info failed".to_string())
    });

    let view = overview::docker_overview(&engine).await.unwrap();
    assert!(!view.is_swarm_active);
}

#[tokio::test]
async fn test_network_overview_hides_protected_networks() {
    let engine = cluster();

    let networks = overview::network_overview(&engine).await.unwrap();
    let names: Vec<&str> = networks.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["backend", "frontend"]);

    let backend = &networks[0];
    assert_eq!(backend.containers_count, 2);
    assert_eq!(backend.running_containers_count, 1);
    assert_eq!(
        backend.containers[1].ipv4_address.as_deref(),
        Some("172.20.0.3")
    );
}

#[tokio::test]
async fn test_network_graph_clusters_by_last_network() {
    let engine = cluster();
    let frontend_id: String = network("frontend", 1).id.chars().take(12).collect();
    let backend_id: String = network("backend", 2).id.chars().take(12).collect();

    let graph = overview::network_graph(&engine).await.unwrap();

    let web = graph
        .nodes
        .iter()
        .find_map(|n| match n {
            GraphNode::Container { label, cluster_id, id, .. } if label == "web" => {
                Some((id.clone(), cluster_id.clone()))
            }
            _ => None,
        })
        .unwrap();
    assert_eq!(web.0.len(), 12);
    assert_eq!(web.1, Some(frontend_id));

    let networks = graph
        .nodes
        .iter()
        .filter(|n| matches!(n, GraphNode::Network { .. }))
        .count();
    assert_eq!(networks, 2);
    assert_eq!(graph.links.len(), 3);
    assert!(graph.links.iter().all(|l| l.source.len() == 12));
    assert_eq!(graph.links.iter().filter(|l| l.source == backend_id).count(), 2);

    let cache_cluster = graph.nodes.iter().find_map(|n| match n {
        GraphNode::Container {
            label, cluster_id, ..
        } if label == "cache" => Some(cluster_id.clone()),
        _ => None,
    });
    assert_eq!(cache_cluster, Some(None));
}

#[tokio::test]
async fn test_top_containers_sorted_by_cpu() {
    let web = container("web", 1, "running");
    let api = container("api", 2, "running");
    let worker = container("worker", 3, "running");
    let idle = container("idle", 4, "exited");
    let engine = MockEngine::new()
        .with_stats(&web.id, vec![cpu_sample(100, 250)])
        .with_stats(&api.id, vec![cpu_sample(700, 500)])
        .with_stats(&idle.id, vec![cpu_sample(900, 500)])
        .with_container(web)
        .with_container(api)
        .with_container(worker)
        .with_container(idle);

    let top = overview::top_containers(&engine).await.unwrap();

    assert_eq!(top.len(), 2);
    assert_eq!(top[0].name, "api");
    assert_eq!(top[0].cpu, 70.0);
    assert_eq!(top[0].memory, 50.0);
    assert_eq!(top[1].name, "web");
    assert_eq!(top[1].id.len(), 12);
}

#[tokio::test]
async fn test_images_and_volumes_list_their_users() {
    let mut db = container("db", 2, "exited");
    db.mounts.push(volume_mount("pgdata", "/var/lib/postgresql/data"));
    let engine = MockEngine::new()
        .with_container(db)
        .with_image(image("alpine:3.19"))
        .with_image(image("redis:7"))
        .with_volume(volume("pgdata"))
        .with_volume(volume("scratch"));

    let images = overview::list_images(&engine).await.unwrap();
    assert_eq!(images[0].containers.len(), 1);
    assert_eq!(images[0].containers[0].status, ContainerStatus::Stopped);
    assert!(images[1].containers.is_empty());
    assert!(images[0].id.starts_with("sha256:"));

    let volumes = overview::list_volumes(&engine).await.unwrap();
    assert_eq!(volumes[0].destination, "/var/lib/docker/volumes/pgdata/_data");
    assert_eq!(volumes[0].containers[0].mountpoint, "/var/lib/postgresql/data");
    assert!(volumes[1].containers.is_empty());

    let lite = overview::volumes_lite(&engine).await.unwrap();
    assert_eq!(lite.volumes.len(), 2);
    assert_eq!(lite.volumes[0].id, "pgdata");
}

#[tokio::test]
async fn test_container_summaries() {
    let engine = cluster();
    {
        let mut state = engine.state();
        state.containers[0].ports = vec![published_port("80/tcp", "8080")];
        state.containers[0].mounts = vec![volume_mount("pgdata", "/data")];
    }

    let summaries = queries::list_containers(&engine, true).await.unwrap();
    assert_eq!(summaries.len(), 3);

    let web = &summaries[0];
    assert_eq!(web.name, "web");
    assert_eq!(web.id.len(), 12);
    assert_eq!(web.status, ContainerStatus::Running);
    assert_eq!(web.image, vec!["alpine:3.19".to_string()]);
    assert_eq!(web.command, "sleep infinity");
    assert_eq!(web.error_count, 1);
    assert_eq!(web.latest_error_message.as_deref(), Some("error: disk full"));
    assert_eq!(web.ports[0].host_port.as_deref(), Some("8080"));
    assert_eq!(web.volumes, 1);
    assert!(web.uptime_seconds.unwrap() > 0);

    let db = &summaries[1];
    assert_eq!(db.status, ContainerStatus::Stopped);
    assert_eq!(db.uptime_seconds, None);

    // Unreadable logs count as no errors.
    let cache = &summaries[2];
    assert_eq!(cache.status, ContainerStatus::Restarted);
    assert_eq!(cache.error_count, 0);

    let running = queries::list_containers(&engine, false).await.unwrap();
    assert_eq!(running.len(), 1);
}

#[tokio::test]
async fn test_container_details() {
    let engine = cluster();
    let web_id = engine.container_named("web").unwrap().id;
    let engine = engine.with_stats(&web_id, vec![cpu_sample(250, 400)]);
    {
        let mut state = engine.state();
        state.containers[0].cpu_quota = Some(50_000);
        state.containers[0].cpu_period = Some(100_000);
    }

    let details = queries::container_details(&engine, &web_id[..12]).await.unwrap();
    assert_eq!(details.summary.name, "web");
    assert_eq!(details.ip_address, "172.20.0.2");
    assert_eq!(details.cpu_percent, 25.0);
    assert_eq!(details.memory_usage, 400);
    assert_eq!(details.memory_limit, 1000);
    assert_eq!(details.cpu_limit, Some(0.5));
    assert_eq!(details.network_mode, "bridge");
    assert_eq!(details.platform, "unknown");
    assert!(!details.privileged);

    let stopped = queries::container_details(&engine, "db").await.unwrap();
    assert_eq!(stopped.cpu_percent, 0.0);
    assert_eq!(stopped.cpu_limit, None);
    assert_eq!(engine.call_count("stats_once"), 1);
}

#[tokio::test]
async fn test_container_volumes_skip_removed_volumes() {
    let mut db = container("db", 2, "exited");
    db.mounts.push(volume_mount("pgdata", "/data"));
    db.mounts.push(volume_mount("gone", "/old"));
    let engine = MockEngine::new()
        .with_container(db)
        .with_volume(volume("pgdata"));

    let volumes = queries::container_volumes(&engine, "db").await.unwrap();
    assert_eq!(volumes.len(), 1);
    assert_eq!(volumes[0].name.as_deref(), Some("pgdata"));
    assert_eq!(volumes[0].destination, "/data");
}

#[tokio::test]
async fn test_log_pagination_never_repeats_lines() {
    let engine = cluster();

    let page = logs::query_logs(&engine, "web", 500, None, None).await.unwrap();
    assert_eq!(page.count, 3);
    assert_eq!(page.logs[1].message, "ERROR: disk full");
    assert_eq!(page.next_since, Some(102));

    let page = logs::query_logs(&engine, "web", 500, Some(100), None).await.unwrap();
    let messages: Vec<&str> = page.logs.iter().map(|l| l.message.as_str()).collect();
    assert_eq!(messages, vec!["ERROR: disk full", "ready"]);
    assert_eq!(page.next_since, Some(102));

    let page = logs::query_logs(&engine, "web", 500, page.next_since, None).await.unwrap();
    assert_eq!(page.count, 0);
    assert_eq!(page.next_since, None);

    let tail = logs::query_logs(&engine, "web", 1, None, None).await.unwrap();
    assert_eq!(tail.logs[0].message, "ready");
}

#[tokio::test]
async fn test_pull_stream_ends_with_summary() {
    let engine = MockEngine::new();
    engine.state().pull_events = vec![
        PullProgress {
            status: Some("Pulling from library/redis".to_string()),
            ..Default::default()
        },
        PullProgress {
            id: Some("layer1".to_string()),
            status: Some("Downloading".to_string()),
            current: Some(10),
            total: Some(40),
            ..Default::default()
        },
    ];

    let lines: Vec<serde_json::Value> =
        pull::pull_image_stream(Arc::new(engine), "redis".to_string(), "7".to_string())
            .map(|line| serde_json::from_str(line.trim_end()).unwrap())
            .collect()
            .await;

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1]["progress_percent"], 25.0);
    assert_eq!(lines[1]["download_speed"], 0);
    assert_eq!(lines[2]["summary"]["tags"][0], "redis:7");
}

#[tokio::test]
async fn test_pull_stream_reports_errors() {
    let engine = MockEngine::new();
    engine.fail_once("pull_image", None, || {
        DockhandError::NotFound("manifest unknown".to_string())
    });

    let lines: Vec<String> =
        pull::pull_image_stream(Arc::new(engine), "nope".to_string(), "1".to_string())
            .collect()
            .await;

    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("\"error\""));
    assert!(lines[0].ends_with('\n'));
}

fn create_request(name: &str) -> CreateContainerRequest {
    CreateContainerRequest {
        name: name.to_string(),
        image: "redis:7".to_string(),
        ports: [(6379, 16379)].into(),
        networks: vec!["backend".to_string(), "missing".to_string()],
        volume_mounts: vec![VolumeMountRequest {
            volume_name: "redis-data".to_string(),
            mount_path: "/data".to_string(),
            read_only: false,
        }],
        ..Default::default()
    }
}

#[tokio::test]
async fn test_create_narration_dry_run_changes_nothing() {
    let engine = MockEngine::new().with_network(network("backend", 2));
    let request = CreateContainerRequest {
        dry_run: true,
        ..create_request("cache")
    };

    let text: String = create::create_container_stream(Arc::new(engine.clone()), request)
        .collect::<Vec<_>>()
        .await
        .concat();

    assert!(text.contains("[Dry Run] Image 'redis:7' would be pulled"));
    assert!(text.contains("[Dry Run] Would create volume 'redis-data'"));
    assert!(text.contains("Network 'missing' not found. Skipping connection."));
    assert!(text.contains("Dry-run complete. No changes made."));
    assert!(!text.contains("[7/10]"));
    assert_eq!(engine.call_count("create_container"), 0);
    assert_eq!(engine.call_count("create_volume"), 0);
    assert_eq!(engine.call_count("pull_image"), 0);
}

#[tokio::test]
async fn test_create_narration_full_run() {
    let engine = MockEngine::new().with_network(network("backend", 2));

    let text: String =
        create::create_container_stream(Arc::new(engine.clone()), create_request("cache"))
            .collect::<Vec<_>>()
            .await
            .concat();

    for step in 1..=10 {
        assert!(text.contains(&format!("[{step}/10]")), "missing step {step}");
    }
    assert!(text.contains("Image 'redis:7' pulled."));
    assert!(text.contains("Created volume 'redis-data'"));
    assert!(text.contains("Connected to network 'backend'"));
    assert!(text.contains("Container 'cache' started successfully."));
    assert!(text.contains("Status: running | IP: "));

    let created = engine.container_named("cache").unwrap();
    assert!(created.is_running());
    assert_eq!(created.command, Some(create::default_command()));
    assert!(created.tty);
    assert_eq!(created.ports[0].container_port, "6379/tcp");
    assert!(created.networks.contains_key("backend"));
}

#[tokio::test]
async fn test_create_narration_aborts_on_existing_container() {
    let engine = MockEngine::new()
        .with_container(container("cache", 7, "exited"))
        .with_image(image("redis:7"));

    let text: String =
        create::create_container_stream(Arc::new(engine.clone()), create_request("cache"))
            .collect::<Vec<_>>()
            .await
            .concat();

    assert!(text.contains("Aborting. Use `force_recreate=true` to overwrite."));
    assert_eq!(engine.call_count("create_container"), 0);

    let request = CreateContainerRequest {
        force_recreate: true,
        start_after_create: Some(false),
        ..create_request("cache")
    };
    let text: String = create::create_container_stream(Arc::new(engine.clone()), request)
        .collect::<Vec<_>>()
        .await
        .concat();

    assert!(text.contains("Existing container removed."));
    assert!(text.contains("Skipping start"));
    assert_eq!(engine.container_named("cache").unwrap().raw_status, "created");
}
