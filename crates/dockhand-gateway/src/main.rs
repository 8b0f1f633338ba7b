use std::sync::Arc;

use anyhow::Context;
use dockhand_common::ContainerEngine;
use dockhand_engine::DockerEngine;
use dockhand_gateway::{create_app, AppState, GatewayConfig};
use tracing::{info, warn};
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_logging(config: &GatewayConfig) {
    // Plain text, daily rotation
    let file_appender = rolling::daily(&config.log_dir, "dockhand.log");
    let file_layer = fmt::layer().with_writer(file_appender).with_ansi(false);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,dockhand_gateway=debug,dockhand_engine=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = GatewayConfig::from_env();
    init_logging(&config);

    let engine = DockerEngine::connect_local().context("failed to create Docker client")?;
    match engine.ping().await {
        Ok(()) => info!("Docker daemon reachable"),
        // Status endpoints report the outage; keep serving.
        Err(e) => warn!(error = %e, "Docker daemon not reachable at startup"),
    }

    let addr = config.bind_addr();
    let state = AppState::new(Arc::new(engine), config);
    let app = create_app(state);

    info!("Dockhand gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
