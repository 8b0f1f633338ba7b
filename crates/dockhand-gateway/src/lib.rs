//! HTTP and websocket gateway over the dockhand engine.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{delete, get, post};
use axum::Router;
use dockhand_common::ContainerEngine;
use dockhand_engine::RecreateManager;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub mod config;
pub mod error;
pub mod handlers;
pub mod ws;

pub use config::GatewayConfig;
pub use error::{ApiError, ApiResult};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<dyn ContainerEngine>,
    pub recreate: RecreateManager,
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    pub fn new(engine: Arc<dyn ContainerEngine>, config: GatewayConfig) -> Self {
        Self {
            recreate: RecreateManager::new(engine.clone()),
            engine,
            config: Arc::new(config),
        }
    }
}

fn cors_layer(config: &GatewayConfig) -> CorsLayer {
    if config.allows_any_origin() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn create_app(state: AppState) -> Router {
    use handlers as h;

    let cors = cors_layer(&state.config);
    Router::new()
        // Engine status and dashboards
        .route("/docker-status", get(h::docker_status))
        .route("/docker/overview", get(h::docker_overview))
        .route("/docker/top-containers", get(h::top_containers))
        // Containers
        .route("/containers", get(h::list_containers))
        .route("/containers/create", post(h::create_container))
        .route(
            "/containers/:id",
            get(h::container_details).delete(h::delete_container),
        )
        .route("/containers/:id/start", post(h::start_container))
        .route("/containers/:id/stop", post(h::stop_container))
        .route("/containers/:id/restart", post(h::restart_container))
        .route("/containers/:id/logs", get(h::container_logs))
        .route("/containers/:id/volumes", get(h::container_volumes))
        .route("/containers/:id/attach-volume", post(h::attach_volume))
        .route("/containers/:id/networks", post(h::assign_network))
        .route("/containers/:id/networks/multiple", post(h::assign_multiple_networks))
        .route("/containers/:id/networks/static-ip", post(h::assign_network_static_ip))
        .route("/containers/:id/networks/disconnect", post(h::disconnect_network))
        // Images
        .route("/images", get(h::list_images))
        .route("/images/pull/full", post(h::pull_image))
        .route("/images/:id", delete(h::delete_image))
        // Volumes
        .route("/volumes", get(h::list_volumes).post(h::create_volume))
        .route("/volumes/list", get(h::volumes_lite))
        .route("/volumes/:name", delete(h::delete_volume))
        // Networks
        .route("/docker/networks", post(h::create_network))
        .route("/docker/networks/overview", get(h::network_overview))
        .route("/docker/networks/map", get(h::network_map))
        .route("/docker/networks/list", get(h::networks_lite))
        .route("/docker/networks/:id", delete(h::delete_network))
        // Live sessions
        .route("/ws/containers/:id/stats", get(ws::container_stats))
        .route("/ws/containers/:id/terminal", get(ws::container_terminal))
        // Liveness
        .route("/health", get(h::health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
