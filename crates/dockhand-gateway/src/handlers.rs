//! REST handlers. Each one delegates to a `dockhand_engine` operation and
//! maps its error through `ApiError`.

use std::convert::Infallible;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use dockhand_common::api::{
    AssignMultipleNetworksRequest, AssignNetworkRequest, AssignNetworkWithStaticIpRequest,
    AttachVolumeRequest, ContainerDetails, ContainerLogsResponse, ContainerStats,
    ContainerSummary, CreateContainerRequest, CreateDockerNetworkRequest, CreateVolumeRequest,
    CreatedVolumeResponse, DisconnectNetworkRequest, DockerImageSummary, DockerNetworkOverview,
    DockerOverview, DockerVolumeSummary, GenericMessageResponse, NetworkGraph, NetworkSelectItem,
    PullImageRequest, VolumeSelectList,
};
use dockhand_common::DockhandError;
use dockhand_engine::commands::{self, Lifecycle};
use dockhand_engine::{create, logs, overview, pull, queries};
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::error::ApiResult;
use crate::AppState;

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default = "default_true")]
    pub all: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ForceParams {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct DryRunParams {
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogParams {
    pub tail: Option<usize>,
    pub since: Option<i64>,
    pub until: Option<i64>,
}

/// Chunked response body from a stream of text chunks.
fn streaming_body(content_type: &'static str, chunks: BoxStream<'static, String>) -> Response {
    (
        [(header::CONTENT_TYPE, content_type)],
        Body::from_stream(chunks.map(Ok::<_, Infallible>)),
    )
        .into_response()
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn docker_status(State(state): State<AppState>) -> Json<GenericMessageResponse> {
    match state.engine.ping().await {
        Ok(()) => Json(GenericMessageResponse::ok("Docker is running")),
        Err(e) => {
            error!(error = %e, "Docker status check failed");
            Json(GenericMessageResponse::rejected(
                503,
                "Docker is not running or unreachable. Please check your Docker service.",
            ))
        }
    }
}

pub async fn docker_overview(State(state): State<AppState>) -> ApiResult<Json<DockerOverview>> {
    Ok(Json(overview::docker_overview(state.engine.as_ref()).await?))
}

pub async fn top_containers(State(state): State<AppState>) -> ApiResult<Json<Vec<ContainerStats>>> {
    Ok(Json(overview::top_containers(state.engine.as_ref()).await?))
}

// --- Containers ---

pub async fn list_containers(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<Vec<ContainerSummary>>> {
    Ok(Json(queries::list_containers(state.engine.as_ref(), params.all).await?))
}

pub async fn container_details(
    State(state): State<AppState>,
    Path(container): Path<String>,
) -> ApiResult<Json<ContainerDetails>> {
    Ok(Json(queries::container_details(state.engine.as_ref(), &container).await?))
}

pub async fn create_container(
    State(state): State<AppState>,
    Json(request): Json<CreateContainerRequest>,
) -> Response {
    info!(
        container = %request.name,
        image = %request.image,
        dry_run = request.dry_run,
        "Create requested"
    );
    streaming_body(
        "text/plain; charset=utf-8",
        create::create_container_stream(state.engine.clone(), request),
    )
}

pub async fn delete_container(
    State(state): State<AppState>,
    Path(container): Path<String>,
    Query(params): Query<ForceParams>,
) -> ApiResult<Json<GenericMessageResponse>> {
    Ok(Json(
        commands::delete_container(state.engine.as_ref(), &container, params.force).await?,
    ))
}

async fn run_lifecycle(
    state: &AppState,
    container: &str,
    action: Lifecycle,
) -> ApiResult<Json<GenericMessageResponse>> {
    Ok(Json(commands::lifecycle(state.engine.as_ref(), container, action).await?))
}

pub async fn start_container(
    State(state): State<AppState>,
    Path(container): Path<String>,
) -> ApiResult<Json<GenericMessageResponse>> {
    run_lifecycle(&state, &container, Lifecycle::Start).await
}

pub async fn stop_container(
    State(state): State<AppState>,
    Path(container): Path<String>,
) -> ApiResult<Json<GenericMessageResponse>> {
    run_lifecycle(&state, &container, Lifecycle::Stop).await
}

pub async fn restart_container(
    State(state): State<AppState>,
    Path(container): Path<String>,
) -> ApiResult<Json<GenericMessageResponse>> {
    run_lifecycle(&state, &container, Lifecycle::Restart).await
}

pub async fn container_logs(
    State(state): State<AppState>,
    Path(container): Path<String>,
    Query(params): Query<LogParams>,
) -> ApiResult<Json<ContainerLogsResponse>> {
    let tail = params.tail.unwrap_or(state.config.log_tail);
    Ok(Json(
        logs::query_logs(
            state.engine.as_ref(),
            &container,
            tail,
            params.since,
            params.until,
        )
        .await?,
    ))
}

pub async fn container_volumes(
    State(state): State<AppState>,
    Path(container): Path<String>,
) -> ApiResult<Json<Vec<DockerVolumeSummary>>> {
    Ok(Json(queries::container_volumes(state.engine.as_ref(), &container).await?))
}

/// The recreate runs on its own task so a client hanging up mid-way cannot
/// interrupt it between removal and rollback.
pub async fn attach_volume(
    State(state): State<AppState>,
    Path(container): Path<String>,
    Json(request): Json<AttachVolumeRequest>,
) -> ApiResult<Json<GenericMessageResponse>> {
    let manager = state.recreate.clone();
    let task = tokio::spawn(async move {
        commands::attach_volume(
            &manager,
            &container,
            &request.volume_name,
            &request.mount_path,
            request.read_only,
        )
        .await
    });
    let response = task
        .await
        .map_err(|e| DockhandError::Internal(format!("attach task failed: {e}")))??;
    Ok(Json(response))
}

pub async fn assign_network(
    State(state): State<AppState>,
    Path(container): Path<String>,
    Json(request): Json<AssignNetworkRequest>,
) -> ApiResult<Json<GenericMessageResponse>> {
    Ok(Json(
        commands::assign_network(state.engine.as_ref(), &container, &request.network_name).await?,
    ))
}

pub async fn assign_multiple_networks(
    State(state): State<AppState>,
    Path(container): Path<String>,
    Json(request): Json<AssignMultipleNetworksRequest>,
) -> ApiResult<Json<GenericMessageResponse>> {
    Ok(Json(
        commands::assign_multiple_networks(
            state.engine.as_ref(),
            &container,
            &request.network_names,
        )
        .await?,
    ))
}

pub async fn assign_network_static_ip(
    State(state): State<AppState>,
    Path(container): Path<String>,
    Json(request): Json<AssignNetworkWithStaticIpRequest>,
) -> ApiResult<Json<GenericMessageResponse>> {
    Ok(Json(
        commands::assign_network_with_static_ip(
            state.engine.as_ref(),
            &container,
            &request.network_name,
            request.ipv4_address.as_deref(),
        )
        .await?,
    ))
}

pub async fn disconnect_network(
    State(state): State<AppState>,
    Path(container): Path<String>,
    Json(request): Json<DisconnectNetworkRequest>,
) -> ApiResult<Json<GenericMessageResponse>> {
    Ok(Json(
        commands::disconnect_network(state.engine.as_ref(), &container, &request.network_name)
            .await?,
    ))
}

// --- Images ---

pub async fn list_images(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<DockerImageSummary>>> {
    Ok(Json(overview::list_images(state.engine.as_ref()).await?))
}

pub async fn delete_image(
    State(state): State<AppState>,
    Path(image): Path<String>,
) -> ApiResult<Json<GenericMessageResponse>> {
    Ok(Json(commands::delete_image(state.engine.as_ref(), &image).await?))
}

pub async fn pull_image(
    State(state): State<AppState>,
    Json(request): Json<PullImageRequest>,
) -> Response {
    streaming_body(
        "application/x-ndjson",
        pull::pull_image_stream(state.engine.clone(), request.repository, request.tag),
    )
}

// --- Volumes ---

pub async fn list_volumes(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<DockerVolumeSummary>>> {
    Ok(Json(overview::list_volumes(state.engine.as_ref()).await?))
}

pub async fn volumes_lite(State(state): State<AppState>) -> ApiResult<Json<VolumeSelectList>> {
    Ok(Json(overview::volumes_lite(state.engine.as_ref()).await?))
}

pub async fn create_volume(
    State(state): State<AppState>,
    Json(request): Json<CreateVolumeRequest>,
) -> ApiResult<Json<CreatedVolumeResponse>> {
    Ok(Json(commands::create_volume(state.engine.as_ref(), &request).await?))
}

pub async fn delete_volume(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<GenericMessageResponse>> {
    Ok(Json(commands::delete_volume(state.engine.as_ref(), &name).await?))
}

// --- Networks ---

pub async fn network_overview(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<DockerNetworkOverview>>> {
    Ok(Json(overview::network_overview(state.engine.as_ref()).await?))
}

pub async fn network_map(State(state): State<AppState>) -> ApiResult<Json<NetworkGraph>> {
    Ok(Json(overview::network_graph(state.engine.as_ref()).await?))
}

pub async fn networks_lite(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<NetworkSelectItem>>> {
    Ok(Json(overview::networks_lite(state.engine.as_ref()).await?))
}

pub async fn create_network(
    State(state): State<AppState>,
    Json(request): Json<CreateDockerNetworkRequest>,
) -> ApiResult<Json<GenericMessageResponse>> {
    Ok(Json(commands::create_network(state.engine.as_ref(), &request).await?))
}

pub async fn delete_network(
    State(state): State<AppState>,
    Path(network): Path<String>,
    Query(params): Query<DryRunParams>,
) -> ApiResult<Json<GenericMessageResponse>> {
    Ok(Json(
        commands::delete_network(state.engine.as_ref(), &network, params.dry_run).await?,
    ))
}
