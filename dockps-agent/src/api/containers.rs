//! Container API Handlers
//!
//! Thin pass-through of the daemon's container endpoints.

use axum::{
    Json,
    extract::{Path, State},
};
use dockps_core::dto::container::{ActionMessage, ContainerAction};
use serde_json::Value;

use crate::api::AppState;
use crate::api::error::ApiResult;

/// GET /containers
/// List all containers, running or not
pub async fn list_containers(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    tracing::info!("Fetching list of containers");
    Ok(Json(state.docker.list_containers().await?))
}

/// GET /containers/{id}
pub async fn inspect_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    tracing::debug!(container_id = %id, "Inspecting container");
    Ok(Json(state.docker.inspect_container(&id).await?))
}

/// GET /containers/{id}/{action}
/// Run a lifecycle action and return the container's state afterwards
pub async fn container_action(
    State(state): State<AppState>,
    Path((id, action)): Path<(String, ContainerAction)>,
) -> ApiResult<Json<Value>> {
    tracing::info!(container_id = %id, %action, "Container action");

    state.docker.container_action(&id, action).await?;
    Ok(Json(state.docker.inspect_container(&id).await?))
}

/// GET /containers/{id}/remove
/// Force-remove a container
pub async fn remove_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ActionMessage>> {
    tracing::info!(container_id = %id, "Removing container");

    state.docker.remove_container(&id).await?;
    Ok(Json(ActionMessage {
        message: format!("Container {} has been removed.", id),
    }))
}
