//! Container API Handlers
//!
//! One-shot container operations forwarded to the host's agent.

use axum::{
    Json,
    extract::{Path, State},
};
use dockps_core::dto::container::{
    ActionMessage, ContainerAction, ContainerRequest, ContainerSummary, HostRequest,
    summarize_containers,
};
use serde_json::Value;

use crate::api::error::{ApiError, ApiResult};
use crate::api::{AppState, require_id};
use crate::auth::AuthUser;
use crate::service::agent::AgentPurpose;

const CONTAINER_REQUIRED: &str = "Host UUID and Container ID are required";

/// POST /api/containers/list
/// Simplified listing without the agent's own container
pub async fn list_containers(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<HostRequest>,
) -> ApiResult<Json<Vec<ContainerSummary>>> {
    let agent = state
        .agents
        .connect(user.user_id, req.host_uuid, AgentPurpose::Interactive)
        .await?;

    let containers = agent.list_containers().await.map_err(ApiError::from_agent)?;
    Ok(Json(summarize_containers(containers)))
}

/// POST /api/containers/index
/// Inspect data of one container
pub async fn inspect_container(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ContainerRequest>,
) -> ApiResult<Json<Value>> {
    require_id(&req.container_id, CONTAINER_REQUIRED)?;

    let agent = state
        .agents
        .connect(user.user_id, req.host_uuid, AgentPurpose::Interactive)
        .await?;

    let container = agent
        .inspect_container(&req.container_id)
        .await
        .map_err(ApiError::from_agent)?;
    Ok(Json(container))
}

/// POST /api/containers/{start|stop|restart|pause|unpause}
pub async fn container_action(
    State(state): State<AppState>,
    Path(action): Path<ContainerAction>,
    user: AuthUser,
    Json(req): Json<ContainerRequest>,
) -> ApiResult<Json<Value>> {
    require_id(&req.container_id, CONTAINER_REQUIRED)?;

    let agent = state
        .agents
        .connect(user.user_id, req.host_uuid, AgentPurpose::Interactive)
        .await?;

    tracing::info!(
        host_uuid = %req.host_uuid,
        container_id = %req.container_id,
        %action,
        "Forwarding container action"
    );

    let container = agent
        .container_action(&req.container_id, action)
        .await
        .map_err(ApiError::from_agent)?;
    Ok(Json(container))
}

/// POST /api/containers/remove
pub async fn remove_container(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ContainerRequest>,
) -> ApiResult<Json<ActionMessage>> {
    require_id(&req.container_id, CONTAINER_REQUIRED)?;

    let agent = state
        .agents
        .connect(user.user_id, req.host_uuid, AgentPurpose::Interactive)
        .await?;

    tracing::info!(host_uuid = %req.host_uuid, container_id = %req.container_id, "Removing container");

    let message = agent
        .remove_container(&req.container_id)
        .await
        .map_err(ApiError::from_agent)?;
    Ok(Json(message))
}
