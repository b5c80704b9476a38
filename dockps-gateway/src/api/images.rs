//! Image API Handlers

use axum::{Json, extract::State};
use dockps_core::dto::container::{ActionMessage, HostRequest, ImageRequest};
use serde_json::Value;

use crate::api::error::{ApiError, ApiResult};
use crate::api::{AppState, require_id};
use crate::auth::AuthUser;
use crate::service::agent::AgentPurpose;

const IMAGE_REQUIRED: &str = "Host UUID and Image ID are required";

/// POST /api/images/list
pub async fn list_images(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<HostRequest>,
) -> ApiResult<Json<Value>> {
    let agent = state
        .agents
        .connect(user.user_id, req.host_uuid, AgentPurpose::Interactive)
        .await?;

    let images = agent.list_images().await.map_err(ApiError::from_agent)?;
    Ok(Json(images))
}

/// POST /api/images/index
pub async fn inspect_image(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ImageRequest>,
) -> ApiResult<Json<Value>> {
    require_id(&req.image_id, IMAGE_REQUIRED)?;

    let agent = state
        .agents
        .connect(user.user_id, req.host_uuid, AgentPurpose::Interactive)
        .await?;

    let image = agent
        .inspect_image(&req.image_id)
        .await
        .map_err(ApiError::from_agent)?;
    Ok(Json(image))
}

/// POST /api/images/remove
pub async fn remove_image(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ImageRequest>,
) -> ApiResult<Json<ActionMessage>> {
    require_id(&req.image_id, IMAGE_REQUIRED)?;

    let agent = state
        .agents
        .connect(user.user_id, req.host_uuid, AgentPurpose::Interactive)
        .await?;

    tracing::info!(host_uuid = %req.host_uuid, image_id = %req.image_id, "Removing image");

    let message = agent
        .remove_image(&req.image_id)
        .await
        .map_err(ApiError::from_agent)?;
    Ok(Json(message))
}
