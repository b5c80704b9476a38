//! Image API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use dockps_core::dto::container::ActionMessage;
use serde_json::Value;

use crate::api::AppState;
use crate::api::error::ApiResult;

/// GET /images
pub async fn list_images(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    Ok(Json(state.docker.list_images().await?))
}

/// GET /images/{id}
pub async fn inspect_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    Ok(Json(state.docker.inspect_image(&id).await?))
}

/// GET /images/{id}/remove
/// Force-remove an image
pub async fn remove_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ActionMessage>> {
    tracing::info!(image_id = %id, "Removing image");

    state.docker.remove_image(&id).await?;
    Ok(Json(ActionMessage {
        message: format!("Image {} has been removed.", id),
    }))
}
