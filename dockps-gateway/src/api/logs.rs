//! Log API Handlers
//!
//! Batch fetch, live relay and download of a container's logs on a
//! user's host.

use axum::{
    Json,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use dockps_core::dto::log::{
    ContainerLogsRequest, DownloadLogsRequest, LogQuery, StreamLogsQuery, download_filename,
};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::api::{AppState, require_id, sse_response};
use crate::auth::AuthUser;
use crate::relay::follow_logs;
use crate::service::agent::AgentPurpose;

const CONTAINER_REQUIRED: &str = "Host UUID and Container ID are required";

/// POST /api/containers/logs
/// `{ "logs": [...] }`, or the agent's event stream when `follow` is set
pub async fn container_logs(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ContainerLogsRequest>,
) -> ApiResult<Response> {
    require_id(&req.container_id, CONTAINER_REQUIRED)?;
    let query = req.to_query();

    if query.is_follow() {
        return open_relay(&state, &user, req.host_uuid, &req.container_id, &query).await;
    }

    let agent = state
        .agents
        .connect(user.user_id, req.host_uuid, AgentPurpose::Interactive)
        .await?;

    tracing::debug!(
        host_uuid = %req.host_uuid,
        container_id = %req.container_id,
        tail = ?query.tail,
        "Fetching logs"
    );

    let logs = agent
        .fetch_logs(&req.container_id, &query)
        .await
        .map_err(ApiError::from_agent)?;
    Ok(Json(logs).into_response())
}

/// GET /api/containers/logs/stream?hostUuid=&containerId=&tail=&since=
/// Follow relay for browsers using `EventSource`
pub async fn stream_logs(
    State(state): State<AppState>,
    user: AuthUser,
    Query(req): Query<StreamLogsQuery>,
) -> ApiResult<Response> {
    require_id(&req.container_id, CONTAINER_REQUIRED)?;
    open_relay(&state, &user, req.host_uuid, &req.container_id, &req.to_query()).await
}

async fn open_relay(
    state: &AppState,
    user: &AuthUser,
    host_uuid: Uuid,
    container_id: &str,
    query: &LogQuery,
) -> ApiResult<Response> {
    let agent = state
        .agents
        .connect(user.user_id, host_uuid, AgentPurpose::Streaming)
        .await?;

    let stream = follow_logs(&agent, host_uuid, container_id, query, &state.relay)
        .await
        .map_err(ApiError::from_agent)?;
    Ok(sse_response(stream))
}

/// POST /api/containers/logs/download
/// Complete transcript as a text attachment
pub async fn download_logs(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<DownloadLogsRequest>,
) -> ApiResult<Response> {
    require_id(&req.container_id, CONTAINER_REQUIRED)?;

    let agent = state
        .agents
        .connect(user.user_id, req.host_uuid, AgentPurpose::Download)
        .await?;

    tracing::info!(host_uuid = %req.host_uuid, container_id = %req.container_id, "Downloading logs");

    let transcript = agent
        .download_logs(&req.container_id)
        .await
        .map_err(ApiError::from_download)?;

    tracing::info!(
        host_uuid = %req.host_uuid,
        container_id = %req.container_id,
        bytes = transcript.len(),
        "Log download complete"
    );

    let disposition = format!("attachment; filename=\"{}\"", download_filename(Utc::now()));
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        transcript,
    )
        .into_response())
}
