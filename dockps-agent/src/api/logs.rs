//! Log API Handlers
//!
//! Batch JSON, live SSE and full-transcript download of a container's logs.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use dockps_core::dto::log::{LogQuery, LogsResponse, download_filename};

use crate::api::error::ApiResult;
use crate::api::{AppState, sse_response};
use crate::docker::LogOptions;

/// GET /containers/{id}/logs?tail=&follow=&since=
/// `{ "logs": [...] }`, or an event stream when `follow=true`
pub async fn container_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<LogQuery>,
) -> ApiResult<Response> {
    let options = LogOptions {
        tail: Some(query.tail.unwrap_or(state.default_tail)),
        follow: query.is_follow(),
        since: query.since,
    };

    if options.follow {
        let stream = state.publisher.follow(&id, options).await?;
        return Ok(sse_response(stream));
    }

    tracing::debug!(container_id = %id, tail = ?options.tail, since = ?options.since, "Fetching logs");
    let logs = state.source.fetch_lines(&id, options).await?;
    Ok(Json(LogsResponse { logs }).into_response())
}

/// GET /containers/{id}/logs/download
/// Complete transcript as a text attachment
pub async fn download_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    tracing::info!(container_id = %id, "Preparing log download");

    let transcript = state.source.fetch_transcript(&id).await?;
    let disposition = format!("attachment; filename=\"{}\"", download_filename(Utc::now()));

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        transcript,
    )
        .into_response())
}
