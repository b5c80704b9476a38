//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::docker::DaemonError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    NotFound(String),
    BadRequest(String),
    /// The daemon socket refused the connection
    Unavailable(String),
    /// The daemon answered with an error status
    Daemon { status: StatusCode, message: String },
    /// The daemon connection broke or returned garbage
    BadGateway(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unavailable(msg) => {
                tracing::error!("Docker daemon unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, msg)
            }
            ApiError::Daemon { status, message } => {
                tracing::warn!(%status, "Docker daemon error: {}", message);
                (status, message)
            }
            ApiError::BadGateway(msg) => {
                tracing::error!("Docker daemon failure: {}", msg);
                (StatusCode::BAD_GATEWAY, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<DaemonError> for ApiError {
    fn from(err: DaemonError) -> Self {
        match err {
            DaemonError::NotFound(msg) => ApiError::NotFound(msg),
            DaemonError::Unavailable(_) => ApiError::Unavailable(err.to_string()),
            DaemonError::Api { status, message } => {
                let status = StatusCode::from_u16(status)
                    .ok()
                    .filter(|s| s.is_client_error() || s.is_server_error())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                ApiError::Daemon { status, message }
            }
            DaemonError::Transport(_) | DaemonError::InvalidResponse(_) => {
                ApiError::BadGateway(err.to_string())
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
