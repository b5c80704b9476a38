//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use dockps_client::ClientError;

use crate::repository::HostRepositoryError;
use crate::service::HostError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    NotFound(String),
    BadRequest(String),
    /// Agent unreachable or answered with an unusable status
    BadGateway(String),
    ServiceUnavailable(String),
    GatewayTimeout(String),
    /// Agent status passed through unchanged
    Upstream { status: StatusCode, message: String },
    DatabaseError(HostRepositoryError),
    InternalError(String),
}

const AGENT_UNREACHABLE: &str = "Agent is not reachable";

impl ApiError {
    /// Map a failed interactive or streaming agent call
    ///
    /// Only "not found" keeps its meaning; every other agent status is a
    /// gateway failure from the browser's point of view.
    pub fn from_agent(err: ClientError) -> Self {
        match &err {
            ClientError::ApiError { status: 404, message } => ApiError::NotFound(message.clone()),
            _ if err.is_timeout() => ApiError::GatewayTimeout("Agent did not answer in time".to_string()),
            _ if err.is_unreachable() => ApiError::BadGateway(AGENT_UNREACHABLE.to_string()),
            ClientError::ApiError { status, message } => {
                tracing::warn!(status, "Agent returned an error: {}", message);
                ApiError::BadGateway(message.clone())
            }
            ClientError::InvalidRequest(msg) => ApiError::BadRequest(msg.clone()),
            ClientError::ParseError(msg) => {
                tracing::warn!("Unexpected agent response: {}", msg);
                ApiError::BadGateway("Invalid response from agent".to_string())
            }
            _ => {
                tracing::warn!("Agent call failed: {}", err);
                ApiError::BadGateway(AGENT_UNREACHABLE.to_string())
            }
        }
    }

    /// Map a failed log download, which keeps the agent's status
    pub fn from_download(err: ClientError) -> Self {
        match &err {
            _ if err.is_timeout() => {
                ApiError::GatewayTimeout("Download timeout - log file is too large".to_string())
            }
            _ if err.is_unreachable() => ApiError::ServiceUnavailable(AGENT_UNREACHABLE.to_string()),
            ClientError::ApiError { status, message } => match StatusCode::from_u16(*status) {
                Ok(status) => ApiError::Upstream {
                    status,
                    message: message.clone(),
                },
                Err(_) => ApiError::BadGateway(message.clone()),
            },
            ClientError::InvalidRequest(msg) => ApiError::BadRequest(msg.clone()),
            _ => {
                tracing::warn!("Log download failed: {}", err);
                ApiError::ServiceUnavailable(AGENT_UNREACHABLE.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::GatewayTimeout(msg) => (StatusCode::GATEWAY_TIMEOUT, msg),
            ApiError::Upstream { status, message } => (status, message),
            ApiError::DatabaseError(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<HostError> for ApiError {
    fn from(err: HostError) -> Self {
        match err {
            HostError::NotFound => ApiError::NotFound(err.to_string()),
            HostError::Repository(err) => ApiError::DatabaseError(err),
            HostError::Client(err) => ApiError::InternalError(err.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
