//! Log DTOs
//!
//! Shapes of the log endpoints on both the agent and the gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default number of lines returned when a request does not specify `tail`
pub const DEFAULT_TAIL: u32 = 1000;

/// Default backlog of the browser `EventSource` route
pub const STREAM_DEFAULT_TAIL: u32 = 100;

/// Query string of the agent's `GET /containers/{id}/logs`
///
/// `since` is a lower-bound filter applied before `tail` truncation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tail: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow: Option<bool>,

    /// Unix timestamp in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<i64>,
}

impl LogQuery {
    pub fn is_follow(&self) -> bool {
        self.follow.unwrap_or(false)
    }
}

/// Batch log response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogsResponse {
    pub logs: Vec<String>,
}

/// Browser request for a container's logs (`POST /api/containers/logs`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerLogsRequest {
    pub host_uuid: Uuid,
    #[serde(default)]
    pub container_id: String,
    #[serde(default)]
    pub follow: Option<bool>,
    #[serde(default)]
    pub tail: Option<u32>,
    #[serde(default)]
    pub since: Option<i64>,
}

impl ContainerLogsRequest {
    /// Query forwarded to the agent, with the default tail applied
    pub fn to_query(&self) -> LogQuery {
        LogQuery {
            tail: Some(self.tail.unwrap_or(DEFAULT_TAIL)),
            follow: self.follow.filter(|follow| *follow),
            since: self.since,
        }
    }
}

/// Query string of the browser `EventSource` route (`GET /api/containers/logs/stream`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamLogsQuery {
    pub host_uuid: Uuid,
    #[serde(default)]
    pub container_id: String,
    #[serde(default)]
    pub tail: Option<u32>,
    #[serde(default)]
    pub since: Option<i64>,
}

impl StreamLogsQuery {
    pub fn to_query(&self) -> LogQuery {
        LogQuery {
            tail: Some(self.tail.unwrap_or(STREAM_DEFAULT_TAIL)),
            follow: Some(true),
            since: self.since,
        }
    }
}

/// Browser request for a full log download (`POST /api/containers/logs/download`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadLogsRequest {
    pub host_uuid: Uuid,
    #[serde(default)]
    pub container_id: String,
}

/// Attachment name for a log download taken at `now` (`logs-2024-01-31T09-05-00.log`)
pub fn download_filename(now: DateTime<Utc>) -> String {
    format!("logs-{}.log", now.format("%Y-%m-%dT%H-%M-%S"))
}
