//! Log endpoints: batch, follow stream and download

use std::pin::Pin;

use bytes::Bytes;
use dockps_core::dto::log::{LogQuery, LogsResponse};
use futures::{Stream, StreamExt};

use crate::error::Result;
use crate::{AgentClient, segment};

/// Raw SSE bytes of an agent follow stream
///
/// Dropping the stream closes the connection to the agent.
pub type LogByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

impl AgentClient {
    // =============================================================================
    // Batch
    // =============================================================================

    /// Fetch the last `tail` lines (optionally bounded by `since`) in one round-trip
    pub async fn fetch_logs(&self, container_id: &str, query: &LogQuery) -> Result<LogsResponse> {
        let path = format!("/containers/{}/logs", segment(container_id)?);
        let query = LogQuery {
            follow: None,
            ..query.clone()
        };

        let response = self.get(&path).query(&query).send().await?;
        self.handle_response(response).await
    }

    // =============================================================================
    // Follow
    // =============================================================================

    /// Open the agent's SSE stream for a container
    ///
    /// The status is checked before any byte is handed out, so an upstream
    /// 404 or 401 surfaces here rather than as a broken stream.
    pub async fn open_log_stream(&self, container_id: &str, query: &LogQuery) -> Result<LogByteStream> {
        let path = format!("/containers/{}/logs", segment(container_id)?);
        let query = LogQuery {
            follow: Some(true),
            ..query.clone()
        };

        let response = self
            .get(&path)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .query(&query)
            .send()
            .await?;
        let response = self.check_status(response).await?;

        tracing::debug!(agent = %self.base_url, container_id, "Agent log stream opened");
        Ok(response.bytes_stream().boxed())
    }

    // =============================================================================
    // Download
    // =============================================================================

    /// Download the complete log transcript
    ///
    /// The body is read in full with no size cap; timeouts come from the
    /// underlying HTTP client.
    pub async fn download_logs(&self, container_id: &str) -> Result<Bytes> {
        let path = format!("/containers/{}/logs/download", segment(container_id)?);
        let response = self.get(&path).send().await?;
        let response = self.check_status(response).await?;

        Ok(response.bytes().await?)
    }
}
