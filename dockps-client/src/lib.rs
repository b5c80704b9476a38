//! docker.ps Agent Client
//!
//! A small, type-safe HTTP client for the API every docker.ps agent exposes.
//! The gateway builds one per request from the resolved host's URL and
//! shared key; the key travels in the `x-auth-key` header and nothing else
//! from the caller is forwarded.
//!
//! # Example
//!
//! ```no_run
//! use dockps_client::AgentClient;
//! use dockps_core::dto::log::LogQuery;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), dockps_client::ClientError> {
//!     let client = AgentClient::new("http://10.0.0.5:3000", "secret-key");
//!
//!     let logs = client
//!         .fetch_logs("web", &LogQuery { tail: Some(100), ..Default::default() })
//!         .await?;
//!
//!     for line in logs.logs {
//!         println!("{line}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
mod containers;
mod images;
mod logs;

pub use error::{ClientError, Result};
pub use logs::LogByteStream;

use dockps_core::AUTH_KEY_HEADER;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::error::extract_message;

/// HTTP client for one agent
#[derive(Clone)]
pub struct AgentClient {
    /// Base URL of the agent (e.g., "http://10.0.0.5:3000")
    base_url: String,
    /// Shared key sent as `x-auth-key`
    auth_key: String,
    /// HTTP client instance
    client: Client,
}

impl std::fmt::Debug for AgentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl AgentClient {
    /// Create a new agent client with a default HTTP client
    pub fn new(base_url: impl Into<String>, auth_key: impl Into<String>) -> Self {
        Self::with_client(base_url, auth_key, Client::new())
    }

    /// Create a new agent client with a custom HTTP client
    ///
    /// The gateway keeps separate clients for interactive calls, follow
    /// streams and downloads, since each needs different timeouts.
    pub fn with_client(
        base_url: impl Into<String>,
        auth_key: impl Into<String>,
        client: Client,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_key: auth_key.into(),
            client,
        }
    }

    /// Get the base URL of the agent
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(self.url(path))
            .header(AUTH_KEY_HEADER, &self.auth_key)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Check the status code, turning an error response into `ClientError::ApiError`
    async fn check_status(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(
                status.as_u16(),
                extract_message(&error_text),
            ));
        }

        Ok(response)
    }

    /// Handle an API response and deserialize JSON
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let response = self.check_status(response).await?;

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}

/// Encode an identifier for use as a single path segment
pub(crate) fn segment(id: &str) -> Result<String> {
    if id.trim().is_empty() {
        return Err(ClientError::InvalidRequest("identifier is empty".to_string()));
    }
    Ok(urlencoding::encode(id).into_owned())
}
