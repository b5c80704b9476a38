//! Agent Service
//!
//! Resolves a user's host and hands out a client for its agent. Every client
//! carries the key of exactly the host it was built for.

use std::sync::Arc;

use dockps_client::AgentClient;
use dockps_core::domain::host::DockerHost;
use reqwest::Client;
use thiserror::Error;
use uuid::Uuid;

use crate::config::AgentTimeouts;
use crate::repository::{HostRepository, HostRepositoryError};

/// Service error type
#[derive(Debug, Error)]
pub enum HostError {
    /// Unknown host, or a host owned by somebody else
    #[error("Docker Host Not Found")]
    NotFound,

    #[error(transparent)]
    Repository(#[from] HostRepositoryError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, HostError>;

/// What an agent call is for; decides its timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentPurpose {
    /// JSON round-trips (30 s total)
    Interactive,
    /// Follow streams (connect timeout only, no total limit)
    Streaming,
    /// Log downloads (300 s total, no size cap)
    Download,
}

#[derive(Clone)]
pub struct AgentService {
    hosts: Arc<dyn HostRepository>,
    interactive: Client,
    streaming: Client,
    download: Client,
}

impl AgentService {
    pub fn new(hosts: Arc<dyn HostRepository>, timeouts: AgentTimeouts) -> Result<Self> {
        let interactive = Client::builder()
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.request)
            .build()?;
        let streaming = Client::builder().connect_timeout(timeouts.connect).build()?;
        let download = Client::builder()
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.download)
            .build()?;

        Ok(Self {
            hosts,
            interactive,
            streaming,
            download,
        })
    }

    /// Look up a host the user owns
    pub async fn resolve_host(&self, user_id: Uuid, host_uuid: Uuid) -> Result<DockerHost> {
        let host = self
            .hosts
            .find_for_user(host_uuid, user_id)
            .await?
            .ok_or(HostError::NotFound)?;

        tracing::debug!(%host_uuid, host = %host.name, "Resolved Docker host");
        Ok(host)
    }

    /// Client for `host`'s agent, configured for `purpose`
    pub fn client_for(&self, host: &DockerHost, purpose: AgentPurpose) -> AgentClient {
        let http = match purpose {
            AgentPurpose::Interactive => &self.interactive,
            AgentPurpose::Streaming => &self.streaming,
            AgentPurpose::Download => &self.download,
        };
        AgentClient::with_client(host.url.clone(), host.auth_key.clone(), http.clone())
    }

    /// Resolve the host and build its client in one step
    pub async fn connect(&self, user_id: Uuid, host_uuid: Uuid, purpose: AgentPurpose) -> Result<AgentClient> {
        let host = self.resolve_host(user_id, host_uuid).await?;
        Ok(self.client_for(&host, purpose))
    }
}
