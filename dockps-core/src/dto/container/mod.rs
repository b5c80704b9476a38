//! Container and image DTOs
//!
//! Request bodies for the gateway's one-shot actions. Every request names
//! the host it targets; the gateway checks ownership before forwarding.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Label the agent's own container carries; such containers are hidden from listings
pub const AGENT_LABEL: &str = "docker.ps-agent";

/// Request scoped to a host (`POST /api/containers/list`, `/api/images/list`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostRequest {
    pub host_uuid: Uuid,
}

/// Request scoped to one container on a host
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRequest {
    pub host_uuid: Uuid,
    #[serde(default)]
    pub container_id: String,
}

/// Request scoped to one image on a host
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequest {
    pub host_uuid: Uuid,
    #[serde(default)]
    pub image_id: String,
}

/// Plain confirmation returned by remove operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionMessage {
    pub message: String,
}

// =============================================================================
// Container Listing
// =============================================================================

/// One entry of the daemon's `GET /containers/json`, reduced to what the
/// gateway reads
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DaemonContainer {
    pub id: String,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub ports: Vec<DaemonPort>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created: i64,
    /// `null` for containers without labels
    #[serde(default)]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DaemonPort {
    #[serde(rename = "IP", default)]
    pub ip: Option<String>,
    pub private_port: u16,
    #[serde(default)]
    pub public_port: Option<u16>,
}

impl DaemonContainer {
    /// Whether this is a docker.ps agent container
    pub fn is_agent(&self) -> bool {
        self.labels
            .as_ref()
            .and_then(|labels| labels.get(AGENT_LABEL))
            .is_some_and(|value| value == "true")
    }
}

/// Container as the browser lists it (`POST /api/containers/list`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSummary {
    pub id: String,
    /// First name without the leading `/`
    pub name: String,
    pub image: String,
    pub ports: Vec<PortSummary>,
    pub state: String,
    pub status: String,
    /// Unix timestamp in seconds
    pub created: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortSummary {
    pub ip: String,
    pub private_port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_port: Option<u16>,
}

impl From<DaemonContainer> for ContainerSummary {
    fn from(container: DaemonContainer) -> Self {
        let name = container
            .names
            .first()
            .map(|name| name.trim_start_matches('/').to_string())
            .unwrap_or_default();

        ContainerSummary {
            id: container.id,
            name,
            image: container.image,
            ports: container
                .ports
                .into_iter()
                .map(|port| PortSummary {
                    ip: port.ip.unwrap_or_default(),
                    private_port: port.private_port,
                    public_port: port.public_port,
                })
                .collect(),
            state: container.state,
            status: container.status,
            created: container.created,
        }
    }
}

/// Browser listing of a host's containers, the agent itself left out
pub fn summarize_containers(containers: Vec<DaemonContainer>) -> Vec<ContainerSummary> {
    containers
        .into_iter()
        .filter(|container| !container.is_agent())
        .map(ContainerSummary::from)
        .collect()
}

/// Lifecycle actions that return the container's inspect data afterwards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerAction {
    Start,
    Stop,
    Restart,
    Pause,
    Unpause,
}

impl ContainerAction {
    pub const ALL: [ContainerAction; 5] = [
        ContainerAction::Start,
        ContainerAction::Stop,
        ContainerAction::Restart,
        ContainerAction::Pause,
        ContainerAction::Unpause,
    ];

    /// Path segment used by both the agent API and the daemon API
    pub fn as_str(self) -> &'static str {
        match self {
            ContainerAction::Start => "start",
            ContainerAction::Stop => "stop",
            ContainerAction::Restart => "restart",
            ContainerAction::Pause => "pause",
            ContainerAction::Unpause => "unpause",
        }
    }
}

impl std::fmt::Display for ContainerAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
