//! Container endpoints

use dockps_core::dto::container::{ActionMessage, ContainerAction, DaemonContainer};
use serde_json::Value;

use crate::error::Result;
use crate::{AgentClient, segment};

impl AgentClient {
    /// List all containers on the host, running or not
    pub async fn list_containers(&self) -> Result<Vec<DaemonContainer>> {
        let response = self.get("/containers").send().await?;
        self.handle_response(response).await
    }

    /// Daemon inspect data for one container
    pub async fn inspect_container(&self, container_id: &str) -> Result<Value> {
        let path = format!("/containers/{}", segment(container_id)?);
        let response = self.get(&path).send().await?;
        self.handle_response(response).await
    }

    /// Run a lifecycle action; the agent answers with the container's inspect data
    pub async fn container_action(&self, container_id: &str, action: ContainerAction) -> Result<Value> {
        let path = format!("/containers/{}/{}", segment(container_id)?, action.as_str());
        let response = self.get(&path).send().await?;
        self.handle_response(response).await
    }

    /// Force-remove a container
    pub async fn remove_container(&self, container_id: &str) -> Result<ActionMessage> {
        let path = format!("/containers/{}/remove", segment(container_id)?);
        let response = self.get(&path).send().await?;
        self.handle_response(response).await
    }
}
