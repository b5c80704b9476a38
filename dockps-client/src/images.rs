//! Image endpoints

use dockps_core::dto::container::ActionMessage;
use serde_json::Value;

use crate::error::Result;
use crate::{AgentClient, segment};

impl AgentClient {
    pub async fn list_images(&self) -> Result<Value> {
        let response = self.get("/images").send().await?;
        self.handle_response(response).await
    }

    pub async fn inspect_image(&self, image_id: &str) -> Result<Value> {
        let path = format!("/images/{}", segment(image_id)?);
        let response = self.get(&path).send().await?;
        self.handle_response(response).await
    }

    /// Force-remove an image
    pub async fn remove_image(&self, image_id: &str) -> Result<ActionMessage> {
        let path = format!("/images/{}/remove", segment(image_id)?);
        let response = self.get(&path).send().await?;
        self.handle_response(response).await
    }
}
