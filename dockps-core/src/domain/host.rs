//! Docker host domain model
//!
//! A remote Docker host as registered by a user. Owned by the persistence
//! layer; the gateway only ever reads it.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A remote host running the docker.ps agent
#[derive(Clone)]
pub struct DockerHost {
    /// Public identifier used in API requests
    pub uuid: Uuid,

    /// Owner of the host; only this user may address it
    pub user_id: Uuid,

    /// Display name
    pub name: String,

    /// Base URL of the agent (e.g., "http://10.0.0.5:3000")
    pub url: String,

    /// Shared secret sent to this host's agent, and to no other
    pub auth_key: String,

    pub created_at: DateTime<Utc>,
}

impl DockerHost {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }
}

impl std::fmt::Debug for DockerHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerHost")
            .field("uuid", &self.uuid)
            .field("user_id", &self.user_id)
            .field("name", &self.name)
            .field("url", &self.url)
            .field("auth_key", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}
