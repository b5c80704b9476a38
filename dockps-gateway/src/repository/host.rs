//! Host Repository
//!
//! Read-only access to the hosts users have registered.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dockps_core::domain::host::DockerHost;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum HostRepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Host lookup, always scoped to the requesting user
#[async_trait]
pub trait HostRepository: Send + Sync {
    /// The host with `host_uuid` if, and only if, `user_id` owns it
    async fn find_for_user(
        &self,
        host_uuid: Uuid,
        user_id: Uuid,
    ) -> Result<Option<DockerHost>, HostRepositoryError>;
}

/// PostgreSQL-backed host repository
#[derive(Debug, Clone)]
pub struct PgHostRepository {
    pool: PgPool,
}

impl PgHostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HostRepository for PgHostRepository {
    async fn find_for_user(
        &self,
        host_uuid: Uuid,
        user_id: Uuid,
    ) -> Result<Option<DockerHost>, HostRepositoryError> {
        let row = sqlx::query_as::<_, HostRow>(
            r#"
            SELECT uuid, user_id, name, url, auth_key, created_at
            FROM docker_hosts
            WHERE uuid = $1 AND user_id = $2
            "#,
        )
        .bind(host_uuid)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into()))
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct HostRow {
    uuid: Uuid,
    user_id: Uuid,
    name: String,
    url: String,
    auth_key: String,
    created_at: DateTime<Utc>,
}

impl From<HostRow> for DockerHost {
    fn from(row: HostRow) -> Self {
        DockerHost {
            uuid: row.uuid,
            user_id: row.user_id,
            name: row.name,
            url: row.url,
            auth_key: row.auth_key,
            created_at: row.created_at,
        }
    }
}

// =============================================================================
// In-memory repository for tests
// =============================================================================

#[cfg(test)]
#[derive(Debug, Default)]
pub struct InMemoryHostRepository {
    hosts: std::sync::Mutex<Vec<DockerHost>>,
}

#[cfg(test)]
impl InMemoryHostRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, host: DockerHost) {
        self.hosts.lock().unwrap().push(host);
    }
}

#[cfg(test)]
#[async_trait]
impl HostRepository for InMemoryHostRepository {
    async fn find_for_user(
        &self,
        host_uuid: Uuid,
        user_id: Uuid,
    ) -> Result<Option<DockerHost>, HostRepositoryError> {
        Ok(self
            .hosts
            .lock()
            .unwrap()
            .iter()
            .find(|host| host.uuid == host_uuid && host.is_owned_by(user_id))
            .cloned())
    }
}
