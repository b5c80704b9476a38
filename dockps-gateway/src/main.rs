//! docker.ps Gateway
//!
//! Browser-facing API. Authenticates users, resolves the Docker hosts they
//! own and forwards requests (log streams included) to each host's agent.

mod api;
mod auth;
mod config;
mod db;
mod relay;
mod repository;
mod service;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::AppState;
use crate::auth::AuthManager;
use crate::config::Config;
use crate::repository::PgHostRepository;
use crate::service::AgentService;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dockps_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting docker.ps gateway...");

    let config = Config::parse();
    config.validate()?;

    tracing::info!("Connecting to database...");

    let pool = db::create_pool(&config.database_url, config.database_max_connections)
        .await
        .context("Failed to create database pool")?;

    tracing::info!("Database connection pool created");

    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let agents = AgentService::new(
        Arc::new(PgHostRepository::new(pool)),
        config.agent_timeouts(),
    )
    .context("Failed to build agent HTTP clients")?;

    let state = AppState {
        agents,
        auth: AuthManager::new(&config.jwt_secret, &config.auth_cookie_name),
        relay: config.relay_config(),
    };
    let app = api::create_router(state);

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Gateway server failed")?;

    Ok(())
}
