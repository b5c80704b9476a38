//! docker.ps Agent
//!
//! Runs next to a Docker daemon and exposes its containers, images and logs
//! over HTTP to the gateway.
//!
//! Architecture:
//! - Configuration: flags or environment variables
//! - Docker: HTTP/1.1 client for the daemon socket
//! - Source: daemon log bytes decoded into lines (batch or follow)
//! - Publisher: follow sessions relayed as Server-Sent Events
//! - API: axum router guarded by the shared `x-auth-key`

mod api;
mod config;
mod docker;
mod publisher;
mod source;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::AppState;
use crate::api::auth::AuthKey;
use crate::config::Config;
use crate::docker::{DockerApi, DockerDaemon};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dockps_agent=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting docker.ps agent");

    // Load configuration
    let config = Config::parse();
    config.validate()?;
    let auth_key = config.resolve_auth_key()?;
    let endpoint = config.endpoint()?;

    info!(
        bind_addr = %config.bind_addr,
        docker_host = %endpoint,
        default_tail = config.default_tail,
        "Loaded configuration"
    );

    // Make sure the daemon answers before accepting requests
    let docker = DockerDaemon::new(endpoint, config.docker_api_version.clone());
    docker.ping().await.with_context(|| {
        format!(
            "Docker daemon at {} is not responding; is the socket mounted?",
            docker.endpoint()
        )
    })?;
    info!("Connected to Docker daemon");

    let state = AppState::new(
        Arc::new(docker),
        AuthKey::new(&auth_key),
        config.default_tail,
        config.relay_config(),
    );
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!("Listening on {}", config.bind_addr);
    axum::serve(listener, app)
        .await
        .context("Agent server failed")?;

    Ok(())
}
