//! API Module
//!
//! HTTP surface of the agent. Every route, the health check included,
//! sits behind the shared-key check.

pub mod auth;
pub mod containers;
pub mod error;
pub mod health;
pub mod images;
pub mod logs;

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::HeaderValue,
    middleware,
    response::Response,
    routing::get,
};
use dockps_core::relay::{RelayConfig, RelayStream};
use dockps_core::sse::RESPONSE_HEADERS;
use tower_http::trace::TraceLayer;

use crate::api::auth::AuthKey;
use crate::docker::DockerApi;
use crate::publisher::LogPublisher;
use crate::source::LogSource;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub docker: Arc<dyn DockerApi>,
    pub source: LogSource,
    pub publisher: LogPublisher,
    pub auth: Arc<AuthKey>,
    pub default_tail: u32,
}

impl AppState {
    pub fn new(docker: Arc<dyn DockerApi>, auth: AuthKey, default_tail: u32, relay: RelayConfig) -> Self {
        let source = LogSource::new(Arc::clone(&docker), relay.channel_capacity);
        Self {
            publisher: LogPublisher::new(source.clone(), relay),
            source,
            docker,
            auth: Arc::new(auth),
            default_tail,
        }
    }
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/", get(health::health_check))
        // Container endpoints
        .route("/containers", get(containers::list_containers))
        .route("/containers/{id}", get(containers::inspect_container))
        .route("/containers/{id}/remove", get(containers::remove_container))
        .route("/containers/{id}/{action}", get(containers::container_action))
        // Log endpoints
        .route("/containers/{id}/logs", get(logs::container_logs))
        .route("/containers/{id}/logs/download", get(logs::download_logs))
        // Image endpoints
        .route("/images", get(images::list_images))
        .route("/images/{id}", get(images::inspect_image))
        .route("/images/{id}/remove", get(images::remove_image))
        // Add state and middleware
        .layer(middleware::from_fn_with_state(state.clone(), auth::require_auth_key))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Wrap a relay stream as an SSE response
pub fn sse_response(stream: RelayStream) -> Response {
    let mut response = Response::new(Body::from_stream(stream));
    for (name, value) in RESPONSE_HEADERS {
        response
            .headers_mut()
            .insert(name, HeaderValue::from_static(value));
    }
    response
}
