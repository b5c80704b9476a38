//! API Module
//!
//! HTTP API layer for the gateway. Every `/api` handler authenticates the
//! user and checks host ownership before an agent is contacted.

pub mod containers;
pub mod error;
pub mod health;
pub mod images;
pub mod logs;

use axum::{
    Router,
    body::Body,
    extract::FromRef,
    http::HeaderValue,
    response::Response,
    routing::{get, post},
};
use dockps_core::relay::{RelayConfig, RelayStream};
use dockps_core::sse::RESPONSE_HEADERS;
use tower_http::trace::TraceLayer;

use crate::api::error::{ApiError, ApiResult};
use crate::auth::AuthManager;
use crate::service::AgentService;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub agents: AgentService,
    pub auth: AuthManager,
    pub relay: RelayConfig,
}

impl FromRef<AppState> for AuthManager {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Container endpoints
        .route("/api/containers/list", post(containers::list_containers))
        .route("/api/containers/index", post(containers::inspect_container))
        .route("/api/containers/remove", post(containers::remove_container))
        .route("/api/containers/{action}", post(containers::container_action))
        // Log endpoints
        .route("/api/containers/logs", post(logs::container_logs))
        .route("/api/containers/logs/stream", get(logs::stream_logs))
        .route("/api/containers/logs/download", post(logs::download_logs))
        // Image endpoints
        .route("/api/images/list", post(images::list_images))
        .route("/api/images/index", post(images::inspect_image))
        .route("/api/images/remove", post(images::remove_image))
        // Add state and middleware
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

/// Reject requests whose target id is missing before any lookup happens
pub(crate) fn require_id(id: &str, message: &str) -> ApiResult<()> {
    if id.trim().is_empty() {
        return Err(ApiError::BadRequest(message.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::http::{Request, StatusCode, header};
    use bytes::Bytes;
    use chrono::Utc;
    use dockps_core::domain::host::DockerHost;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::auth::tests::{SECRET, token_for};
    use crate::config::AgentTimeouts;
    use crate::repository::InMemoryHostRepository;
    use crate::test_support::FakeAgent;

    struct Harness {
        app: Router,
        agent: FakeAgent,
        owner: Uuid,
        host_uuid: Uuid,
        unreachable_host: Uuid,
    }

    async fn harness() -> Harness {
        let agent = FakeAgent::start().await;
        let owner = Uuid::new_v4();
        let repo = InMemoryHostRepository::new();

        let host = DockerHost {
            uuid: Uuid::new_v4(),
            user_id: owner,
            name: "prod".to_string(),
            url: agent.url(),
            auth_key: FakeAgent::KEY.to_string(),
            created_at: Utc::now(),
        };
        let host_uuid = host.uuid;
        repo.insert(host);

        // Nothing listens on port 1.
        let unreachable = DockerHost {
            uuid: Uuid::new_v4(),
            user_id: owner,
            name: "offline".to_string(),
            url: "http://127.0.0.1:1".to_string(),
            auth_key: "docker_ps_other".to_string(),
            created_at: Utc::now(),
        };
        let unreachable_host = unreachable.uuid;
        repo.insert(unreachable);

        let state = AppState {
            agents: AgentService::new(Arc::new(repo), AgentTimeouts::default()).unwrap(),
            auth: AuthManager::new(SECRET, "auth_token"),
            relay: RelayConfig::default(),
        };

        Harness {
            app: create_router(state),
            agent,
            owner,
            host_uuid,
            unreachable_host,
        }
    }

    fn post(uri: &str, user: Uuid, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::COOKIE, format!("auth_token={}", token_for(user)))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_needs_no_session() {
        let h = harness().await;
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let response = h.app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({ "status": "ok", "service": "dockps-gateway" })
        );
    }

    #[tokio::test]
    async fn test_missing_session_is_unauthorized() {
        let h = harness().await;
        let request = Request::builder()
            .method("POST")
            .uri("/api/containers/list")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json!({ "hostUuid": h.host_uuid }).to_string()))
            .unwrap();

        let response = h.app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await, json!({ "error": "Unauthorized" }));
        assert!(h.agent.requests().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_host_is_not_found_and_agent_untouched() {
        let h = harness().await;
        let stranger = Uuid::new_v4();

        let response = h
            .app
            .clone()
            .oneshot(post(
                "/api/containers/logs",
                stranger,
                json!({ "hostUuid": h.host_uuid, "containerId": "web", "follow": true }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, json!({ "error": "Docker Host Not Found" }));

        let response = h
            .app
            .oneshot(post(
                "/api/containers/logs/download",
                stranger,
                json!({ "hostUuid": h.host_uuid, "containerId": "web" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(h.agent.requests().is_empty());
    }

    #[tokio::test]
    async fn test_blank_container_id_is_rejected() {
        let h = harness().await;

        let response = h
            .app
            .oneshot(post(
                "/api/containers/logs",
                h.owner,
                json!({ "hostUuid": h.host_uuid, "containerId": "" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Host UUID and Container ID are required" })
        );
        assert!(h.agent.requests().is_empty());
    }

    #[tokio::test]
    async fn test_batch_logs_pass_through_with_host_key() {
        let h = harness().await;

        let response = h
            .app
            .oneshot(post(
                "/api/containers/logs",
                h.owner,
                json!({ "hostUuid": h.host_uuid, "containerId": "web", "tail": 50 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "logs": ["hello", "world"] }));

        let requests = h.agent.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].path, "/containers/web/logs");
        assert_eq!(requests[0].query.as_deref(), Some("tail=50"));
        assert_eq!(requests[0].auth_key.as_deref(), Some(FakeAgent::KEY));
    }

    #[tokio::test]
    async fn test_follow_relays_agent_events_then_closes() {
        let h = harness().await;

        let response = h
            .app
            .oneshot(post(
                "/api/containers/logs",
                h.owner,
                json!({ "hostUuid": h.host_uuid, "containerId": "web", "follow": true }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(response.headers()["x-accel-buffering"], "no");
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");

        assert_eq!(
            body_text(response).await,
            "data: {\"line\":\"hello\"}\n\n\
             data: {\"line\":\"world\"}\n\n\
             data: {\"line\":\"[Log stream ended]\"}\n\n\
             event: close\ndata: {\"status\":\"stream_ended\"}\n\n"
        );
        assert_eq!(
            h.agent.requests()[0].query.as_deref(),
            Some("tail=1000&follow=true")
        );
    }

    #[tokio::test]
    async fn test_event_source_route_defaults_to_tail_100() {
        let h = harness().await;
        let request = Request::builder()
            .uri(format!(
                "/api/containers/logs/stream?hostUuid={}&containerId=web",
                h.host_uuid
            ))
            .header(header::AUTHORIZATION, format!("Bearer {}", token_for(h.owner)))
            .body(Body::empty())
            .unwrap();

        let response = h.app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.ends_with("event: close\ndata: {\"status\":\"stream_ended\"}\n\n"));
        assert_eq!(
            h.agent.requests()[0].query.as_deref(),
            Some("tail=100&follow=true")
        );
    }

    #[tokio::test]
    async fn test_follow_error_statuses() {
        let h = harness().await;

        let missing = h
            .app
            .clone()
            .oneshot(post(
                "/api/containers/logs",
                h.owner,
                json!({ "hostUuid": h.host_uuid, "containerId": "missing", "follow": true }),
            ))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let daemon_down = h
            .app
            .clone()
            .oneshot(post(
                "/api/containers/logs",
                h.owner,
                json!({ "hostUuid": h.host_uuid, "containerId": "daemon-down", "follow": true }),
            ))
            .await
            .unwrap();
        assert_eq!(daemon_down.status(), StatusCode::BAD_GATEWAY);

        let offline = h
            .app
            .oneshot(post(
                "/api/containers/logs",
                h.owner,
                json!({ "hostUuid": h.unreachable_host, "containerId": "web", "follow": true }),
            ))
            .await
            .unwrap();
        assert_eq!(offline.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_json(offline).await, json!({ "error": "Agent is not reachable" }));
    }

    #[tokio::test]
    async fn test_dropping_browser_stream_releases_agent_stream_once() {
        let h = harness().await;

        let response = h
            .app
            .oneshot(post(
                "/api/containers/logs",
                h.owner,
                json!({ "hostUuid": h.host_uuid, "containerId": "endless", "follow": true }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let mut body = response.into_body();
        let first = body.frame().await.unwrap().unwrap().into_data().unwrap();
        assert_eq!(first, Bytes::from_static(b": ping\n\n"));
        assert_eq!(h.agent.streams_dropped(), 0);

        drop(body);
        for _ in 0..100 {
            if h.agent.streams_dropped() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(h.agent.streams_dropped(), 1);
    }

    #[tokio::test]
    async fn test_empty_download_is_empty_text() {
        let h = harness().await;

        let response = h
            .app
            .oneshot(post(
                "/api/containers/logs/download",
                h.owner,
                json!({ "hostUuid": h.host_uuid, "containerId": "empty" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
        let disposition = response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.starts_with("attachment; filename=\"logs-"));
        assert!(disposition.ends_with(".log\""));
        assert_eq!(body_text(response).await, "");
    }

    #[tokio::test]
    async fn test_download_error_statuses() {
        let h = harness().await;

        let missing = h
            .app
            .clone()
            .oneshot(post(
                "/api/containers/logs/download",
                h.owner,
                json!({ "hostUuid": h.host_uuid, "containerId": "missing" }),
            ))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let offline = h
            .app
            .oneshot(post(
                "/api/containers/logs/download",
                h.owner,
                json!({ "hostUuid": h.unreachable_host, "containerId": "web" }),
            ))
            .await
            .unwrap();
        assert_eq!(offline.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(offline).await, json!({ "error": "Agent is not reachable" }));
    }

    #[tokio::test]
    async fn test_container_list_hides_agent_and_is_simplified() {
        let h = harness().await;

        let response = h
            .app
            .oneshot(post("/api/containers/list", h.owner, json!({ "hostUuid": h.host_uuid })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!([{
                "id": "web",
                "name": "web",
                "image": "nginx:latest",
                "ports": [{ "ip": "0.0.0.0", "privatePort": 80, "publicPort": 8080 }],
                "state": "running",
                "status": "Up 2 hours",
                "created": 1700000000
            }])
        );
        assert_eq!(h.agent.requests()[0].path, "/containers");
    }

    #[tokio::test]
    async fn test_container_and_image_actions() {
        let h = harness().await;

        let response = h
            .app
            .clone()
            .oneshot(post(
                "/api/containers/restart",
                h.owner,
                json!({ "hostUuid": h.host_uuid, "containerId": "web" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["LastAction"], "restart");

        let response = h
            .app
            .clone()
            .oneshot(post(
                "/api/containers/remove",
                h.owner,
                json!({ "hostUuid": h.host_uuid, "containerId": "web" }),
            ))
            .await
            .unwrap();
        assert_eq!(
            body_json(response).await,
            json!({ "message": "Container web has been removed." })
        );

        let response = h
            .app
            .clone()
            .oneshot(post(
                "/api/containers/index",
                h.owner,
                json!({ "hostUuid": h.host_uuid, "containerId": "missing" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = h
            .app
            .clone()
            .oneshot(post("/api/images/list", h.owner, json!({ "hostUuid": h.host_uuid })))
            .await
            .unwrap();
        assert_eq!(body_json(response).await, json!([{ "Id": "sha256:abc" }]));

        let response = h
            .app
            .oneshot(post(
                "/api/images/index",
                h.owner,
                json!({ "hostUuid": h.host_uuid, "imageId": " " }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Host UUID and Image ID are required" })
        );

        let paths: Vec<_> = h.agent.requests().into_iter().map(|r| r.path).collect();
        assert_eq!(
            paths,
            vec!["/containers/web/restart", "/containers/web/remove", "/containers/missing", "/images"]
        );
    }
}
