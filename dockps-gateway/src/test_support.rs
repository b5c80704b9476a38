//! Local stand-in for a host agent
//!
//! Serves the agent routes the gateway calls on `127.0.0.1:0` and records
//! every request that reaches it.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, Query, Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use dockps_core::dto::log::LogQuery;
use futures::{Stream, StreamExt, stream};
use serde_json::json;
use tokio::task::JoinHandle;

/// A request as the agent saw it
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub path: String,
    pub query: Option<String>,
    pub auth_key: Option<String>,
}

#[derive(Clone, Default)]
struct FakeAgentState {
    requests: Arc<Mutex<Vec<AgentRequest>>>,
    streams_dropped: Arc<AtomicUsize>,
}

pub struct FakeAgent {
    addr: SocketAddr,
    state: FakeAgentState,
    task: JoinHandle<()>,
}

impl FakeAgent {
    pub const KEY: &'static str = "docker_ps_agent_key";

    pub async fn start() -> Self {
        let state = FakeAgentState::default();
        let app = Router::new()
            .route("/containers", get(list_containers))
            .route("/containers/{id}", get(inspect_container))
            .route("/containers/{id}/remove", get(remove_container))
            .route("/containers/{id}/{action}", get(container_action))
            .route("/containers/{id}/logs", get(container_logs))
            .route("/containers/{id}/logs/download", get(download_logs))
            .route("/images", get(|| async { Json(json!([{ "Id": "sha256:abc" }])) }))
            .layer(middleware::from_fn_with_state(state.clone(), check_key))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state, task }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<AgentRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    /// How many `endless` log streams have been torn down
    pub fn streams_dropped(&self) -> usize {
        self.state.streams_dropped.load(Ordering::SeqCst)
    }
}

impl Drop for FakeAgent {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn check_key(State(state): State<FakeAgentState>, request: Request, next: Next) -> Response {
    let auth_key = request
        .headers()
        .get("x-auth-key")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    state.requests.lock().unwrap().push(AgentRequest {
        path: request.uri().path().to_string(),
        query: request.uri().query().map(str::to_string),
        auth_key: auth_key.clone(),
    });

    if auth_key.as_deref() != Some(FakeAgent::KEY) {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Unauthorized" }))).into_response();
    }
    next.run(request).await
}

fn not_found(what: &str, id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("No such {what}: {id}") })),
    )
        .into_response()
}

async fn list_containers() -> Json<serde_json::Value> {
    Json(json!([
        {
            "Id": "web",
            "Names": ["/web"],
            "Image": "nginx:latest",
            "Ports": [{ "IP": "0.0.0.0", "PrivatePort": 80, "PublicPort": 8080, "Type": "tcp" }],
            "State": "running",
            "Status": "Up 2 hours",
            "Created": 1700000000,
            "Labels": {}
        },
        {
            "Id": "agent",
            "Names": ["/dockps-agent"],
            "Image": "dockps/agent",
            "Ports": [],
            "State": "running",
            "Status": "Up 3 days",
            "Created": 1690000000,
            "Labels": { "docker.ps-agent": "true" }
        }
    ]))
}

async fn inspect_container(Path(id): Path<String>) -> Response {
    if id == "missing" {
        return not_found("container", &id);
    }
    Json(json!({ "Id": id, "State": { "Running": true } })).into_response()
}

async fn container_action(Path((id, action)): Path<(String, String)>) -> Response {
    if id == "missing" {
        return not_found("container", &id);
    }
    Json(json!({ "Id": id, "LastAction": action })).into_response()
}

async fn remove_container(Path(id): Path<String>) -> Response {
    Json(json!({ "message": format!("Container {id} has been removed.") })).into_response()
}

async fn container_logs(
    State(state): State<FakeAgentState>,
    Path(id): Path<String>,
    Query(query): Query<LogQuery>,
) -> Response {
    if id == "missing" {
        return not_found("container", &id);
    }
    if id == "daemon-down" {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "Docker daemon is not reachable" })),
        )
            .into_response();
    }
    if !query.is_follow() {
        return Json(json!({ "logs": ["hello", "world"] })).into_response();
    }

    match id.as_str() {
        "broken" => sse(
            stream::iter(vec![
                Ok(Bytes::from_static(b"data: {\"line\":\"partial\"}\n\n")),
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "daemon went away")),
            ])
            .boxed(),
        ),
        "endless" => sse(endless_pings(Arc::clone(&state.streams_dropped)).boxed()),
        // Chunk boundaries deliberately fall inside events.
        _ => sse(
            stream::iter(vec![
                Ok(Bytes::from_static(b"data: {\"line\":\"hel")),
                Ok(Bytes::from_static(b"lo\"}\n\ndata: {\"line\":\"world\"}\n")),
                Ok(Bytes::from_static(
                    b"\ndata: {\"line\":\"[Log stream ended]\"}\n\n",
                )),
            ])
            .boxed(),
        ),
    }
}

async fn download_logs(Path(id): Path<String>) -> Response {
    let body = match id.as_str() {
        "empty" => "",
        "missing" => return not_found("container", &id),
        _ => "hello\nworld\n",
    };
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
}

fn sse(body: stream::BoxStream<'static, io::Result<Bytes>>) -> Response {
    ([(header::CONTENT_TYPE, "text/event-stream")], Body::from_stream(body)).into_response()
}

/// Counts one drop when the stream it travels with is released
struct StreamGuard(Arc<AtomicUsize>);

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn endless_pings(dropped: Arc<AtomicUsize>) -> impl Stream<Item = io::Result<Bytes>> + Send {
    stream::unfold(StreamGuard(dropped), |guard| async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Some((Ok(Bytes::from_static(b": ping\n\n")), guard))
    })
}

/// Drain a relay body into one string
pub async fn collect_stream<S, E>(stream: S) -> String
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Debug,
{
    let chunks: Vec<Bytes> = stream.map(|chunk| chunk.unwrap()).collect().await;
    String::from_utf8(chunks.concat()).unwrap()
}
