//! Docker daemon client
//!
//! Speaks HTTP/1.1 to the daemon over its unix socket (or plain TCP). Every
//! request opens its own connection: a follow stream never shares a socket,
//! and dropping its body closes that socket.

use std::path::PathBuf;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use dockps_core::dto::container::ContainerAction;
use futures::{Stream, StreamExt, TryStreamExt};
use http_body_util::{BodyExt, Empty};
use hyper::body::Incoming;
use hyper::client::conn::http1::SendRequest;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, UnixStream};

/// Raw daemon response body
pub type DaemonBody = Pin<Box<dyn Stream<Item = Result<Bytes, DaemonError>> + Send>>;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("Docker daemon is not reachable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Docker API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Docker connection failed: {0}")]
    Transport(String),

    #[error("Invalid response from Docker daemon: {0}")]
    InvalidResponse(String),
}

impl DaemonError {
    /// Build the error for a non-success daemon response
    ///
    /// The daemon reports failures as `{"message": "..."}`.
    pub fn from_status(status: StatusCode, body: &[u8]) -> Self {
        let message = serde_json::from_slice::<Value>(body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
            .unwrap_or_else(|| String::from_utf8_lossy(body).trim().to_string());

        if status == StatusCode::NOT_FOUND {
            DaemonError::NotFound(message)
        } else {
            DaemonError::Api {
                status: status.as_u16(),
                message,
            }
        }
    }
}

// =============================================================================
// Endpoint
// =============================================================================

/// Where the daemon listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonEndpoint {
    Unix(PathBuf),
    /// `host:port`
    Tcp(String),
}

impl DaemonEndpoint {
    /// Parse a `DOCKER_HOST` style address
    pub fn parse(host: &str) -> anyhow::Result<Self> {
        if let Some(path) = host.strip_prefix("unix://") {
            if path.is_empty() {
                anyhow::bail!("unix socket path cannot be empty");
            }
            return Ok(DaemonEndpoint::Unix(PathBuf::from(path)));
        }

        let addr = host
            .strip_prefix("tcp://")
            .or_else(|| host.strip_prefix("http://"))
            .ok_or_else(|| anyhow::anyhow!("unsupported Docker host '{}': expected unix:// or tcp://", host))?
            .trim_end_matches('/');

        if !addr.contains(':') {
            anyhow::bail!("Docker host '{}' is missing a port", host);
        }
        Ok(DaemonEndpoint::Tcp(addr.to_string()))
    }

    fn host_header(&self) -> &str {
        match self {
            DaemonEndpoint::Unix(_) => "docker",
            DaemonEndpoint::Tcp(addr) => addr,
        }
    }
}

impl std::fmt::Display for DaemonEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DaemonEndpoint::Unix(path) => write!(f, "unix://{}", path.display()),
            DaemonEndpoint::Tcp(addr) => write!(f, "tcp://{}", addr),
        }
    }
}

// =============================================================================
// Log request options
// =============================================================================

/// Options of a daemon `GET /containers/{id}/logs` request
///
/// `since` bounds the range before `tail` cuts it; the daemon applies them
/// in that order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogOptions {
    /// `None` means every line
    pub tail: Option<u32>,
    pub follow: bool,
    /// Unix seconds
    pub since: Option<i64>,
}

impl LogOptions {
    pub fn to_query(&self) -> String {
        let tail = self
            .tail
            .map(|n| n.to_string())
            .unwrap_or_else(|| "all".to_string());

        let mut query = format!(
            "stdout=1&stderr=1&follow={}&tail={}",
            u8::from(self.follow),
            tail
        );
        if let Some(since) = self.since {
            query.push_str(&format!("&since={}", since));
        }
        query
    }
}

// =============================================================================
// API
// =============================================================================

/// Operations the agent needs from the Docker daemon
#[async_trait]
pub trait DockerApi: Send + Sync {
    async fn ping(&self) -> Result<(), DaemonError>;

    async fn list_containers(&self) -> Result<Value, DaemonError>;

    async fn inspect_container(&self, id: &str) -> Result<Value, DaemonError>;

    async fn container_action(&self, id: &str, action: ContainerAction) -> Result<(), DaemonError>;

    /// Force-remove
    async fn remove_container(&self, id: &str) -> Result<(), DaemonError>;

    async fn list_images(&self) -> Result<Value, DaemonError>;

    async fn inspect_image(&self, id: &str) -> Result<Value, DaemonError>;

    /// Force-remove
    async fn remove_image(&self, id: &str) -> Result<(), DaemonError>;

    /// Open the log endpoint and hand back the raw body once the status is known good
    async fn container_logs(&self, id: &str, options: &LogOptions) -> Result<DaemonBody, DaemonError>;
}

/// `DockerApi` over a real daemon connection
#[derive(Debug, Clone)]
pub struct DockerDaemon {
    endpoint: DaemonEndpoint,
    api_version: Option<String>,
}

impl DockerDaemon {
    pub fn new(endpoint: DaemonEndpoint, api_version: Option<String>) -> Self {
        Self {
            endpoint,
            api_version: api_version.map(|v| v.trim_matches('/').to_string()),
        }
    }

    pub fn endpoint(&self) -> &DaemonEndpoint {
        &self.endpoint
    }

    fn uri(&self, path: &str) -> String {
        match &self.api_version {
            Some(version) => format!("/{}{}", version, path),
            None => path.to_string(),
        }
    }

    async fn connect(&self) -> Result<SendRequest<Empty<Bytes>>, DaemonError> {
        match &self.endpoint {
            DaemonEndpoint::Unix(path) => {
                let stream = UnixStream::connect(path)
                    .await
                    .map_err(|e| DaemonError::Unavailable(format!("{}: {}", path.display(), e)))?;
                handshake(stream).await
            }
            DaemonEndpoint::Tcp(addr) => {
                let stream = TcpStream::connect(addr.as_str())
                    .await
                    .map_err(|e| DaemonError::Unavailable(format!("{}: {}", addr, e)))?;
                handshake(stream).await
            }
        }
    }

    async fn send(&self, method: Method, path: &str) -> Result<Response<Incoming>, DaemonError> {
        let request = Request::builder()
            .method(method)
            .uri(self.uri(path))
            .header(hyper::header::HOST, self.endpoint.host_header())
            .body(Empty::<Bytes>::new())
            .map_err(|e| DaemonError::Transport(e.to_string()))?;

        let mut sender = self.connect().await?;
        sender
            .send_request(request)
            .await
            .map_err(|e| DaemonError::Transport(e.to_string()))
    }

    /// Send a request and read the whole body, failing on an error status
    async fn call(&self, method: Method, path: &str) -> Result<Bytes, DaemonError> {
        let response = self.send(method, path).await?;
        let status = response.status();
        let body = read_body(response.into_body()).await?;

        // 304: already started / already stopped
        if status.is_success() || status == StatusCode::NOT_MODIFIED {
            Ok(body)
        } else {
            Err(DaemonError::from_status(status, &body))
        }
    }

    async fn call_json(&self, method: Method, path: &str) -> Result<Value, DaemonError> {
        let body = self.call(method, path).await?;
        serde_json::from_slice(&body).map_err(|e| DaemonError::InvalidResponse(e.to_string()))
    }
}

async fn handshake<S>(stream: S) -> Result<SendRequest<Empty<Bytes>>, DaemonError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .map_err(|e| DaemonError::Transport(e.to_string()))?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::debug!(error = %e, "Docker connection closed with error");
        }
    });

    Ok(sender)
}

async fn read_body(body: Incoming) -> Result<Bytes, DaemonError> {
    body.collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| DaemonError::Transport(e.to_string()))
}

fn encode(id: &str) -> String {
    urlencoding::encode(id).into_owned()
}

#[async_trait]
impl DockerApi for DockerDaemon {
    async fn ping(&self) -> Result<(), DaemonError> {
        self.call(Method::GET, "/_ping").await.map(|_| ())
    }

    async fn list_containers(&self) -> Result<Value, DaemonError> {
        self.call_json(Method::GET, "/containers/json?all=true").await
    }

    async fn inspect_container(&self, id: &str) -> Result<Value, DaemonError> {
        self.call_json(Method::GET, &format!("/containers/{}/json", encode(id)))
            .await
    }

    async fn container_action(&self, id: &str, action: ContainerAction) -> Result<(), DaemonError> {
        let path = format!("/containers/{}/{}", encode(id), action.as_str());
        self.call(Method::POST, &path).await.map(|_| ())
    }

    async fn remove_container(&self, id: &str) -> Result<(), DaemonError> {
        let path = format!("/containers/{}?force=true", encode(id));
        self.call(Method::DELETE, &path).await.map(|_| ())
    }

    async fn list_images(&self) -> Result<Value, DaemonError> {
        self.call_json(Method::GET, "/images/json").await
    }

    async fn inspect_image(&self, id: &str) -> Result<Value, DaemonError> {
        self.call_json(Method::GET, &format!("/images/{}/json", encode(id)))
            .await
    }

    async fn remove_image(&self, id: &str) -> Result<(), DaemonError> {
        let path = format!("/images/{}?force=true", encode(id));
        self.call(Method::DELETE, &path).await.map(|_| ())
    }

    async fn container_logs(&self, id: &str, options: &LogOptions) -> Result<DaemonBody, DaemonError> {
        let path = format!("/containers/{}/logs?{}", encode(id), options.to_query());
        let response = self.send(Method::GET, &path).await?;
        let status = response.status();

        if !status.is_success() {
            let body = read_body(response.into_body()).await?;
            return Err(DaemonError::from_status(status, &body));
        }

        Ok(response
            .into_body()
            .into_data_stream()
            .map_err(|e| DaemonError::Transport(e.to_string()))
            .boxed())
    }
}
