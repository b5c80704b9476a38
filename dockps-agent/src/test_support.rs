//! In-memory Docker daemon for tests

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use dockps_core::dto::container::ContainerAction;
use futures::{Stream, StreamExt, stream};
use serde_json::{Value, json};

use crate::docker::{DaemonBody, DaemonError, DockerApi, LogOptions};

/// Counts how many times a daemon body was dropped
#[derive(Debug, Clone, Default)]
pub struct DropCounter(Arc<AtomicUsize>);

impl DropCounter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

struct DropGuard(DropCounter);

impl Drop for DropGuard {
    fn drop(&mut self) {
        self.0.0.fetch_add(1, Ordering::SeqCst);
    }
}

struct GuardedBody {
    inner: DaemonBody,
    _guard: DropGuard,
}

impl Stream for GuardedBody {
    type Item = Result<Bytes, DaemonError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

#[derive(Clone, Default)]
enum BodyEnd {
    #[default]
    Close,
    Fail,
    Hang(DropCounter),
}

#[derive(Clone, Default)]
struct MockContainer {
    tty: bool,
    chunks: Vec<Vec<u8>>,
    end: BodyEnd,
}

#[derive(Default)]
pub struct MockDocker {
    containers: HashMap<String, MockContainer>,
    images: Vec<String>,
    log_requests: Mutex<Vec<LogOptions>>,
    actions: Mutex<Vec<(String, ContainerAction)>>,
    removed: Mutex<Vec<String>>,
}

impl MockDocker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_logs(mut self, id: &str, chunks: Vec<Vec<u8>>) -> Self {
        self.containers.entry(id.to_string()).or_default().chunks = chunks;
        self
    }

    pub fn with_tty(mut self, id: &str, tty: bool) -> Self {
        self.containers.entry(id.to_string()).or_default().tty = tty;
        self
    }

    /// The body errors once its chunks are exhausted
    pub fn failing_after_chunks(mut self, id: &str) -> Self {
        self.containers.entry(id.to_string()).or_default().end = BodyEnd::Fail;
        self
    }

    /// The body never ends; `drops` records when it is released
    pub fn endless(mut self, id: &str, drops: DropCounter) -> Self {
        self.containers.entry(id.to_string()).or_default().end = BodyEnd::Hang(drops);
        self
    }

    pub fn with_image(mut self, id: &str) -> Self {
        self.images.push(id.to_string());
        self
    }

    pub fn log_requests(&self) -> Vec<LogOptions> {
        self.log_requests.lock().unwrap().clone()
    }

    pub fn actions(&self) -> Vec<(String, ContainerAction)> {
        self.actions.lock().unwrap().clone()
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }

    fn container(&self, id: &str) -> Result<&MockContainer, DaemonError> {
        self.containers
            .get(id)
            .ok_or_else(|| DaemonError::NotFound(format!("No such container: {id}")))
    }

    fn image(&self, id: &str) -> Result<(), DaemonError> {
        if self.images.iter().any(|image| image == id) {
            Ok(())
        } else {
            Err(DaemonError::NotFound(format!("No such image: {id}")))
        }
    }
}

#[async_trait]
impl DockerApi for MockDocker {
    async fn ping(&self) -> Result<(), DaemonError> {
        Ok(())
    }

    async fn list_containers(&self) -> Result<Value, DaemonError> {
        let mut ids: Vec<_> = self.containers.keys().cloned().collect();
        ids.sort();
        Ok(Value::Array(ids.into_iter().map(|id| json!({ "Id": id })).collect()))
    }

    async fn inspect_container(&self, id: &str) -> Result<Value, DaemonError> {
        let container = self.container(id)?;
        let running = !self
            .actions()
            .iter()
            .rev()
            .find(|(target, _)| target == id)
            .is_some_and(|(_, action)| *action == ContainerAction::Stop);

        Ok(json!({
            "Id": id,
            "Config": { "Tty": container.tty },
            "State": { "Running": running },
        }))
    }

    async fn container_action(&self, id: &str, action: ContainerAction) -> Result<(), DaemonError> {
        self.container(id)?;
        self.actions.lock().unwrap().push((id.to_string(), action));
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<(), DaemonError> {
        self.container(id)?;
        self.removed.lock().unwrap().push(id.to_string());
        Ok(())
    }

    async fn list_images(&self) -> Result<Value, DaemonError> {
        Ok(Value::Array(self.images.iter().map(|id| json!({ "Id": id })).collect()))
    }

    async fn inspect_image(&self, id: &str) -> Result<Value, DaemonError> {
        self.image(id)?;
        Ok(json!({ "Id": id }))
    }

    async fn remove_image(&self, id: &str) -> Result<(), DaemonError> {
        self.image(id)?;
        self.removed.lock().unwrap().push(id.to_string());
        Ok(())
    }

    async fn container_logs(&self, id: &str, options: &LogOptions) -> Result<DaemonBody, DaemonError> {
        let container = self.container(id)?.clone();
        self.log_requests.lock().unwrap().push(*options);

        let chunks = stream::iter(
            container
                .chunks
                .into_iter()
                .map(|chunk| Ok::<_, DaemonError>(Bytes::from(chunk))),
        );

        Ok(match container.end {
            BodyEnd::Close => chunks.boxed(),
            BodyEnd::Fail => chunks
                .chain(stream::once(async {
                    Err(DaemonError::Transport("connection reset by peer".to_string()))
                }))
                .boxed(),
            BodyEnd::Hang(drops) => GuardedBody {
                inner: chunks.chain(stream::pending()).boxed(),
                _guard: DropGuard(drops),
            }
            .boxed(),
        })
    }
}
