//! Relay
//!
//! The one re-streaming component used by both hops of the log pipeline
//! (agent → gateway and gateway → browser). A relay session owns:
//! - a source stream of already-framed SSE events
//! - a bounded channel drained by the HTTP response body
//! - a cancellation token shared with everything upstream of it
//!
//! Keep-alive pings, terminal events and cancellation behave identically on
//! both hops; only the terminal framing differs (see [`RelayHop`]).

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde_json::json;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::log::END_OF_STREAM_MARKER;
use crate::sse::SseFrame;

/// Relay errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RelayError {
    /// The source failed mid-stream
    #[error("upstream error: {0}")]
    Upstream(String),

    /// A session was asked to move to a state it cannot reach
    #[error("invalid relay transition from {from:?} to {to:?}")]
    InvalidTransition { from: RelayState, to: RelayState },
}

// =============================================================================
// Session State Machine
// =============================================================================

/// Lifecycle of one relay session
///
/// ```text
/// Idle → AwaitingUpstream → Streaming → Completed
///                 │              ├────→ Aborted
///                 ├──────────────┴────→ Errored
///                 └───────────────────→ Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RelayState {
    Idle = 0,
    AwaitingUpstream = 1,
    Streaming = 2,
    Completed = 3,
    Aborted = 4,
    Errored = 5,
}

impl RelayState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RelayState::Idle,
            1 => RelayState::AwaitingUpstream,
            2 => RelayState::Streaming,
            3 => RelayState::Completed,
            4 => RelayState::Aborted,
            _ => RelayState::Errored,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RelayState::Completed | RelayState::Aborted | RelayState::Errored
        )
    }

    pub fn can_transition_to(self, next: RelayState) -> bool {
        use RelayState::*;

        matches!(
            (self, next),
            (Idle, AwaitingUpstream)
                | (AwaitingUpstream, Streaming)
                | (AwaitingUpstream, Aborted)
                | (AwaitingUpstream, Errored)
                | (Streaming, Completed)
                | (Streaming, Aborted)
                | (Streaming, Errored)
        )
    }
}

/// What a session is streaming
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Remote host, when the session runs on the gateway
    pub host_uuid: Option<Uuid>,
    pub container_id: String,
    pub tail: Option<u32>,
    pub follow: bool,
}

/// Per-request relay state
///
/// Owned by the task chain that serves one log request; never shared across
/// requests. Dropping a session that has not reached a terminal state marks it
/// aborted and cancels its token.
#[derive(Debug)]
pub struct StreamSession {
    id: Uuid,
    info: SessionInfo,
    cancel: CancellationToken,
    state: AtomicU8,
    bytes_sent: AtomicU64,
    events_sent: AtomicU64,
}

impl StreamSession {
    pub fn new(info: SessionInfo) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            info,
            cancel: CancellationToken::new(),
            state: AtomicU8::new(RelayState::Idle as u8),
            bytes_sent: AtomicU64::new(0),
            events_sent: AtomicU64::new(0),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    /// Token observed by every hop of this session
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn state(&self) -> RelayState {
        RelayState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move to `next`, rejecting transitions the state machine does not allow
    pub fn transition(&self, next: RelayState) -> Result<(), RelayError> {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let from = RelayState::from_u8(current);
            if !from.can_transition_to(next) {
                return Err(RelayError::InvalidTransition { from, to: next });
            }

            match self.state.compare_exchange(
                current,
                next as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    debug!(session_id = %self.id, ?from, to = ?next, "Relay session transition");
                    return Ok(());
                }
                Err(actual) => current = actual,
            }
        }
    }

    fn record(&self, bytes: usize) {
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
        self.events_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    pub fn events_sent(&self) -> u64 {
        self.events_sent.load(Ordering::Relaxed)
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        let state = self.state();
        if !state.is_terminal() && state != RelayState::Idle {
            debug!(session_id = %self.id, ?state, "Relay session dropped before finishing");
            self.state
                .store(RelayState::Aborted as u8, Ordering::Release);
        }
        self.cancel.cancel();
    }
}

// =============================================================================
// Relay Configuration
// =============================================================================

/// Timing and buffering knobs shared by both hops
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Silence after which keep-alive pings start
    pub keepalive_idle: Duration,

    /// Ping cadence while the stream stays idle
    pub keepalive_interval: Duration,

    /// How long the response body may go unpolled before the session is torn down
    pub attach_timeout: Duration,

    /// Capacity of the bounded channel between relay task and response body
    pub channel_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            keepalive_idle: Duration::from_secs(15),
            keepalive_interval: Duration::from_secs(5),
            attach_timeout: Duration::from_secs(30),
            channel_capacity: 256,
        }
    }
}

/// Which side of the pipeline a relay serves; decides the terminal events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayHop {
    /// Agent → gateway: plain `data:` events
    Agent,
    /// Gateway → browser: named `close` / `error` events
    Gateway,
}

impl RelayHop {
    pub fn completion_frame(self) -> SseFrame {
        match self {
            RelayHop::Agent => SseFrame::json(json!({ "line": END_OF_STREAM_MARKER })),
            RelayHop::Gateway => SseFrame::named("close", json!({ "status": "stream_ended" })),
        }
    }

    pub fn error_frame(self, message: &str) -> SseFrame {
        match self {
            RelayHop::Agent => SseFrame::json(json!({ "error": message })),
            RelayHop::Gateway => SseFrame::named("error", json!({ "error": "Stream error" })),
        }
    }
}

// =============================================================================
// Relay Task
// =============================================================================

/// Start relaying `source` for `session`
///
/// The session must already be in `AwaitingUpstream` (the caller opened the
/// upstream connection). The returned stream is meant to become the HTTP
/// response body; dropping it cancels the session.
pub fn spawn_relay<S>(
    session: Arc<StreamSession>,
    hop: RelayHop,
    source: S,
    config: &RelayConfig,
) -> RelayStream
where
    S: Stream<Item = Result<Bytes, RelayError>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    let (attached_tx, attached_rx) = oneshot::channel();

    tokio::spawn(run_relay(
        Arc::clone(&session),
        hop,
        source,
        tx,
        attached_rx,
        config.clone(),
    ));

    RelayStream {
        rx,
        attached: Some(attached_tx),
        session,
    }
}

async fn run_relay<S>(
    session: Arc<StreamSession>,
    hop: RelayHop,
    source: S,
    tx: mpsc::Sender<Bytes>,
    attached: oneshot::Receiver<()>,
    config: RelayConfig,
) where
    S: Stream<Item = Result<Bytes, RelayError>> + Send + 'static,
{
    let cancel = session.cancel_token().clone();
    let mut source = Box::pin(source);

    let attached = tokio::select! {
        _ = cancel.cancelled() => false,
        result = tokio::time::timeout(config.attach_timeout, attached) => match result {
            Ok(Ok(())) => true,
            Ok(Err(_)) => false,
            Err(_) => {
                warn!(
                    session_id = %session.id(),
                    timeout = ?config.attach_timeout,
                    "Downstream never attached, releasing upstream"
                );
                false
            }
        },
    };

    if !attached {
        drop(source);
        finish(&session, RelayState::Aborted);
        return;
    }

    if let Err(e) = session.transition(RelayState::Streaming) {
        warn!(session_id = %session.id(), "{}", e);
        drop(source);
        finish(&session, RelayState::Aborted);
        return;
    }

    // Armed for `keepalive_idle` after each delivered event, then re-armed
    // for `keepalive_interval` after each ping.
    let keepalive = tokio::time::sleep(config.keepalive_idle);
    tokio::pin!(keepalive);

    let outcome = loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break RelayState::Aborted,

            item = source.next() => match item {
                Some(Ok(chunk)) => {
                    let len = chunk.len();
                    if !deliver(&tx, &cancel, chunk).await {
                        break RelayState::Aborted;
                    }
                    session.record(len);
                    keepalive.as_mut().reset(Instant::now() + config.keepalive_idle);
                }
                Some(Err(e)) => {
                    warn!(session_id = %session.id(), "Relay source failed: {}", e);
                    let message = match &e {
                        RelayError::Upstream(msg) => msg.as_str(),
                        RelayError::InvalidTransition { .. } => "relay error",
                    };
                    deliver(&tx, &cancel, hop.error_frame(message).encode()).await;
                    break RelayState::Errored;
                }
                None => {
                    deliver(&tx, &cancel, hop.completion_frame().encode()).await;
                    break RelayState::Completed;
                }
            },

            _ = &mut keepalive => {
                if !deliver(&tx, &cancel, SseFrame::ping().encode()).await {
                    break RelayState::Aborted;
                }
                keepalive.as_mut().reset(Instant::now() + config.keepalive_interval);
            }
        }
    };

    drop(source);
    finish(&session, outcome);
}

/// Push one chunk downstream, giving up if the session is cancelled or the
/// consumer is gone
async fn deliver(tx: &mpsc::Sender<Bytes>, cancel: &CancellationToken, chunk: Bytes) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        result = tx.send(chunk) => result.is_ok(),
    }
}

fn finish(session: &StreamSession, outcome: RelayState) {
    if let Err(e) = session.transition(outcome) {
        debug!(session_id = %session.id(), "{}", e);
    }
    session.cancel_token().cancel();

    let info = session.info();
    info!(
        session_id = %session.id(),
        host_uuid = ?info.host_uuid,
        container_id = %info.container_id,
        tail = ?info.tail,
        follow = info.follow,
        state = ?session.state(),
        events = session.events_sent(),
        bytes = session.bytes_sent(),
        "Relay session closed"
    );
}

// =============================================================================
// Response Body Stream
// =============================================================================

/// Downstream end of a relay session
///
/// Yields encoded SSE events. The first poll marks the consumer as attached;
/// dropping the stream (client disconnect) cancels the whole session.
pub struct RelayStream {
    rx: mpsc::Receiver<Bytes>,
    attached: Option<oneshot::Sender<()>>,
    session: Arc<StreamSession>,
}

impl RelayStream {
    pub fn session(&self) -> &Arc<StreamSession> {
        &self.session
    }
}

impl Stream for RelayStream {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(attached) = self.attached.take() {
            let _ = attached.send(());
        }
        self.rx.poll_recv(cx).map(|chunk| chunk.map(Ok))
    }
}

impl Drop for RelayStream {
    fn drop(&mut self) {
        if !self.session.state().is_terminal() {
            debug!(session_id = %self.session.id(), "Downstream disconnected");
        }
        self.session.cancel_token().cancel();
    }
}
