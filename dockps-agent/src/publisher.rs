//! SSE publisher
//!
//! Turns a follow session of the log source into an SSE byte stream through
//! the shared relay, which adds keep-alive pings and the terminal event.

use std::sync::Arc;

use dockps_core::domain::log::LogLine;
use dockps_core::relay::{
    RelayConfig, RelayError, RelayHop, RelayState, RelayStream, SessionInfo, StreamSession, spawn_relay,
};
use futures::{StreamExt, future};
use tokio_stream::wrappers::ReceiverStream;

use crate::docker::{DaemonError, LogOptions};
use crate::source::LogSource;

#[derive(Clone)]
pub struct LogPublisher {
    source: LogSource,
    relay: RelayConfig,
}

impl LogPublisher {
    pub fn new(source: LogSource, relay: RelayConfig) -> Self {
        Self { source, relay }
    }

    /// Open a follow session for `container_id`
    ///
    /// Daemon failures before the first byte are returned as errors so the
    /// caller can answer with a proper status instead of an event stream.
    pub async fn follow(&self, container_id: &str, options: LogOptions) -> Result<RelayStream, DaemonError> {
        let session = StreamSession::new(SessionInfo {
            host_uuid: None,
            container_id: container_id.to_string(),
            tail: options.tail,
            follow: true,
        });
        transition(&session, RelayState::AwaitingUpstream);

        let lines = match self
            .source
            .open_follow(container_id, options, session.cancel_token().clone())
            .await
        {
            Ok(lines) => lines,
            Err(e) => {
                transition(&session, RelayState::Errored);
                return Err(e);
            }
        };

        tracing::info!(
            session_id = %session.id(),
            container_id,
            tail = ?options.tail,
            since = ?options.since,
            "Log stream opened"
        );

        let events = ReceiverStream::new(lines)
            .take_while(|line| future::ready(*line != LogLine::EndOfStream))
            .map(|line| match line {
                LogLine::Error(message) => Err(RelayError::Upstream(message)),
                other => Ok(other.to_sse().encode()),
            });

        Ok(spawn_relay(session, RelayHop::Agent, events, &self.relay))
    }
}

fn transition(session: &Arc<StreamSession>, next: RelayState) {
    if let Err(e) = session.transition(next) {
        tracing::warn!(session_id = %session.id(), "{}", e);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;
    use dockps_core::frame::{LogFrame, StreamKind};
    use futures::Stream;

    use super::*;
    use crate::test_support::{DropCounter, MockDocker};

    fn frame(text: &str) -> Vec<u8> {
        LogFrame::new(StreamKind::Stdout, text.as_bytes().to_vec())
            .encode()
            .to_vec()
    }

    fn publisher(docker: MockDocker) -> LogPublisher {
        LogPublisher::new(LogSource::new(Arc::new(docker), 8), RelayConfig::default())
    }

    async fn collect<S>(mut stream: S) -> String
    where
        S: Stream<Item = Result<Bytes, std::convert::Infallible>> + Unpin,
    {
        let mut body = Vec::new();
        while let Some(Ok(chunk)) = stream.next().await {
            body.extend_from_slice(&chunk);
        }
        String::from_utf8(body).unwrap()
    }

    #[tokio::test]
    async fn test_follow_publishes_lines_then_end_marker() {
        let docker = MockDocker::new().with_logs("web", vec![frame("hello\n"), frame("world\n")]);

        let stream = publisher(docker)
            .follow("web", LogOptions::default())
            .await
            .unwrap();
        let session = Arc::clone(stream.session());

        assert_eq!(
            collect(stream).await,
            "data: {\"line\":\"hello\"}\n\n\
             data: {\"line\":\"world\"}\n\n\
             data: {\"line\":\"[Log stream ended]\"}\n\n"
        );
        assert_eq!(session.state(), RelayState::Completed);
    }

    #[tokio::test]
    async fn test_follow_publishes_error_event() {
        let docker = MockDocker::new()
            .with_logs("web", vec![frame("a\n")])
            .failing_after_chunks("web");

        let stream = publisher(docker)
            .follow("web", LogOptions::default())
            .await
            .unwrap();

        let body = collect(stream).await;
        assert!(body.starts_with("data: {\"line\":\"a\"}\n\n"));
        assert!(body.ends_with("data: {\"error\":\"Docker connection failed: connection reset by peer\"}\n\n"));
    }

    #[tokio::test]
    async fn test_follow_unknown_container_is_an_error() {
        let result = publisher(MockDocker::new())
            .follow("ghost", LogOptions::default())
            .await;
        assert!(matches!(result, Err(DaemonError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_dropping_body_releases_daemon_connection() {
        let drops = DropCounter::default();
        let docker = MockDocker::new()
            .with_logs("web", vec![frame("first\n")])
            .endless("web", drops.clone());

        let mut stream = publisher(docker)
            .follow("web", LogOptions::default())
            .await
            .unwrap();
        let session = Arc::clone(stream.session());

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first, Bytes::from("data: {\"line\":\"first\"}\n\n"));

        drop(stream);
        for _ in 0..100 {
            if drops.count() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(drops.count(), 1);
        assert!(session.cancel_token().is_cancelled());
    }
}
