//! Gateway relay
//!
//! Re-publishes an agent's SSE stream to the browser. Upstream bytes are
//! re-chunked on event boundaries before they reach the shared relay, so
//! the gateway's own pings never land inside a partial upstream event.

use std::sync::Arc;

use dockps_client::{AgentClient, ClientError};
use dockps_core::dto::log::LogQuery;
use dockps_core::relay::{
    RelayConfig, RelayHop, RelayState, RelayStream, SessionInfo, StreamSession, spawn_relay,
};
use dockps_core::sse::split_events;
use uuid::Uuid;

/// Open the agent's follow stream and relay it
///
/// Failures before the upstream answered (unreachable agent, error status)
/// are returned so the handler can reply with an HTTP error.
pub async fn follow_logs(
    client: &AgentClient,
    host_uuid: Uuid,
    container_id: &str,
    query: &LogQuery,
    config: &RelayConfig,
) -> Result<RelayStream, ClientError> {
    let session = StreamSession::new(SessionInfo {
        host_uuid: Some(host_uuid),
        container_id: container_id.to_string(),
        tail: query.tail,
        follow: true,
    });
    transition(&session, RelayState::AwaitingUpstream);

    let upstream = match client.open_log_stream(container_id, query).await {
        Ok(upstream) => upstream,
        Err(e) => {
            transition(&session, RelayState::Errored);
            tracing::warn!(session_id = %session.id(), %host_uuid, container_id, "Agent refused log stream: {}", e);
            return Err(e);
        }
    };

    tracing::info!(
        session_id = %session.id(),
        %host_uuid,
        container_id,
        tail = ?query.tail,
        "Relaying agent log stream"
    );

    Ok(spawn_relay(
        session,
        RelayHop::Gateway,
        split_events(upstream),
        config,
    ))
}

fn transition(session: &Arc<StreamSession>, next: RelayState) {
    if let Err(e) = session.transition(next) {
        tracing::warn!(session_id = %session.id(), "{}", e);
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use futures::StreamExt;

    use super::*;
    use crate::test_support::{FakeAgent, collect_stream};

    #[tokio::test]
    async fn test_relays_events_then_close() {
        let agent = FakeAgent::start().await;
        let client = AgentClient::new(agent.url(), FakeAgent::KEY);

        let stream = follow_logs(
            &client,
            Uuid::new_v4(),
            "web",
            &LogQuery::default(),
            &RelayConfig::default(),
        )
        .await
        .unwrap();
        let session = Arc::clone(stream.session());

        assert_eq!(
            collect_stream(stream).await,
            "data: {\"line\":\"hello\"}\n\n\
             data: {\"line\":\"world\"}\n\n\
             data: {\"line\":\"[Log stream ended]\"}\n\n\
             event: close\ndata: {\"status\":\"stream_ended\"}\n\n"
        );
        assert_eq!(session.state(), RelayState::Completed);
    }

    #[tokio::test]
    async fn test_upstream_failure_before_streaming() {
        let agent = FakeAgent::start().await;
        let client = AgentClient::new(agent.url(), FakeAgent::KEY);

        let err = match follow_logs(
            &client,
            Uuid::new_v4(),
            "missing",
            &LogQuery::default(),
            &RelayConfig::default(),
        )
        .await
        {
            Ok(_) => panic!("expected an error"),
            Err(err) => err,
        };
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_upstream_reset_ends_with_error_event() {
        let agent = FakeAgent::start().await;
        let client = AgentClient::new(agent.url(), FakeAgent::KEY);

        let mut stream = follow_logs(
            &client,
            Uuid::new_v4(),
            "broken",
            &LogQuery::default(),
            &RelayConfig::default(),
        )
        .await
        .unwrap();

        let mut events = Vec::new();
        while let Some(Ok(chunk)) = stream.next().await {
            events.push(chunk);
        }

        assert_eq!(events.first(), Some(&Bytes::from("data: {\"line\":\"partial\"}\n\n")));
        assert_eq!(
            events.last(),
            Some(&Bytes::from("event: error\ndata: {\"error\":\"Stream error\"}\n\n"))
        );
    }
}
