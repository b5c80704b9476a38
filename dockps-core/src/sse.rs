//! Server-Sent-Events framing
//!
//! Both relay hops speak the same minimal subset of SSE: `data:` events
//! carrying one JSON object, `: ping` comments for keep-alive, and (gateway
//! only) named `event:` terminal messages.

use std::fmt::Display;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, stream};

use crate::relay::RelayError;

/// Response headers every SSE endpoint sends
///
/// `no-transform` and `X-Accel-Buffering` keep compressing/buffering reverse
/// proxies from holding events back.
pub const RESPONSE_HEADERS: [(&str, &str); 4] = [
    ("content-type", "text/event-stream"),
    ("cache-control", "no-cache, no-transform"),
    ("x-accel-buffering", "no"),
    ("x-content-type-options", "nosniff"),
];

/// A single SSE message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseFrame {
    /// `data: <payload>`
    Data(String),
    /// `event: <name>` followed by `data: <payload>`
    Event { name: String, data: String },
    /// `: <text>`
    Comment(String),
}

impl SseFrame {
    /// Data event carrying a JSON value
    pub fn json(value: serde_json::Value) -> Self {
        SseFrame::Data(value.to_string())
    }

    /// Named event carrying a JSON value
    pub fn named(name: impl Into<String>, value: serde_json::Value) -> Self {
        SseFrame::Event {
            name: name.into(),
            data: value.to_string(),
        }
    }

    pub fn ping() -> Self {
        SseFrame::Comment("ping".to_string())
    }

    /// Wire encoding, terminated by the blank line that ends an event
    pub fn encode(&self) -> Bytes {
        let mut out = String::new();
        match self {
            SseFrame::Data(data) => push_data(&mut out, data),
            SseFrame::Event { name, data } => {
                out.push_str("event: ");
                out.push_str(name);
                out.push('\n');
                push_data(&mut out, data);
            }
            SseFrame::Comment(text) => {
                out.push_str(": ");
                out.push_str(text);
                out.push('\n');
            }
        }
        out.push('\n');
        Bytes::from(out)
    }
}

// Multi-line payloads become one `data:` field per line.
fn push_data(out: &mut String, data: &str) {
    for line in data.split('\n') {
        out.push_str("data: ");
        out.push_str(line);
        out.push('\n');
    }
}

/// Re-chunks an SSE byte stream on event boundaries
///
/// Upstream chunk boundaries are arbitrary; a relay that injects its own
/// pings must only do so between complete events.
#[derive(Debug, Default)]
pub struct SseEventSplitter {
    buf: BytesMut,
    scanned: usize,
}

impl SseEventSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes, returning every event they completed (verbatim, including
    /// the terminating blank line)
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Bytes> {
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        loop {
            // Back up one byte so a "\n\n" straddling two chunks is found.
            let start = self.scanned.saturating_sub(1);
            match self.buf[start..].windows(2).position(|w| w == b"\n\n") {
                Some(pos) => {
                    let end = start + pos + 2;
                    events.push(self.buf.split_to(end).freeze());
                    self.scanned = 0;
                }
                None => {
                    self.scanned = self.buf.len();
                    break;
                }
            }
        }
        events
    }

    /// Bytes of an incomplete trailing event
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

/// Turn an upstream SSE byte stream into a stream of complete events
///
/// An incomplete event left when the upstream ends is dropped; SSE consumers
/// discard unterminated events anyway.
pub fn split_events<S, B, E>(upstream: S) -> impl Stream<Item = Result<Bytes, RelayError>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut splitter = SseEventSplitter::new();

    upstream
        .map(move |chunk| match chunk {
            Ok(bytes) => splitter
                .push(bytes.as_ref())
                .into_iter()
                .map(Ok)
                .collect::<Vec<_>>(),
            Err(err) => vec![Err(RelayError::Upstream(err.to_string()))],
        })
        .flat_map(stream::iter)
}
