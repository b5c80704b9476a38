//! Log domain types

use serde_json::json;

use crate::sse::SseFrame;

/// Text of the line sent when a followed stream ends naturally
pub const END_OF_STREAM_MARKER: &str = "[Log stream ended]";

/// One item of a container's line-oriented log sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogLine {
    /// A complete line of container output
    Text(String),
    /// The stream failed; nothing follows
    Error(String),
    /// The daemon closed the stream (container stopped or removed)
    EndOfStream,
}

impl LogLine {
    /// SSE frame for this line, as the agent publishes it
    pub fn to_sse(&self) -> SseFrame {
        match self {
            LogLine::Text(text) => SseFrame::json(json!({ "line": text })),
            LogLine::Error(message) => SseFrame::json(json!({ "error": message })),
            LogLine::EndOfStream => SseFrame::json(json!({ "line": END_OF_STREAM_MARKER })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_lines_encode_as_agent_events() {
        assert_eq!(
            LogLine::Text("hello \"quoted\"".to_string()).to_sse().encode(),
            Bytes::from("data: {\"line\":\"hello \\\"quoted\\\"\"}\n\n")
        );
        assert_eq!(
            LogLine::Error("boom".to_string()).to_sse().encode(),
            Bytes::from("data: {\"error\":\"boom\"}\n\n")
        );
        assert_eq!(
            LogLine::EndOfStream.to_sse().encode(),
            Bytes::from("data: {\"line\":\"[Log stream ended]\"}\n\n")
        );
    }
}
