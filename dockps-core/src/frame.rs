//! Docker Log Frame Decoding
//!
//! The daemon's `/containers/{id}/logs` endpoint multiplexes stdout and stderr
//! into length-prefixed frames when the container runs without a TTY:
//!
//! ```text
//! [stream: u8][reserved: 3 bytes][length: u32 big-endian][payload: length bytes]
//! ```
//!
//! Containers with a TTY get a raw byte stream instead. Both shapes are handled
//! here, independent of any transport:
//! - [`FrameParser`] cuts complete frames out of an append-only buffer
//! - [`FrameDecoder`] turns frames into text lines (streaming UTF-8, line splitting)
//! - [`decode_transcript`] joins every payload into one continuous string

use bytes::{Buf, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

/// Size of a multiplexed frame header
pub const HEADER_LEN: usize = 8;

/// Upper bound for a single frame payload. Anything larger is treated as a
/// corrupt header; the daemon never emits frames anywhere near this size.
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Which standard stream a frame was written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Stdin,
    Stdout,
    Stderr,
}

impl StreamKind {
    /// Parse the stream type byte of a frame header
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(StreamKind::Stdin),
            1 => Some(StreamKind::Stdout),
            2 => Some(StreamKind::Stderr),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            StreamKind::Stdin => 0,
            StreamKind::Stdout => 1,
            StreamKind::Stderr => 2,
        }
    }
}

/// How the daemon framed the log stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameMode {
    /// stdout/stderr multiplexed into 8-byte-header frames (no TTY)
    #[default]
    Multiplexed,
    /// Raw terminal output (TTY), every byte is stdout payload
    Raw,
}

/// One decoded unit of the daemon's log stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFrame {
    pub stream: StreamKind,
    pub payload: Bytes,
}

impl LogFrame {
    pub fn new(stream: StreamKind, payload: impl Into<Bytes>) -> Self {
        Self {
            stream,
            payload: payload.into(),
        }
    }

    /// Encode the frame in the daemon's multiplexed wire format
    pub fn encode(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        out.extend_from_slice(&[self.stream.as_byte(), 0, 0, 0]);
        out.extend_from_slice(&(self.payload.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.payload);
        out.freeze()
    }
}

/// A complete text line produced by the decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedLine {
    /// Stream of the frame that completed the line
    pub stream: StreamKind,
    pub text: String,
}

/// Decoder diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub frames_decoded: u64,
    pub bytes_consumed: u64,
    pub discarded_bytes: u64,
    pub lines_emitted: u64,
}

// =============================================================================
// Frame Parser
// =============================================================================

/// Incremental frame extractor over an append-only buffer
///
/// Partial headers and partial payloads stay buffered until more bytes arrive.
/// A header that cannot be valid (unknown stream byte, non-zero reserved
/// bytes, absurd length) is skipped one byte at a time until the parser is
/// back in sync, so a corrupt region never swallows the frame after it.
#[derive(Debug)]
pub struct FrameParser {
    buf: BytesMut,
    mode: FrameMode,
    max_frame_len: usize,
    stats: DecodeStats,
}

impl FrameParser {
    pub fn new(mode: FrameMode) -> Self {
        Self::with_max_frame_len(mode, DEFAULT_MAX_FRAME_LEN)
    }

    pub fn with_max_frame_len(mode: FrameMode, max_frame_len: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            mode,
            max_frame_len,
            stats: DecodeStats::default(),
        }
    }

    /// Append bytes received from the daemon
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Bytes received but not yet consumed as part of a frame
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn stats(&self) -> DecodeStats {
        self.stats
    }

    /// Cut the next complete frame out of the buffer, if there is one
    pub fn next_frame(&mut self) -> Option<LogFrame> {
        match self.mode {
            FrameMode::Raw => {
                if self.buf.is_empty() {
                    return None;
                }
                let payload = self.buf.split().freeze();
                self.stats.frames_decoded += 1;
                self.stats.bytes_consumed += payload.len() as u64;
                Some(LogFrame::new(StreamKind::Stdout, payload))
            }
            FrameMode::Multiplexed => self.next_multiplexed(),
        }
    }

    fn next_multiplexed(&mut self) -> Option<LogFrame> {
        let mut skipped = 0u64;

        let frame = loop {
            if self.buf.len() < HEADER_LEN {
                break None;
            }

            let header = &self.buf[..HEADER_LEN];
            let stream = StreamKind::from_byte(header[0]);
            let reserved_clear = header[1..4].iter().all(|b| *b == 0);
            let len = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;

            let stream = match stream {
                Some(stream) if reserved_clear && len <= self.max_frame_len => stream,
                _ => {
                    self.buf.advance(1);
                    skipped += 1;
                    continue;
                }
            };

            if len == 0 {
                self.buf.advance(HEADER_LEN);
                self.stats.bytes_consumed += HEADER_LEN as u64;
                continue;
            }

            if self.buf.len() < HEADER_LEN + len {
                break None;
            }

            self.buf.advance(HEADER_LEN);
            let payload = self.buf.split_to(len).freeze();
            self.stats.frames_decoded += 1;
            self.stats.bytes_consumed += (HEADER_LEN + len) as u64;
            break Some(LogFrame::new(stream, payload));
        };

        if skipped > 0 {
            self.stats.discarded_bytes += skipped;
            tracing::debug!(skipped, "Skipped malformed frame header bytes");
        }

        frame
    }

    /// Drop whatever is left in the buffer at end of stream
    ///
    /// Returns the number of bytes discarded (a truncated trailing frame).
    pub fn finish(&mut self) -> usize {
        let leftover = self.buf.len();
        if leftover > 0 {
            tracing::debug!(leftover, "Discarding truncated trailing frame");
            self.stats.discarded_bytes += leftover as u64;
            self.buf.clear();
        }
        leftover
    }
}

// =============================================================================
// Streaming UTF-8
// =============================================================================

/// UTF-8 decoder that carries incomplete multi-byte sequences across calls
#[derive(Debug, Default)]
pub struct Utf8Stream {
    pending: Vec<u8>,
}

impl Utf8Stream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much as possible, holding back a trailing incomplete sequence
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let input = if self.pending.is_empty() {
            std::borrow::Cow::Borrowed(bytes)
        } else {
            let mut joined = std::mem::take(&mut self.pending);
            joined.extend_from_slice(bytes);
            std::borrow::Cow::Owned(joined)
        };

        let mut out = String::with_capacity(input.len());
        let mut rest: &[u8] = &input;

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, tail) = rest.split_at(err.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));

                    match err.error_len() {
                        Some(invalid) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &tail[invalid..];
                        }
                        None => {
                            self.pending = tail.to_vec();
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Flush an incomplete trailing sequence as a replacement character
    pub fn finish(&mut self) -> Option<char> {
        if self.pending.is_empty() {
            None
        } else {
            self.pending.clear();
            Some(char::REPLACEMENT_CHARACTER)
        }
    }
}

// =============================================================================
// Line Decoder
// =============================================================================

/// Incremental decoder from raw daemon bytes to complete text lines
///
/// Each session owns its own decoder; nothing here is shared.
#[derive(Debug)]
pub struct FrameDecoder {
    parser: FrameParser,
    utf8: Utf8Stream,
    partial: String,
    partial_stream: StreamKind,
    finished: bool,
}

impl FrameDecoder {
    pub fn new(mode: FrameMode) -> Self {
        Self::from_parser(FrameParser::new(mode))
    }

    pub fn from_parser(parser: FrameParser) -> Self {
        Self {
            parser,
            utf8: Utf8Stream::new(),
            partial: String::new(),
            partial_stream: StreamKind::Stdout,
            finished: false,
        }
    }

    pub fn stats(&self) -> DecodeStats {
        self.parser.stats()
    }

    /// Feed a chunk of daemon bytes, returning every line it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<DecodedLine> {
        self.parser.push(chunk);

        let mut lines = Vec::new();
        while let Some(frame) = self.parser.next_frame() {
            let text = self.utf8.decode(&frame.payload);
            self.split_lines(&text, frame.stream, &mut lines);
        }

        self.parser.stats.lines_emitted += lines.len() as u64;
        lines
    }

    /// End of stream: emit the retained partial line, if any
    ///
    /// Safe to call more than once; only the first call can produce output.
    pub fn finish(&mut self) -> Vec<DecodedLine> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        self.parser.finish();
        if let Some(replacement) = self.utf8.finish() {
            self.partial.push(replacement);
        }

        let mut lines = Vec::new();
        if !self.partial.is_empty() {
            let mut text = std::mem::take(&mut self.partial);
            if text.ends_with('\r') {
                text.pop();
            }
            lines.push(DecodedLine {
                stream: self.partial_stream,
                text,
            });
        }

        self.parser.stats.lines_emitted += lines.len() as u64;
        lines
    }

    fn split_lines(&mut self, text: &str, stream: StreamKind, lines: &mut Vec<DecodedLine>) {
        if text.is_empty() {
            return;
        }

        self.partial.push_str(text);
        self.partial_stream = stream;

        let Some(last_newline) = self.partial.rfind('\n') else {
            return;
        };

        let rest = self.partial.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.partial, rest);

        for line in complete[..last_newline].split('\n') {
            lines.push(DecodedLine {
                stream,
                text: line.strip_suffix('\r').unwrap_or(line).to_string(),
            });
        }
    }
}

/// Decode a complete buffer into lines (push + finish)
pub fn decode_lines(bytes: &[u8], mode: FrameMode) -> Vec<DecodedLine> {
    let mut decoder = FrameDecoder::new(mode);
    let mut lines = decoder.push(bytes);
    lines.extend(decoder.finish());
    lines
}

/// Decode a complete buffer into one continuous transcript
///
/// No line splitting happens here: payload text is concatenated exactly in
/// frame order, which is what the download endpoints serve.
pub fn decode_transcript(bytes: &[u8], mode: FrameMode) -> String {
    let mut parser = FrameParser::new(mode);
    let mut utf8 = Utf8Stream::new();
    let mut transcript = String::with_capacity(bytes.len());

    parser.push(bytes);
    while let Some(frame) = parser.next_frame() {
        transcript.push_str(&utf8.decode(&frame.payload));
    }
    parser.finish();
    if let Some(replacement) = utf8.finish() {
        transcript.push(replacement);
    }

    transcript
}
