//! Log stream source
//!
//! Bridges one daemon log request to the frame decoder. Batch calls read the
//! whole body; follow calls hand the body to a dedicated task that pushes
//! decoded lines into a bounded channel until the daemon ends the stream or
//! the session is cancelled.

use std::sync::Arc;

use dockps_core::domain::log::LogLine;
use dockps_core::frame::{FrameDecoder, FrameMode, decode_transcript};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::docker::{DaemonBody, DaemonError, DockerApi, LogOptions};

/// Reported when a stream ends having produced nothing but garbage
pub const NO_DECODABLE_FRAMES: &str = "log stream contained no decodable frames";

#[derive(Clone)]
pub struct LogSource {
    docker: Arc<dyn DockerApi>,
    channel_capacity: usize,
}

impl LogSource {
    pub fn new(docker: Arc<dyn DockerApi>, channel_capacity: usize) -> Self {
        Self {
            docker,
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// TTY containers write a raw byte stream instead of multiplexed frames
    pub async fn frame_mode(&self, container_id: &str) -> Result<FrameMode, DaemonError> {
        let inspect = self.docker.inspect_container(container_id).await?;
        let tty = inspect
            .pointer("/Config/Tty")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        Ok(if tty { FrameMode::Raw } else { FrameMode::Multiplexed })
    }

    /// One-shot fetch of the selected lines
    ///
    /// Trailing whitespace is trimmed and blank lines are dropped. Any error
    /// fails the whole call.
    pub async fn fetch_lines(&self, container_id: &str, options: LogOptions) -> Result<Vec<String>, DaemonError> {
        let mode = self.frame_mode(container_id).await?;
        let options = LogOptions {
            follow: false,
            ..options
        };
        let mut body = self.docker.container_logs(container_id, &options).await?;

        let mut decoder = FrameDecoder::new(mode);
        let mut lines = Vec::new();
        while let Some(chunk) = body.next().await {
            lines.extend(decoder.push(&chunk?));
        }
        lines.extend(decoder.finish());

        let stats = decoder.stats();
        if stats.lines_emitted == 0 && stats.discarded_bytes > 0 {
            return Err(DaemonError::InvalidResponse(NO_DECODABLE_FRAMES.to_string()));
        }

        Ok(lines
            .into_iter()
            .map(|line| line.text.trim_end().to_string())
            .filter(|text| !text.is_empty())
            .collect())
    }

    /// Every line the daemon still has, as one continuous transcript
    pub async fn fetch_transcript(&self, container_id: &str) -> Result<String, DaemonError> {
        let mode = self.frame_mode(container_id).await?;
        let options = LogOptions {
            tail: None,
            follow: false,
            since: None,
        };

        let mut body = self.docker.container_logs(container_id, &options).await?;
        let mut raw = Vec::new();
        while let Some(chunk) = body.next().await {
            raw.extend_from_slice(&chunk?);
        }

        Ok(decode_transcript(&raw, mode))
    }

    /// Start following a container's logs
    ///
    /// Errors before the daemon accepted the request are returned directly.
    /// Afterwards the receiver yields `Text` lines and ends with exactly one
    /// `EndOfStream` or `Error`, unless `cancel` fired first.
    pub async fn open_follow(
        &self,
        container_id: &str,
        options: LogOptions,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<LogLine>, DaemonError> {
        let mode = self.frame_mode(container_id).await?;
        let options = LogOptions {
            follow: true,
            ..options
        };
        let body = self.docker.container_logs(container_id, &options).await?;

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let pump = LogPump {
            container_id: container_id.to_string(),
            body,
            decoder: FrameDecoder::new(mode),
            tx,
            cancel,
        };
        tokio::spawn(pump.run());

        Ok(rx)
    }
}

// =============================================================================
// Follow task
// =============================================================================

struct LogPump {
    container_id: String,
    body: DaemonBody,
    decoder: FrameDecoder,
    tx: mpsc::Sender<LogLine>,
    cancel: CancellationToken,
}

impl LogPump {
    async fn run(mut self) {
        debug!(container_id = %self.container_id, "Following daemon log stream");

        loop {
            let chunk = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(container_id = %self.container_id, "Log follow cancelled");
                    return;
                }
                chunk = self.body.next() => chunk,
            };

            match chunk {
                Some(Ok(bytes)) => {
                    for line in self.decoder.push(&bytes) {
                        if !self.send(LogLine::Text(line.text)).await {
                            return;
                        }
                    }
                }
                Some(Err(e)) => {
                    warn!(container_id = %self.container_id, error = %e, "Daemon log stream failed");
                    self.send(LogLine::Error(e.to_string())).await;
                    return;
                }
                None => break,
            }
        }

        for line in self.decoder.finish() {
            if !self.send(LogLine::Text(line.text)).await {
                return;
            }
        }

        let stats = self.decoder.stats();
        let terminal = if stats.lines_emitted == 0 && stats.discarded_bytes > 0 {
            LogLine::Error(NO_DECODABLE_FRAMES.to_string())
        } else {
            LogLine::EndOfStream
        };

        info!(
            container_id = %self.container_id,
            frames = stats.frames_decoded,
            lines = stats.lines_emitted,
            discarded = stats.discarded_bytes,
            "Daemon log stream ended"
        );
        self.send(terminal).await;
    }

    /// Deliver one line; false once the consumer is gone or cancelled
    async fn send(&mut self, line: LogLine) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.tx.send(line) => sent.is_ok(),
        }
    }
}
