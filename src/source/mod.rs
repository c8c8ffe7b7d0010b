//! Sample source abstraction for telemetry ingestion.
//!
//! Provides a unified trait for reading signal samples from different
//! sources: the PLC gateway feed (TCP), stdin (JSON lines, for harness
//! runs), and pre-loaded replay (files and tests).
//!
//! Sources expose bare connect/read primitives and report failures as
//! [`SourceError`]; the reconnect/backoff state machine lives in the
//! pipeline loop, not here, so its transitions stay testable without
//! network mocking.

pub mod gateway;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::SignalSample;

pub use gateway::GatewaySource;

/// Connectivity-class failure. Never fatal by itself — the pipeline loop
/// retries these with backoff indefinitely.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("timeout waiting for data")]
    Timeout,

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("not connected")]
    NotConnected,
}

/// Events produced by a sample source.
pub enum SampleEvent {
    /// A valid sample was read.
    Sample(SignalSample),
    /// Source reached end of data (EOF for stdin/replay; the gateway feed
    /// never emits this — closed connections surface as errors and
    /// reconnect).
    Eof,
}

/// Trait abstracting where samples come from.
///
/// Implementations handle framing and parsing internally; malformed records
/// are skipped with a log line rather than surfaced, so one corrupt frame
/// cannot wedge the feed. The pipeline loop calls [`next_sample`] in a
/// `select!` with cancellation.
///
/// [`next_sample`]: SampleSource::next_sample
#[async_trait]
pub trait SampleSource: Send + 'static {
    /// Establish the connection. No-op for local sources.
    async fn connect(&mut self) -> Result<(), SourceError>;

    /// Read the next sample.
    async fn next_sample(&mut self) -> Result<SampleEvent, SourceError>;

    /// Release the connection. No-op for local sources.
    async fn disconnect(&mut self);

    /// Human-readable name for logging (e.g. "gateway", "stdin", "replay").
    fn source_name(&self) -> &str;
}

// ============================================================================
// Stdin Source (JSON samples, one per line)
// ============================================================================

/// Reads JSON-formatted samples from stdin.
///
/// Used with the simulation harness:
/// `python plc_simulator.py | ./plcwatch --stdin`
pub struct StdinSource {
    reader: tokio::io::BufReader<tokio::io::Stdin>,
    line_buffer: String,
}

impl StdinSource {
    pub fn new() -> Self {
        Self {
            reader: tokio::io::BufReader::new(tokio::io::stdin()),
            line_buffer: String::with_capacity(1024),
        }
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SampleSource for StdinSource {
    async fn connect(&mut self) -> Result<(), SourceError> {
        Ok(())
    }

    async fn next_sample(&mut self) -> Result<SampleEvent, SourceError> {
        use tokio::io::AsyncBufReadExt;
        loop {
            self.line_buffer.clear();
            let bytes = self
                .reader
                .read_line(&mut self.line_buffer)
                .await
                .map_err(|e| SourceError::ConnectionFailed(e.to_string()))?;
            if bytes == 0 {
                return Ok(SampleEvent::Eof);
            }
            let line = self.line_buffer.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<SignalSample>(line) {
                Ok(sample) => return Ok(SampleEvent::Sample(sample)),
                Err(e) => {
                    tracing::warn!("[StdinSource] Failed to parse sample: {}", e);
                    // Skip malformed lines and keep reading
                }
            }
        }
    }

    async fn disconnect(&mut self) {}

    fn source_name(&self) -> &str {
        "stdin"
    }
}

// ============================================================================
// Replay Source (pre-loaded samples)
// ============================================================================

/// Replays pre-loaded samples with optional inter-sample delay.
pub struct ReplaySource {
    samples: std::vec::IntoIter<SignalSample>,
    delay_ms: u64,
    yielded_first: bool,
}

impl ReplaySource {
    pub fn new(samples: Vec<SignalSample>, delay_ms: u64) -> Self {
        Self {
            samples: samples.into_iter(),
            delay_ms,
            yielded_first: false,
        }
    }

    /// Load a JSON-lines file of samples. Malformed lines are skipped with
    /// a warning, matching the live sources.
    pub fn from_file(path: &std::path::Path, delay_ms: u64) -> std::io::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let mut samples = Vec::new();
        for (lineno, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<SignalSample>(line) {
                Ok(sample) => samples.push(sample),
                Err(e) => {
                    tracing::warn!(line = lineno + 1, "[ReplaySource] Skipping bad line: {}", e);
                }
            }
        }
        Ok(Self::new(samples, delay_ms))
    }
}

#[async_trait]
impl SampleSource for ReplaySource {
    async fn connect(&mut self) -> Result<(), SourceError> {
        Ok(())
    }

    async fn next_sample(&mut self) -> Result<SampleEvent, SourceError> {
        // Delay between samples, skipping the delay before the first one.
        if self.yielded_first && self.delay_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.delay_ms)).await;
        }
        match self.samples.next() {
            Some(sample) => {
                self.yielded_first = true;
                Ok(SampleEvent::Sample(sample))
            }
            None => Ok(SampleEvent::Eof),
        }
    }

    async fn disconnect(&mut self) {}

    fn source_name(&self) -> &str {
        "replay"
    }
}
