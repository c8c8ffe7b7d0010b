//! Time-series persistence.
//!
//! A [`Point`] is the one outbound record shape: measurement name, tag set,
//! field set, millisecond timestamp. [`PointSink`] abstracts where points go
//! (InfluxDB in production, mocks in tests); [`Writer`] wraps a sink with the
//! bounded retry policy so a flaky sink slows one point down instead of
//! stalling the pipeline.

pub mod influx;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::config::SinkConfig;

pub use influx::InfluxSink;

// ============================================================================
// Points
// ============================================================================

/// One field value. Influx distinguishes float, integer, and boolean fields
/// at the schema level, so the distinction is kept all the way out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Int(i64),
    Bool(bool),
}

/// A point ready for the time-series sink.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub measurement: &'static str,
    pub tags: Vec<(String, String)>,
    pub fields: Vec<(String, FieldValue)>,
    /// Epoch milliseconds.
    pub timestamp_ms: i64,
}

impl Point {
    pub fn new(measurement: &'static str, timestamp_ms: i64) -> Self {
        Self {
            measurement,
            tags: Vec::new(),
            fields: Vec::new(),
            timestamp_ms,
        }
    }

    pub fn tag(mut self, key: &str, value: impl Into<String>) -> Self {
        self.tags.push((key.to_string(), value.into()));
        self
    }

    pub fn field_f64(mut self, key: impl Into<String>, value: f64) -> Self {
        self.fields.push((key.into(), FieldValue::Float(value)));
        self
    }

    pub fn field_i64(mut self, key: impl Into<String>, value: i64) -> Self {
        self.fields.push((key.into(), FieldValue::Int(value)));
        self
    }

    pub fn field_bool(mut self, key: impl Into<String>, value: bool) -> Self {
        self.fields.push((key.into(), FieldValue::Bool(value)));
        self
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Sink write failure.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Network-level failure (refused, timeout, reset) — worth retrying.
    #[error("sink transport error: {0}")]
    Transport(String),

    /// The sink accepted the connection but rejected the point
    /// (auth, schema, malformed line) — retrying cannot help.
    #[error("sink rejected point (status {status}): {body}")]
    Rejected { status: u16, body: String },

    /// Sink credentials were never configured.
    #[error("sink token not configured (set INFLUX_TOKEN)")]
    NotConfigured,

    /// A point with no fields would be rejected by the line protocol.
    #[error("point for {measurement} has no fields")]
    EmptyPoint { measurement: &'static str },
}

impl SinkError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, SinkError::Transport(_))
    }
}

// ============================================================================
// Sink trait
// ============================================================================

/// Destination for persisted points.
#[async_trait]
pub trait PointSink: Send {
    async fn write(&mut self, point: &Point) -> Result<(), SinkError>;

    /// Human-readable name for logging.
    fn sink_name(&self) -> &str;
}

// ============================================================================
// Retrying writer
// ============================================================================

/// Wraps a [`PointSink`] with bounded exponential-backoff retries.
///
/// Transient failures retry up to `max_write_attempts`; on exhaustion the
/// point is dropped with a logged event. Permanent rejections drop
/// immediately — a schema-rejected point stays rejected. Either way the
/// caller's loop keeps running; a single bad point must not stop the
/// pipeline for every other key.
pub struct Writer<S: PointSink> {
    sink: S,
    max_attempts: u32,
    initial_delay: std::time::Duration,
    max_delay: std::time::Duration,
    points_written: u64,
    points_dropped: u64,
}

impl<S: PointSink> Writer<S> {
    pub fn new(sink: S, cfg: &SinkConfig) -> Self {
        Self {
            sink,
            max_attempts: cfg.max_write_attempts,
            initial_delay: std::time::Duration::from_millis(cfg.initial_retry_delay_ms),
            max_delay: std::time::Duration::from_millis(cfg.max_retry_delay_ms),
            points_written: 0,
            points_dropped: 0,
        }
    }

    /// Write one point, retrying transient failures.
    ///
    /// `Err` means the point was dropped; the error carries the final
    /// failure. Callers log and continue.
    pub async fn write(&mut self, point: &Point) -> Result<(), SinkError> {
        let mut delay = self.initial_delay;

        for attempt in 1..=self.max_attempts {
            match self.sink.write(point).await {
                Ok(()) => {
                    self.points_written += 1;
                    return Ok(());
                }
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    warn!(
                        sink = self.sink.sink_name(),
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Point write failed — retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(self.max_delay);
                }
                Err(e) => {
                    self.points_dropped += 1;
                    warn!(
                        sink = self.sink.sink_name(),
                        measurement = point.measurement,
                        timestamp_ms = point.timestamp_ms,
                        attempts = attempt,
                        total_dropped = self.points_dropped,
                        error = %e,
                        "Point dropped"
                    );
                    return Err(e);
                }
            }
        }

        unreachable!("retry loop always returns within max_attempts");
    }

    pub fn points_written(&self) -> u64 {
        self.points_written
    }

    pub fn points_dropped(&self) -> u64 {
        self.points_dropped
    }
}
