//! plcwatch: Streaming anomaly detection for PLC telemetry
//!
//! Consumes machine signals from a PLC gateway feed, maintains per-signal
//! sliding-window statistics, flags z-score outliers, and persists the
//! scored points to InfluxDB.
//!
//! ## Architecture
//!
//! - **Source**: gateway/stdin/replay sample feeds behind one trait
//! - **Extract**: per-family feature extractors (sensor, vibration,
//!   electrical cycles, air-valve travel, state)
//! - **Analytics**: sliding window model, z-score classifier, anomaly trend
//! - **Pipeline**: per-key processing engine and the reconnecting main loop
//! - **Sink**: retrying writer over the Influx line-protocol client

pub mod analytics;
pub mod config;
pub mod extract;
pub mod pipeline;
pub mod sink;
pub mod source;
pub mod types;

// Re-export configuration
pub use config::{ConfigError, MonitorConfig};

// Re-export commonly used types
pub use types::{DataError, MetricReading, SignalPayload, SignalSample, ValveTravel};

// Re-export analytics components
pub use analytics::{classify, TrendWindow, WindowModel, WindowStats, ZScoreResult};

// Re-export pipeline components
pub use pipeline::{Engine, EngineStats, LoopStats, PipelineLoop};

// Re-export source and sink seams
pub use sink::{InfluxSink, Point, PointSink, SinkError, Writer};
pub use source::{SampleEvent, SampleSource, SourceError};
