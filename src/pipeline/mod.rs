//! Processing pipeline.
//!
//! ```text
//! source -> extract -> window -> classify -> trend -> point -> writer
//! ```
//!
//! [`Engine`] owns every per-key statistics chain and turns one sample into
//! zero or more points; [`PipelineLoop`] drives the source and the writer
//! around it, owning the reconnect state machine. The pieces are split so
//! the engine is testable with plain vectors and the loop with in-memory
//! sources and sinks.

mod engine;
pub mod processing_loop;

pub use engine::{Engine, EngineStats};
pub use processing_loop::{LoopStats, PipelineLoop};

use std::time::Duration;

// ============================================================================
// Reconnect backoff
// ============================================================================

/// Initial source-reconnect delay (doubles each attempt).
const INITIAL_RECONNECT_DELAY_SECS: u64 = 2;

/// Reconnect delay cap.
const MAX_RECONNECT_DELAY_SECS: u64 = 60;

/// Exponential backoff with a cap. Source reconnects retry indefinitely —
/// recovery is expected once the gateway returns — so unlike the sink
/// retries there is no attempt limit, only a growing delay.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    pub fn for_source() -> Self {
        Self::new(
            Duration::from_secs(INITIAL_RECONNECT_DELAY_SECS),
            Duration::from_secs(MAX_RECONNECT_DELAY_SECS),
        )
    }

    /// Delay to wait before the next attempt. Doubles per call, capped.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    /// Reset after a successful attempt.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Observable pipeline connection state.
///
/// `Active` covers both the polling and the subscribed delivery style; the
/// per-sample processing and writing happen inside it sequentially.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Initial state before the first connection attempt.
    Disconnected,
    Connecting,
    Active,
    Reconnecting,
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopState::Disconnected => write!(f, "DISCONNECTED"),
            LoopState::Connecting => write!(f, "CONNECTING"),
            LoopState::Active => write!(f, "ACTIVE"),
            LoopState::Reconnecting => write!(f, "RECONNECTING"),
        }
    }
}
