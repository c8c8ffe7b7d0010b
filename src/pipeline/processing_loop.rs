//! Main processing loop.
//!
//! Drives one [`SampleSource`] through the [`Engine`] and out via the
//! [`Writer`]. Owns the connection state machine: the source itself only
//! knows how to connect, read, and disconnect — reconnect policy (indefinite
//! retries with capped exponential backoff) lives here, so every source
//! gets the same recovery behavior.

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::MonitorConfig;
use crate::pipeline::{Backoff, Engine, EngineStats, LoopState};
use crate::sink::{PointSink, Writer};
use crate::source::{SampleEvent, SampleSource};

/// Final loop counters, logged once at shutdown.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LoopStats {
    pub reconnects: u64,
    pub points_written: u64,
    pub points_dropped: u64,
    #[serde(flatten)]
    pub engine: EngineStats,
}

pub struct PipelineLoop<K: PointSink> {
    engine: Engine,
    writer: Writer<K>,
    backoff: Backoff,
    cancel_token: CancellationToken,
    reconnects: u64,
}

impl<K: PointSink> PipelineLoop<K> {
    pub fn new(cfg: &MonitorConfig, sink: K, cancel_token: CancellationToken) -> Self {
        Self {
            engine: Engine::new(
                cfg.identity.clone(),
                cfg.detector.clone(),
                cfg.electrical.clone(),
            ),
            writer: Writer::new(sink, &cfg.sink),
            backoff: Backoff::for_source(),
            cancel_token,
            reconnects: 0,
        }
    }

    /// Run until the source reports EOF or cancellation fires.
    ///
    /// Source errors never end the loop — the source is disconnected and the
    /// loop re-enters connection with backoff. Only cancellation and EOF
    /// terminate. A sample mid-write is always flushed before the loop
    /// observes cancellation.
    pub async fn run<S: SampleSource>(mut self, source: &mut S) -> LoopStats {
        let mut state = LoopState::Disconnected;

        loop {
            match state {
                LoopState::Disconnected => state = LoopState::Connecting,
                LoopState::Connecting | LoopState::Reconnecting => {
                    tokio::select! {
                        _ = self.cancel_token.cancelled() => break,
                        result = source.connect() => match result {
                            Ok(()) => {
                                info!(source = source.source_name(), "Source connected");
                                self.backoff.reset();
                                state = LoopState::Active;
                            }
                            Err(e) => {
                                let delay = self.backoff.next_delay();
                                warn!(
                                    source = source.source_name(),
                                    error = %e,
                                    retry_in_secs = delay.as_secs(),
                                    "Source connection failed"
                                );
                                tokio::select! {
                                    _ = self.cancel_token.cancelled() => break,
                                    _ = tokio::time::sleep(delay) => {}
                                }
                                state = LoopState::Reconnecting;
                            }
                        },
                    }
                }
                LoopState::Active => {
                    tokio::select! {
                        _ = self.cancel_token.cancelled() => break,
                        result = source.next_sample() => match result {
                            Ok(SampleEvent::Sample(sample)) => {
                                for point in self.engine.process(&sample) {
                                    // a dropped point is already logged by the
                                    // writer; the loop keeps going regardless
                                    let _ = self.writer.write(&point).await;
                                }
                            }
                            Ok(SampleEvent::Eof) => {
                                info!(source = source.source_name(), "Source exhausted");
                                break;
                            }
                            Err(e) => {
                                error!(
                                    source = source.source_name(),
                                    error = %e,
                                    "Source read failed — reconnecting"
                                );
                                source.disconnect().await;
                                self.reconnects += 1;
                                state = LoopState::Reconnecting;
                            }
                        },
                    }
                }
            }
        }

        source.disconnect().await;

        let stats = LoopStats {
            reconnects: self.reconnects,
            points_written: self.writer.points_written(),
            points_dropped: self.writer.points_dropped(),
            engine: self.engine.stats(),
        };
        info!(
            samples_processed = stats.engine.samples_processed,
            points_written = stats.points_written,
            points_dropped = stats.points_dropped,
            reconnects = stats.reconnects,
            active_chains = stats.engine.active_chains,
            "Pipeline stopped"
        );
        stats
    }
}
