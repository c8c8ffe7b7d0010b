//! plcwatch - Streaming PLC Anomaly Monitor
//!
//! Consumes machine telemetry from a PLC gateway, scores each signal against
//! its own sliding-window statistics, and writes the results to InfluxDB.
//!
//! # Usage
//!
//! ```bash
//! # Connect to the gateway feed configured in plcwatch.toml
//! ./plcwatch
//!
//! # Override the gateway address
//! ./plcwatch --addr 10.0.4.12:4850
//!
//! # Run with simulated input from stdin
//! python plc_simulator.py | ./plcwatch --stdin
//!
//! # Replay a recorded JSON-lines capture
//! ./plcwatch --replay capture.jsonl --delay-ms 0
//! ```
//!
//! # Environment Variables
//!
//! - `PLCWATCH_CONFIG`: Path to the TOML config (default: ./plcwatch.toml)
//! - `INFLUX_TOKEN`: InfluxDB API token (never read from the config file)
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use plcwatch::config::MonitorConfig;
use plcwatch::pipeline::PipelineLoop;
use plcwatch::sink::InfluxSink;
use plcwatch::source::{GatewaySource, ReplaySource, SampleSource, StdinSource};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "plcwatch")]
#[command(about = "Streaming anomaly detection for PLC telemetry")]
#[command(version)]
struct CliArgs {
    /// Read JSON samples from stdin instead of the gateway
    #[arg(long)]
    stdin: bool,

    /// Replay a recorded JSON-lines capture file
    #[arg(long, value_name = "FILE")]
    replay: Option<String>,

    /// Delay between replayed samples in milliseconds
    #[arg(long, default_value = "0")]
    delay_ms: u64,

    /// Override the gateway address (HOST:PORT)
    #[arg(short, long)]
    addr: Option<String>,
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    // Configuration errors are the one fatal startup condition
    let mut cfg = MonitorConfig::load().context("configuration error")?;
    if let Some(addr) = args.addr {
        cfg.source.addr = addr;
        cfg.validate().context("configuration error")?;
    }

    info!(
        "Monitor: line={} machine={} window={} threshold={}",
        cfg.identity.line_name,
        cfg.identity.machine_name,
        cfg.detector.window_size,
        cfg.detector.z_score_threshold
    );

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    if cfg.sink.token.is_empty() {
        tracing::warn!("INFLUX_TOKEN not set — every point will be dropped as unauthorized");
    }
    let sink = InfluxSink::new(&cfg.sink).context("sink initialization failed")?;
    let pipeline = PipelineLoop::new(&cfg, sink, cancel_token);

    let stats = if let Some(path) = args.replay {
        info!("Input: replay file {}", path);
        let mut source = ReplaySource::from_file(std::path::Path::new(&path), args.delay_ms)
            .with_context(|| format!("failed to load replay file {path}"))?;
        run(pipeline, &mut source).await
    } else if args.stdin {
        info!("Input: stdin (JSON samples)");
        let mut source = StdinSource::new();
        run(pipeline, &mut source).await
    } else {
        info!("Input: PLC gateway at {}", cfg.source.addr);
        let mut source = GatewaySource::new(&cfg.source);
        run(pipeline, &mut source).await
    };

    info!(
        "Shutdown complete: {} samples processed, {} points written, {} dropped",
        stats.engine.samples_processed, stats.points_written, stats.points_dropped
    );
    Ok(())
}

async fn run<S: SampleSource>(
    pipeline: PipelineLoop<InfluxSink>,
    source: &mut S,
) -> plcwatch::pipeline::LoopStats {
    pipeline.run(source).await
}
