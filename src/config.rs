//! Deployment configuration
//!
//! One TOML file per deployed monitor instance, replacing the scattered
//! environment variables of earlier deployments with tunable sections.
//!
//! ## Loading Order
//!
//! 1. `PLCWATCH_CONFIG` environment variable (path to TOML file)
//! 2. `plcwatch.toml` in the current working directory
//! 3. Built-in defaults
//!
//! Secrets never live in the file: the Influx API token is read from
//! `INFLUX_TOKEN` at load time.
//!
//! Configuration is immutable for the process lifetime — no hot reload.
//! Validation runs once at startup and a failed check is fatal: an invalid
//! window size or threshold cannot self-heal, unlike a dropped connection.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Fatal configuration problem. The only error class that exits the process.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one monitor deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Line / machine identity stamped on every persisted point
    #[serde(default)]
    pub identity: IdentityConfig,

    /// PLC gateway feed
    #[serde(default)]
    pub source: SourceConfig,

    /// InfluxDB v2 sink
    #[serde(default)]
    pub sink: SinkConfig,

    /// Z-score detector tuning
    #[serde(default)]
    pub detector: DetectorConfig,

    /// Electrical variant tuning (ignored by other variants)
    #[serde(default)]
    pub electrical: ElectricalConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            identity: IdentityConfig::default(),
            source: SourceConfig::default(),
            sink: SinkConfig::default(),
            detector: DetectorConfig::default(),
            electrical: ElectricalConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub line_name: String,
    pub machine_name: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            line_name: "line".to_string(),
            machine_name: "machine".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Gateway address, `host:port`.
    pub addr: String,
    /// Per-line read timeout (seconds).
    pub read_timeout_secs: u64,
    /// Force a reconnect after this long without data (seconds).
    pub stale_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:4850".to_string(),
            read_timeout_secs: 120,
            stale_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// InfluxDB base URL, e.g. `http://influx:8086`.
    pub url: String,
    pub org: String,
    pub bucket: String,
    /// API token. Populated from `INFLUX_TOKEN`; never set in the file.
    #[serde(skip)]
    pub token: String,
    /// Write attempts per point before the point is dropped.
    pub max_write_attempts: u32,
    /// Initial retry delay (milliseconds, doubles per attempt).
    pub initial_retry_delay_ms: u64,
    /// Retry delay cap (milliseconds).
    pub max_retry_delay_ms: u64,
    /// HTTP request timeout (seconds).
    pub request_timeout_secs: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8086".to_string(),
            org: "factory".to_string(),
            bucket: "telemetry".to_string(),
            token: String::new(),
            max_write_attempts: 3,
            initial_retry_delay_ms: 500,
            max_retry_delay_ms: 5_000,
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Sliding-window size `W` per signal key (>= 2).
    pub window_size: usize,
    /// Anomaly-flag history size `L` per signal key (>= 1).
    pub anomaly_list_size: usize,
    /// |z| above this flags an anomaly (strictly greater, > 0).
    pub z_score_threshold: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_size: 50,
            anomaly_list_size: 50,
            z_score_threshold: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ElectricalConfig {
    /// Which qualifying current peak counts as the inrush peak (1-based).
    pub current_peak_number: usize,
    /// Minimum current for a local maximum to qualify as a peak (amps).
    pub current_peak_height: f64,
}

impl Default for ElectricalConfig {
    fn default() -> Self {
        Self {
            current_peak_number: 1,
            current_peak_height: 1.0,
        }
    }
}

// ============================================================================
// Loading & Validation
// ============================================================================

impl MonitorConfig {
    /// Load configuration using the standard search order:
    /// 1. `$PLCWATCH_CONFIG` environment variable
    /// 2. `./plcwatch.toml`
    /// 3. Built-in defaults
    ///
    /// Unlike a missing file, an unreadable or invalid file is fatal — a
    /// deployment that shipped a config expects that config to be applied.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var("PLCWATCH_CONFIG") {
            let p = PathBuf::from(&path);
            let mut config = Self::load_from_file(&p)?;
            info!(path = %p.display(), "Loaded config from PLCWATCH_CONFIG");
            config.apply_env_secrets();
            config.validate()?;
            return Ok(config);
        }

        let local = PathBuf::from("plcwatch.toml");
        if local.exists() {
            let mut config = Self::load_from_file(&local)?;
            info!("Loaded config from ./plcwatch.toml");
            config.apply_env_secrets();
            config.validate()?;
            return Ok(config);
        }

        warn!("No plcwatch.toml found — using built-in defaults");
        let mut config = Self::default();
        config.apply_env_secrets();
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Pull secrets from the environment. Missing token is tolerated here
    /// and rejected by the sink on first use, so replay/offline runs work
    /// without Influx credentials.
    fn apply_env_secrets(&mut self) {
        if let Ok(token) = std::env::var("INFLUX_TOKEN") {
            self.sink.token = token;
        }
    }

    /// Range checks for every recognized option.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.detector.window_size < 2 {
            return Err(ConfigError::Invalid(format!(
                "detector.window_size must be >= 2, got {}",
                self.detector.window_size
            )));
        }
        if self.detector.anomaly_list_size < 1 {
            return Err(ConfigError::Invalid(
                "detector.anomaly_list_size must be >= 1".to_string(),
            ));
        }
        if !(self.detector.z_score_threshold > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "detector.z_score_threshold must be > 0, got {}",
                self.detector.z_score_threshold
            )));
        }
        if self.electrical.current_peak_number < 1 {
            return Err(ConfigError::Invalid(
                "electrical.current_peak_number must be >= 1".to_string(),
            ));
        }
        if !(self.electrical.current_peak_height > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "electrical.current_peak_height must be > 0, got {}",
                self.electrical.current_peak_height
            )));
        }
        if self.sink.max_write_attempts == 0 {
            return Err(ConfigError::Invalid(
                "sink.max_write_attempts must be >= 1".to_string(),
            ));
        }
        if self.source.addr.is_empty() {
            return Err(ConfigError::Invalid("source.addr must not be empty".to_string()));
        }
        // host:port shape only — DNS resolution happens on connect
        if !self.source.addr.contains(':') {
            return Err(ConfigError::Invalid(format!(
                "source.addr must be host:port, got '{}'",
                self.source.addr
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_validate() {
        MonitorConfig::default().validate().unwrap();
    }

    #[test]
    fn window_size_below_two_is_rejected() {
        let mut config = MonitorConfig::default();
        config.detector.window_size = 1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn nan_threshold_is_rejected() {
        let mut config = MonitorConfig::default();
        config.detector.z_score_threshold = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn bare_hostname_addr_is_rejected() {
        let mut config = MonitorConfig::default();
        config.source.addr = "gateway".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [identity]
            line_name = "L7"
            machine_name = "Filler02"

            [detector]
            window_size = 25
            anomaly_list_size = 25
            z_score_threshold = 2.5
            "#
        )
        .unwrap();

        let config = MonitorConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.identity.line_name, "L7");
        assert_eq!(config.detector.window_size, 25);
        // unspecified sections keep defaults
        assert_eq!(config.sink.max_write_attempts, 3);
        assert_eq!(config.electrical.current_peak_number, 1);
        config.validate().unwrap();
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[detector\nwindow_size = 5").unwrap();
        assert!(matches!(
            MonitorConfig::load_from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }
}
