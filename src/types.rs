//! Shared data structures for the telemetry anomaly pipeline
//!
//! This module defines the types flowing through the pipeline:
//! - `SignalSample`: one timestamped observation from the PLC gateway
//! - `SignalPayload`: tagged per-family payload (scalar, state, vibration,
//!   electrical, valve) — one variant per structure the gateway publishes
//! - `MetricReading`: a `(sub_key, scalar)` pair produced by an extractor
//! - `DataError`: malformed / out-of-range sample rejection

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Samples
// ============================================================================

/// One telemetry observation as delivered by the PLC protocol gateway.
///
/// Immutable once created; consumed exactly once by the pipeline. The
/// gateway stamps `timestamp` in epoch milliseconds from the PLC clock, so
/// a repeated timestamp for the same signal key means "no new data".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalSample {
    pub line_name: String,
    pub machine_name: String,
    /// Sensor / state / device / valve identifier on the machine.
    pub signal_key: String,
    /// Epoch milliseconds, PLC clock.
    pub timestamp: i64,
    #[serde(flatten)]
    pub payload: SignalPayload,
}

/// Per-family payload carried by a [`SignalSample`].
///
/// Each signal family is a dedicated record type rather than a generic field
/// map, so a missing sub-field surfaces as a deserialization or extraction
/// [`DataError`] instead of silently producing a partial point.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum SignalPayload {
    /// Generic scalar sensor value — scored through the z-score stage.
    Sensor { value: f64 },
    /// Machine state value — persisted raw, never scored.
    State { value: i64 },
    /// Triaxial RMS acceleration plus sensor temperature.
    Vibration {
        rms_x: f64,
        rms_y: f64,
        rms_z: f64,
        temperature: f64,
    },
    /// One tick of the electrical waveform feed, gated by the sync pulse.
    Electrical {
        /// True while the monitored device is running.
        device_state: bool,
        /// Cycle synchronization pulse from the PLC.
        synch_pulse: bool,
        current_l1: f64,
        current_l2: f64,
        current_l3: f64,
    },
    /// A completed air-valve travel-time measurement.
    Valve {
        valve_name: String,
        travel: ValveTravel,
        /// Measured travel time in milliseconds.
        time_ms: f64,
    },
}

impl SignalPayload {
    /// Family name used for logging and measurement routing.
    pub fn family(&self) -> &'static str {
        match self {
            SignalPayload::Sensor { .. } => "sensor",
            SignalPayload::State { .. } => "state",
            SignalPayload::Vibration { .. } => "vibration",
            SignalPayload::Electrical { .. } => "electrical",
            SignalPayload::Valve { .. } => "valve",
        }
    }
}

/// Which valve motion a travel time describes.
///
/// Extend and retract travel-time distributions differ structurally, and the
/// command-to-motion delays differ from the motion itself, so each kind gets
/// its own independent window and classifier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ValveTravel {
    Extend,
    Retract,
    /// Delay between extend command and start of motion.
    ExtendCmd,
    /// Delay between retract command and start of motion.
    RetractCmd,
}

impl std::fmt::Display for ValveTravel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValveTravel::Extend => write!(f, "Extend"),
            ValveTravel::Retract => write!(f, "Retract"),
            ValveTravel::ExtendCmd => write!(f, "ExtendCmd"),
            ValveTravel::RetractCmd => write!(f, "RetractCmd"),
        }
    }
}

// ============================================================================
// Extracted metrics
// ============================================================================

/// A single scalar produced by a feature extractor, addressed by sub-key.
///
/// The sub-key disambiguates metrics derived from one composite sample
/// (vibration axes, per-phase integrals, valve travel kinds). Scored
/// readings pass through their own window/classifier/trend chain; unscored
/// readings are persisted raw only.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricReading {
    pub sub_key: String,
    pub value: f64,
    pub scored: bool,
}

impl MetricReading {
    pub fn scored(sub_key: impl Into<String>, value: f64) -> Self {
        Self {
            sub_key: sub_key.into(),
            value,
            scored: true,
        }
    }

    pub fn raw(sub_key: impl Into<String>, value: f64) -> Self {
        Self {
            sub_key: sub_key.into(),
            value,
            scored: false,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// A sample that cannot be processed. The sample is dropped and logged;
/// it never reaches a statistics window and never evicts a window slot.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("non-finite value {value} for {sub_key}")]
    NonFinite { sub_key: String, value: f64 },

    #[error("malformed {family} payload: {reason}")]
    Malformed {
        family: &'static str,
        reason: String,
    },

    #[error("negative travel time {time_ms} ms for valve {valve}")]
    NegativeTravelTime { valve: String, time_ms: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_json_round_trip_vibration() {
        let json = r#"{
            "line_name": "L1",
            "machine_name": "Press03",
            "signal_key": "spindle_vib",
            "timestamp": 1717000000123,
            "family": "vibration",
            "rms_x": 0.5,
            "rms_y": 0.9,
            "rms_z": 1.1,
            "temperature": 41.5
        }"#;

        let sample: SignalSample = serde_json::from_str(json).unwrap();
        assert_eq!(sample.signal_key, "spindle_vib");
        match sample.payload {
            SignalPayload::Vibration { rms_z, .. } => assert_eq!(rms_z, 1.1),
            other => panic!("wrong family: {}", other.family()),
        }
    }

    #[test]
    fn sample_json_missing_subfield_is_rejected() {
        // rms_z absent — must fail deserialization, not default to zero
        let json = r#"{
            "line_name": "L1",
            "machine_name": "Press03",
            "signal_key": "spindle_vib",
            "timestamp": 1717000000123,
            "family": "vibration",
            "rms_x": 0.5,
            "rms_y": 0.9,
            "temperature": 41.5
        }"#;

        assert!(serde_json::from_str::<SignalSample>(json).is_err());
    }

    #[test]
    fn valve_travel_display_matches_tag_names() {
        assert_eq!(ValveTravel::Extend.to_string(), "Extend");
        assert_eq!(ValveTravel::RetractCmd.to_string(), "RetractCmd");
    }
}
