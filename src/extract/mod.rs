//! Feature extraction.
//!
//! Turns one raw gateway payload into zero or more [`MetricReading`]s before
//! they enter the statistics model. Four variants share the edge policy: a
//! malformed or partially-populated structure is dropped with a `DataError`
//! and produces zero readings — it never mutates any window.
//!
//! Only the electrical variant is stateful (it accumulates waveform samples
//! across ticks until a cycle closes); the extractor owns one accumulator per
//! signal key for it.

pub mod electrical;
pub mod valve;
pub mod vibration;

use std::collections::HashMap;

use crate::config::ElectricalConfig;
use crate::types::{DataError, MetricReading, SignalPayload};

pub use electrical::CycleAccumulator;

/// Stateful extractor dispatching on signal family.
pub struct FeatureExtractor {
    electrical_cfg: ElectricalConfig,
    /// Per-device cycle accumulators, created lazily per signal key.
    cycles: HashMap<String, CycleAccumulator>,
}

impl FeatureExtractor {
    pub fn new(electrical_cfg: ElectricalConfig) -> Self {
        Self {
            electrical_cfg,
            cycles: HashMap::new(),
        }
    }

    /// Extract the metric readings for one sample.
    ///
    /// An empty result is normal for the electrical family (mid-cycle ticks
    /// only accumulate). An `Err` means the whole sample was dropped.
    pub fn extract(
        &mut self,
        signal_key: &str,
        payload: &SignalPayload,
    ) -> Result<Vec<MetricReading>, DataError> {
        match payload {
            SignalPayload::Sensor { value } => {
                if !value.is_finite() {
                    return Err(DataError::NonFinite {
                        sub_key: "value".to_string(),
                        value: *value,
                    });
                }
                Ok(vec![MetricReading::scored("value", *value)])
            }
            SignalPayload::State { value } => {
                // state monitors persist raw observations only
                Ok(vec![MetricReading::raw("value", *value as f64)])
            }
            SignalPayload::Vibration {
                rms_x,
                rms_y,
                rms_z,
                temperature,
            } => vibration::extract(*rms_x, *rms_y, *rms_z, *temperature),
            SignalPayload::Electrical {
                device_state,
                synch_pulse,
                current_l1,
                current_l2,
                current_l3,
            } => {
                let accumulator = self
                    .cycles
                    .entry(signal_key.to_string())
                    .or_insert_with(CycleAccumulator::new);
                accumulator.tick(
                    *device_state,
                    *synch_pulse,
                    [*current_l1, *current_l2, *current_l3],
                    &self.electrical_cfg,
                )
            }
            SignalPayload::Valve {
                valve_name,
                travel,
                time_ms,
            } => valve::extract(valve_name, *travel, *time_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValveTravel;

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::new(ElectricalConfig::default())
    }

    #[test]
    fn sensor_yields_single_scored_reading() {
        let readings = extractor()
            .extract("temp01", &SignalPayload::Sensor { value: 21.5 })
            .unwrap();
        assert_eq!(readings, vec![MetricReading::scored("value", 21.5)]);
    }

    #[test]
    fn sensor_nan_is_dropped() {
        let result = extractor().extract("temp01", &SignalPayload::Sensor { value: f64::NAN });
        assert!(matches!(result, Err(DataError::NonFinite { .. })));
    }

    #[test]
    fn state_yields_single_raw_reading() {
        let readings = extractor()
            .extract("station_state", &SignalPayload::State { value: 3 })
            .unwrap();
        assert_eq!(readings, vec![MetricReading::raw("value", 3.0)]);
    }

    #[test]
    fn valve_sub_key_carries_name_and_travel_kind() {
        let readings = extractor()
            .extract(
                "clamp",
                &SignalPayload::Valve {
                    valve_name: "V12".to_string(),
                    travel: ValveTravel::Retract,
                    time_ms: 840.0,
                },
            )
            .unwrap();
        assert_eq!(readings, vec![MetricReading::scored("V12:Retract", 840.0)]);
    }

    #[test]
    fn electrical_accumulators_are_independent_per_signal_key() {
        let mut ex = extractor();
        let running = SignalPayload::Electrical {
            device_state: true,
            synch_pulse: false,
            current_l1: 2.0,
            current_l2: 2.0,
            current_l3: 2.0,
        };
        let stopped = SignalPayload::Electrical {
            device_state: false,
            synch_pulse: false,
            current_l1: 0.0,
            current_l2: 0.0,
            current_l3: 0.0,
        };

        // feed a cycle into motor_a only
        for _ in 0..4 {
            assert!(ex.extract("motor_a", &running).unwrap().is_empty());
        }
        let closed = ex.extract("motor_a", &stopped).unwrap();
        assert!(!closed.is_empty());

        // motor_b never accumulated, so its stop tick yields nothing
        assert!(ex.extract("motor_b", &stopped).unwrap().is_empty());
    }
}
