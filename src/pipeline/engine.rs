//! Per-sample processing engine.
//!
//! One [`Engine`] owns every per-key statistics chain for its monitor: the
//! feature extractor, one window/trend pair per `signal_key/sub_key`, and
//! the duplicate-timestamp map. `process` is synchronous and allocation-light
//! so the surrounding loop can interleave it with I/O freely.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::analytics::{classify, TrendWindow, WindowModel};
use crate::config::{DetectorConfig, ElectricalConfig, IdentityConfig};
use crate::extract::FeatureExtractor;
use crate::sink::Point;
use crate::types::{SignalPayload, SignalSample};

// Measurement names, one per signal family.
const MEASUREMENT_SENSOR: &str = "SingleSensorAnalytics";
const MEASUREMENT_STATE: &str = "GenericState";
const MEASUREMENT_VIBRATION: &str = "VibSensor";
const MEASUREMENT_ELECTRICAL: &str = "ElectricalAnalytics";
const MEASUREMENT_VALVE: &str = "AirValve";

/// Window model plus anomaly trend for one scored metric.
struct Chain {
    window: WindowModel,
    trend: TrendWindow,
}

/// Engine counters, logged at shutdown.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineStats {
    pub samples_processed: u64,
    pub samples_deduplicated: u64,
    pub samples_rejected: u64,
    pub points_built: u64,
    pub active_chains: usize,
}

pub struct Engine {
    identity: IdentityConfig,
    detector: DetectorConfig,
    extractor: FeatureExtractor,
    /// Statistics chain per `signal_key/sub_key`, created lazily on first
    /// scored reading.
    chains: HashMap<String, Chain>,
    /// Last accepted timestamp per signal key. Gateways occasionally replay
    /// the previous value on their publish interval; a repeated timestamp
    /// is the same observation and must not re-enter any window.
    last_timestamps: HashMap<String, i64>,
    stats: EngineStats,
}

impl Engine {
    pub fn new(
        identity: IdentityConfig,
        detector: DetectorConfig,
        electrical: ElectricalConfig,
    ) -> Self {
        Self {
            identity,
            detector,
            extractor: FeatureExtractor::new(electrical),
            chains: HashMap::new(),
            last_timestamps: HashMap::new(),
            stats: EngineStats::default(),
        }
    }

    /// Process one sample into the points to persist.
    ///
    /// A rejected sample (duplicate timestamp, malformed payload) returns an
    /// empty vector and is logged here; it never reaches a window. A failure
    /// on one sub-key chain drops that reading only — sibling readings from
    /// the same composite sample still produce points.
    pub fn process(&mut self, sample: &SignalSample) -> Vec<Point> {
        if let Some(&last) = self.last_timestamps.get(&sample.signal_key) {
            if sample.timestamp == last {
                self.stats.samples_deduplicated += 1;
                debug!(
                    signal_key = %sample.signal_key,
                    timestamp_ms = sample.timestamp,
                    "Duplicate timestamp — sample skipped"
                );
                return Vec::new();
            }
        }
        self.last_timestamps
            .insert(sample.signal_key.clone(), sample.timestamp);

        let readings = match self.extractor.extract(&sample.signal_key, &sample.payload) {
            Ok(readings) => readings,
            Err(e) => {
                self.stats.samples_rejected += 1;
                warn!(
                    signal_key = %sample.signal_key,
                    timestamp_ms = sample.timestamp,
                    error = %e,
                    "Sample rejected"
                );
                return Vec::new();
            }
        };

        self.stats.samples_processed += 1;

        let mut points = Vec::with_capacity(readings.len());
        for reading in readings {
            let mut point = self.base_point(sample, &reading.sub_key);

            if reading.scored {
                let chain_key = format!("{}/{}", sample.signal_key, reading.sub_key);
                let window_size = self.detector.window_size;
                let list_size = self.detector.anomaly_list_size;
                let chain = self.chains.entry(chain_key).or_insert_with(|| Chain {
                    window: WindowModel::new(window_size),
                    trend: TrendWindow::new(list_size),
                });

                let stats = match chain.window.observe(&reading.sub_key, reading.value) {
                    Ok(stats) => stats,
                    Err(e) => {
                        warn!(
                            signal_key = %sample.signal_key,
                            sub_key = %reading.sub_key,
                            error = %e,
                            "Reading rejected"
                        );
                        continue;
                    }
                };

                point = point
                    .field_f64("value", reading.value)
                    .field_bool("model_complete", stats.is_warm);

                if stats.is_warm {
                    let result = classify(
                        reading.value,
                        stats.mean,
                        stats.std_dev,
                        self.detector.z_score_threshold,
                    );
                    let rolling_count = chain.trend.record(result.is_anomaly);

                    point = point
                        .field_f64("z_score", result.score)
                        .field_bool("anomaly", result.is_anomaly)
                        .field_i64("anomaly_rolling_count", rolling_count as i64)
                        .field_f64("anomaly_ratio", chain.trend.ratio())
                        .field_f64("model_avg", stats.mean)
                        .field_f64("z_score_thresh", self.detector.z_score_threshold);
                } else {
                    point = point.field_bool("anomaly", false);
                }
            } else if matches!(sample.payload, SignalPayload::State { .. }) {
                point = point.field_i64("value", reading.value as i64);
            } else {
                point = point.field_f64("value", reading.value);
            }

            self.stats.points_built += 1;
            points.push(point);
        }

        points
    }

    /// Measurement, identity tags and family tags for one reading.
    fn base_point(&self, sample: &SignalSample, sub_key: &str) -> Point {
        let line_name = if sample.line_name.is_empty() {
            &self.identity.line_name
        } else {
            &sample.line_name
        };
        let machine_name = if sample.machine_name.is_empty() {
            &self.identity.machine_name
        } else {
            &sample.machine_name
        };

        let measurement = match sample.payload {
            SignalPayload::Sensor { .. } => MEASUREMENT_SENSOR,
            SignalPayload::State { .. } => MEASUREMENT_STATE,
            SignalPayload::Vibration { .. } => MEASUREMENT_VIBRATION,
            SignalPayload::Electrical { .. } => MEASUREMENT_ELECTRICAL,
            SignalPayload::Valve { .. } => MEASUREMENT_VALVE,
        };

        let mut point = Point::new(measurement, sample.timestamp)
            .tag("line_name", line_name.clone())
            .tag("machine_name", machine_name.clone());

        match &sample.payload {
            SignalPayload::Valve {
                valve_name, travel, ..
            } => {
                point = point
                    .tag("valve_name", valve_name.clone())
                    .tag("operation_type", travel.to_string());
            }
            SignalPayload::State { .. } => {
                point = point.tag("state_name", sample.signal_key.clone());
            }
            _ => {
                point = point.tag("sensor_name", sample.signal_key.clone());
                if sub_key != "value" {
                    point = point.tag("metric", sub_key.to_string());
                }
            }
        }

        point
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            active_chains: self.chains.len(),
            ..self.stats.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::FieldValue;
    use crate::types::SignalPayload;

    fn engine(window_size: usize, z_score_threshold: f64) -> Engine {
        Engine::new(
            IdentityConfig {
                line_name: "L1".to_string(),
                machine_name: "Press03".to_string(),
            },
            DetectorConfig {
                window_size,
                anomaly_list_size: 5,
                z_score_threshold,
            },
            ElectricalConfig::default(),
        )
    }

    fn sensor_sample(signal_key: &str, timestamp: i64, value: f64) -> SignalSample {
        SignalSample {
            line_name: "L1".to_string(),
            machine_name: "Press03".to_string(),
            signal_key: signal_key.to_string(),
            timestamp,
            payload: SignalPayload::Sensor { value },
        }
    }

    fn field<'a>(point: &'a Point, key: &str) -> Option<&'a FieldValue> {
        point
            .fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    #[test]
    fn warm_up_persists_raw_without_score() {
        let mut engine = engine(3, 2.0);

        let points = engine.process(&sensor_sample("temp", 1000, 20.0));
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].measurement, "SingleSensorAnalytics");
        assert_eq!(field(&points[0], "anomaly"), Some(&FieldValue::Bool(false)));
        assert_eq!(
            field(&points[0], "model_complete"),
            Some(&FieldValue::Bool(false))
        );
        assert!(field(&points[0], "z_score").is_none());
    }

    #[test]
    fn warm_model_scores_and_flags_outlier() {
        let mut engine = engine(6, 2.0);
        for i in 0..5 {
            engine.process(&sensor_sample("temp", 1000 + i, 10.0));
        }

        // window becomes [10, 10, 10, 10, 10, 100]; the spike lies
        // 5/sqrt(6) ~ 2.04 sample deviations out, past the 2.0 threshold
        let points = engine.process(&sensor_sample("temp", 2000, 100.0));
        assert_eq!(points.len(), 1);
        assert_eq!(field(&points[0], "anomaly"), Some(&FieldValue::Bool(true)));
        assert_eq!(
            field(&points[0], "anomaly_rolling_count"),
            Some(&FieldValue::Int(1))
        );
        assert!(field(&points[0], "z_score").is_some());
    }

    #[test]
    fn duplicate_timestamp_is_skipped() {
        let mut engine = engine(2, 2.0);
        assert_eq!(engine.process(&sensor_sample("temp", 1000, 20.0)).len(), 1);
        assert!(engine.process(&sensor_sample("temp", 1000, 21.0)).is_empty());
        assert_eq!(engine.stats().samples_deduplicated, 1);

        // a fresh timestamp resumes normally
        assert_eq!(engine.process(&sensor_sample("temp", 1001, 21.0)).len(), 1);
    }

    #[test]
    fn malformed_sample_produces_no_points_and_no_window_update() {
        let mut engine = engine(2, 2.0);
        let bad = SignalSample {
            line_name: "L1".to_string(),
            machine_name: "Press03".to_string(),
            signal_key: "spindle_vib".to_string(),
            timestamp: 1000,
            payload: SignalPayload::Vibration {
                rms_x: 0.5,
                rms_y: f64::NAN,
                rms_z: 1.0,
                temperature: 40.0,
            },
        };

        assert!(engine.process(&bad).is_empty());
        assert_eq!(engine.stats().samples_rejected, 1);
        assert_eq!(engine.stats().active_chains, 0);
    }

    #[test]
    fn vibration_axes_score_independently() {
        let mut engine = engine(3, 1.0);
        let sample = |ts: i64, rms_z: f64| SignalSample {
            line_name: "L1".to_string(),
            machine_name: "Press03".to_string(),
            signal_key: "spindle_vib".to_string(),
            timestamp: ts,
            payload: SignalPayload::Vibration {
                rms_x: 0.5,
                rms_y: 0.6,
                rms_z,
                temperature: 40.0,
            },
        };

        engine.process(&sample(1000, 1.0));
        engine.process(&sample(1001, 1.2));
        let points = engine.process(&sample(1002, 50.0));

        // x/y/z/temperature scored plus raw total
        assert_eq!(points.len(), 5);
        let flagged: Vec<_> = points
            .iter()
            .filter(|p| field(p, "anomaly") == Some(&FieldValue::Bool(true)))
            .collect();
        assert_eq!(flagged.len(), 1);
        assert!(flagged[0]
            .tags
            .iter()
            .any(|(k, v)| k == "metric" && v == "z"));
    }

    #[test]
    fn state_sample_writes_integer_raw_point() {
        let mut engine = engine(2, 2.0);
        let sample = SignalSample {
            line_name: String::new(),
            machine_name: String::new(),
            signal_key: "door_state".to_string(),
            timestamp: 1000,
            payload: SignalPayload::State { value: 3 },
        };

        let points = engine.process(&sample);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].measurement, "GenericState");
        assert_eq!(field(&points[0], "value"), Some(&FieldValue::Int(3)));
        // empty identity on the wire falls back to configured identity
        assert!(points[0].tags.iter().any(|(k, v)| k == "line_name" && v == "L1"));
        assert_eq!(engine.stats().active_chains, 0);
    }
}
