//! Electrical waveform extraction.
//!
//! The gateway delivers per-tick instantaneous current on three phases,
//! gated by the device running state and a synchronization pulse. One duty
//! cycle is bounded by a start transition (stopped -> running) and the
//! matching stop; the PLC guarantees the running state outlasts the sync
//! pulse.
//!
//! Cycle protocol, per tick:
//! - running: append the three phase samples to the accumulator
//! - stopped + sync pulse: clear the accumulator (re-arm for the next cycle)
//! - stopped with samples collected: the cycle just ended — compute the
//!   cycle metrics, emit them, clear the accumulator
//!
//! Cycle metrics per phase: the definite integral of current over the cycle
//! (trapezoidal rule over the sampled series) and the inrush current (the
//! configured peak of the current curve after the start transition). Across
//! phases: the asymmetry, `100 * sum(|I_i - mean|) / mean` of the three
//! integrals. Integral and inrush are scored downstream; asymmetry is
//! persisted raw.

use crate::config::ElectricalConfig;
use crate::types::{DataError, MetricReading};

pub const SUB_KEYS_INTEGRAL: [&str; 3] = ["integral_l1", "integral_l2", "integral_l3"];
pub const SUB_KEYS_INRUSH: [&str; 3] = ["inrush_l1", "inrush_l2", "inrush_l3"];
pub const SUB_KEY_ASYMMETRY: &str = "asymmetry";

/// Accumulates one device's phase currents across a duty cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleAccumulator {
    phases: [Vec<f64>; 3],
}

impl CycleAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples collected so far in the open cycle.
    pub fn len(&self) -> usize {
        self.phases[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases[0].is_empty()
    }

    /// Advance the accumulator by one gateway tick.
    ///
    /// Returns the cycle metrics when this tick closed a cycle, otherwise an
    /// empty vec. A non-finite current drops the tick without touching the
    /// accumulated series.
    pub fn tick(
        &mut self,
        device_state: bool,
        synch_pulse: bool,
        currents: [f64; 3],
        cfg: &ElectricalConfig,
    ) -> Result<Vec<MetricReading>, DataError> {
        if device_state {
            for (phase, &current) in SUB_KEYS_INTEGRAL.iter().zip(currents.iter()) {
                if !current.is_finite() {
                    return Err(DataError::NonFinite {
                        sub_key: (*phase).to_string(),
                        value: current,
                    });
                }
            }
            for (series, current) in self.phases.iter_mut().zip(currents) {
                series.push(current);
            }
            return Ok(Vec::new());
        }

        if synch_pulse {
            self.clear();
            return Ok(Vec::new());
        }

        if self.is_empty() {
            return Ok(Vec::new());
        }

        let readings = self.close_cycle(cfg);
        self.clear();
        Ok(readings)
    }

    fn clear(&mut self) {
        for series in &mut self.phases {
            series.clear();
        }
    }

    fn close_cycle(&self, cfg: &ElectricalConfig) -> Vec<MetricReading> {
        let integrals: Vec<f64> = self.phases.iter().map(|s| trapezoid(s)).collect();

        let mut readings = Vec::with_capacity(7);
        for (sub_key, &integral) in SUB_KEYS_INTEGRAL.iter().zip(integrals.iter()) {
            readings.push(MetricReading::scored(*sub_key, integral));
        }

        // Asymmetry is undefined for an all-zero cycle; skip rather than
        // divide by zero. The integrals still go out.
        if let Some(asymmetry) = asymmetry(&integrals) {
            readings.push(MetricReading::raw(SUB_KEY_ASYMMETRY, asymmetry));
        }

        for (sub_key, series) in SUB_KEYS_INRUSH.iter().zip(self.phases.iter()) {
            // No qualifying peak means no inrush reading for this phase —
            // a short or soft-started cycle, not an error.
            if let Some(inrush) = inrush_current(series, cfg) {
                readings.push(MetricReading::scored(*sub_key, inrush));
            }
        }

        readings
    }
}

/// Trapezoidal definite integral over a unit-spaced sample series.
fn trapezoid(samples: &[f64]) -> f64 {
    match samples {
        [] => 0.0,
        [only] => *only,
        [first, .., last] => {
            let sum: f64 = samples.iter().sum();
            sum - (first + last) / 2.0
        }
    }
}

/// Normalized deviation of the three phase integrals from their mean, in
/// percent. `None` when the mean is zero.
fn asymmetry(integrals: &[f64]) -> Option<f64> {
    let mean = integrals.iter().sum::<f64>() / integrals.len() as f64;
    if mean.abs() < f64::EPSILON {
        return None;
    }
    let deviation: f64 = integrals.iter().map(|i| (i - mean).abs()).sum();
    Some(100.0 * deviation / mean)
}

/// The inrush current of a cycle: the value at the `current_peak_number`-th
/// local maximum at or above `current_peak_height`, counting from the start
/// transition.
fn inrush_current(samples: &[f64], cfg: &ElectricalConfig) -> Option<f64> {
    let peaks = find_peaks(samples, cfg.current_peak_height);
    peaks.get(cfg.current_peak_number - 1).map(|&i| samples[i])
}

/// Indices of local maxima at or above `height`. Endpoints never qualify —
/// a peak needs a lower neighbor on both sides.
fn find_peaks(samples: &[f64], height: f64) -> Vec<usize> {
    let mut peaks = Vec::new();
    for i in 1..samples.len().saturating_sub(1) {
        if samples[i] > samples[i - 1] && samples[i] > samples[i + 1] && samples[i] >= height {
            peaks.push(i);
        }
    }
    peaks
}
