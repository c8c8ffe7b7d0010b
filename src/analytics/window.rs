//! Per-signal sliding-window statistics model.
//!
//! A `WindowModel` holds the last `W` retained values for one signal key and
//! recomputes mean and standard deviation over the current buffer contents on
//! every observation. Models are created lazily on the first sample for a key
//! and live for the process lifetime — there is no cross-restart persistence,
//! so every restart re-warms from an empty window.

use std::collections::VecDeque;

use statrs::statistics::Statistics;

use crate::types::DataError;

/// Snapshot of the window after an observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    pub mean: f64,
    /// Sample (n-1) standard deviation over current window contents.
    pub std_dev: f64,
    /// True once the window holds its full `W` samples. No anomaly is ever
    /// flagged before this.
    pub is_warm: bool,
}

/// Fixed-size FIFO sample window with mean/stddev over its contents.
#[derive(Debug, Clone)]
pub struct WindowModel {
    values: VecDeque<f64>,
    window_size: usize,
}

impl WindowModel {
    /// `window_size` must be >= 2 — enforced by config validation before any
    /// model is built.
    pub fn new(window_size: usize) -> Self {
        debug_assert!(window_size >= 2);
        Self {
            values: VecDeque::with_capacity(window_size + 1),
            window_size,
        }
    }

    /// Observe one value: push, evict the oldest beyond `W`, recompute.
    ///
    /// Non-finite values are rejected before insertion — a single NaN in the
    /// buffer would poison every later mean/stddev for this key.
    pub fn observe(&mut self, sub_key: &str, value: f64) -> Result<WindowStats, DataError> {
        if !value.is_finite() {
            return Err(DataError::NonFinite {
                sub_key: sub_key.to_string(),
                value,
            });
        }

        self.values.push_back(value);
        if self.values.len() > self.window_size {
            self.values.pop_front();
        }

        Ok(self.stats())
    }

    /// Current statistics without observing a new value.
    pub fn stats(&self) -> WindowStats {
        let n = self.values.len();
        if n == 0 {
            return WindowStats {
                mean: 0.0,
                std_dev: 0.0,
                is_warm: false,
            };
        }

        let mean = self.values.iter().copied().mean();
        let std_dev = if n < 2 {
            0.0
        } else {
            self.values.iter().copied().std_dev()
        };

        WindowStats {
            mean,
            std_dev,
            is_warm: n >= self.window_size,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Window contents in insertion order, oldest first.
    #[cfg(test)]
    pub fn contents(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_cold_below_window_size() {
        let mut model = WindowModel::new(5);
        for value in [10.0, 11.0, 9.0, 10.5] {
            let stats = model.observe("k", value).unwrap();
            assert!(!stats.is_warm);
        }
        assert_eq!(model.len(), 4);
    }

    #[test]
    fn warms_at_exactly_window_size() {
        let mut model = WindowModel::new(3);
        assert!(!model.observe("k", 1.0).unwrap().is_warm);
        assert!(!model.observe("k", 2.0).unwrap().is_warm);
        assert!(model.observe("k", 3.0).unwrap().is_warm);
    }

    #[test]
    fn evicts_oldest_beyond_window_size() {
        let mut model = WindowModel::new(5);
        for value in [10.0, 10.0, 10.0, 10.0, 10.0] {
            model.observe("k", value).unwrap();
        }
        let stats = model.observe("k", 15.0).unwrap();

        // window now holds [10, 10, 10, 10, 15]
        assert_eq!(model.contents(), vec![10.0, 10.0, 10.0, 10.0, 15.0]);
        assert!(stats.is_warm);
        assert!((stats.mean - 11.0).abs() < 1e-9);
        // sample stddev of [10,10,10,10,15] = sqrt(20/4) = sqrt(5)
        assert!((stats.std_dev - 5.0_f64.sqrt()).abs() < 1e-9);

        // the now-warm model keeps sliding
        let stats = model.observe("k", 10.0).unwrap();
        assert_eq!(model.contents(), vec![10.0, 10.0, 10.0, 15.0, 10.0]);
        assert!(stats.is_warm);
    }

    #[test]
    fn constant_window_has_zero_stddev() {
        let mut model = WindowModel::new(4);
        let mut stats = model.stats();
        for _ in 0..6 {
            stats = model.observe("k", 7.5).unwrap();
        }
        assert_eq!(stats.std_dev, 0.0);
        assert_eq!(stats.mean, 7.5);
    }

    #[test]
    fn non_finite_values_are_rejected_and_not_inserted() {
        let mut model = WindowModel::new(3);
        model.observe("k", 1.0).unwrap();

        assert!(model.observe("k", f64::NAN).is_err());
        assert!(model.observe("k", f64::INFINITY).is_err());
        assert!(model.observe("k", f64::NEG_INFINITY).is_err());

        // rejected values neither count nor evict
        assert_eq!(model.len(), 1);
        assert_eq!(model.contents(), vec![1.0]);
    }
}
