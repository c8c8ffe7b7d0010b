//! Anomaly trend aggregation.
//!
//! Dashboards need to tell an isolated outlier from sustained anomalous
//! behavior. Each signal key keeps a bounded FIFO of its most recent anomaly
//! flags; the rolling count (and ratio once the history is full) is persisted
//! alongside every point.

use std::collections::VecDeque;

/// Bounded FIFO of the last `L` anomaly flags for one signal key.
#[derive(Debug, Clone)]
pub struct TrendWindow {
    flags: VecDeque<bool>,
    list_size: usize,
}

impl TrendWindow {
    /// `list_size` must be >= 1 — enforced by config validation.
    pub fn new(list_size: usize) -> Self {
        debug_assert!(list_size >= 1);
        Self {
            flags: VecDeque::with_capacity(list_size + 1),
            list_size,
        }
    }

    /// Record one flag, evicting the oldest beyond `L`.
    /// Returns the count of anomalous entries currently in the window.
    pub fn record(&mut self, is_anomaly: bool) -> usize {
        self.flags.push_back(is_anomaly);
        if self.flags.len() > self.list_size {
            self.flags.pop_front();
        }
        self.rolling_count()
    }

    /// Anomalous entries currently in the window. Never exceeds `L`.
    pub fn rolling_count(&self) -> usize {
        self.flags.iter().filter(|&&flag| flag).count()
    }

    /// Fraction of the configured history that is anomalous.
    ///
    /// Divides by `L`, not the current fill: during fill-up the ratio
    /// underreports rather than jumping to 1.0 off a single early anomaly.
    pub fn ratio(&self) -> f64 {
        self.rolling_count() as f64 / self.list_size as f64
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}
