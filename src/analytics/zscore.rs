//! Z-score classifier.
//!
//! Pure scoring function over a window's mean/stddev — no state, fully
//! deterministic, which makes it the natural unit-test surface for the
//! anomaly boundary.

use serde::Serialize;

/// Outcome of scoring one value against its window statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZScoreResult {
    /// Standard deviations from the window mean. Zero when the window is
    /// degenerate (constant values).
    pub score: f64,
    /// True when `|score|` strictly exceeds the threshold.
    pub is_anomaly: bool,
}

/// Score `value` against `(mean, std_dev)` at `threshold`.
///
/// `std_dev == 0` means a constant window: the score is undefined
/// numerically, and the documented policy is to report `score = 0` and no
/// anomaly rather than manufacture false positives from a degenerate window.
///
/// The boundary is exclusive: `|score| == threshold` is not an anomaly.
pub fn classify(value: f64, mean: f64, std_dev: f64, threshold: f64) -> ZScoreResult {
    if std_dev == 0.0 {
        return ZScoreResult {
            score: 0.0,
            is_anomaly: false,
        };
    }

    let score = (value - mean) / std_dev;
    ZScoreResult {
        score,
        is_anomaly: score.abs() > threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_is_signed_deviations_from_mean() {
        let result = classify(16.0, 10.0, 2.0, 2.5);
        assert_eq!(result.score, 3.0);
        assert!(result.is_anomaly);

        let result = classify(4.0, 10.0, 2.0, 2.5);
        assert_eq!(result.score, -3.0);
        assert!(result.is_anomaly);
    }

    #[test]
    fn boundary_is_exclusive_at_threshold() {
        // |z| = 2.4 -> not an anomaly
        assert!(!classify(14.8, 10.0, 2.0, 2.5).is_anomaly);
        // |z| = 2.5 exactly -> still not an anomaly (> not >=)
        assert!(!classify(15.0, 10.0, 2.0, 2.5).is_anomaly);
        // |z| = 3.0 -> anomaly
        assert!(classify(16.0, 10.0, 2.0, 2.5).is_anomaly);
    }

    #[test]
    fn zero_stddev_is_never_anomalous() {
        for value in [0.0, 10.0, 1e9, -1e9] {
            let result = classify(value, 10.0, 0.0, 0.001);
            assert_eq!(result.score, 0.0);
            assert!(!result.is_anomaly);
        }
    }
}
