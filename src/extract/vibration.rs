//! Vibration sensor extraction.
//!
//! A vibration sample carries RMS acceleration on three axes plus the sensor
//! temperature. Each axis and the temperature get an independent scored
//! sub-key — an outlier on one axis must not influence the others. The total
//! RMS magnitude is derived for dashboards but not scored, since it is fully
//! determined by the axes.

use crate::types::{DataError, MetricReading};

pub const SUB_KEY_X: &str = "x";
pub const SUB_KEY_Y: &str = "y";
pub const SUB_KEY_Z: &str = "z";
pub const SUB_KEY_TEMPERATURE: &str = "temperature";
pub const SUB_KEY_TOTAL: &str = "total";

pub fn extract(
    rms_x: f64,
    rms_y: f64,
    rms_z: f64,
    temperature: f64,
) -> Result<Vec<MetricReading>, DataError> {
    // Validate the whole structure up front: a partially-bad sample must
    // produce zero readings, not mutate some axes and fail on others.
    for (sub_key, value) in [
        (SUB_KEY_X, rms_x),
        (SUB_KEY_Y, rms_y),
        (SUB_KEY_Z, rms_z),
        (SUB_KEY_TEMPERATURE, temperature),
    ] {
        if !value.is_finite() {
            return Err(DataError::NonFinite {
                sub_key: sub_key.to_string(),
                value,
            });
        }
    }

    let total = (rms_x * rms_x + rms_y * rms_y + rms_z * rms_z).sqrt();

    Ok(vec![
        MetricReading::scored(SUB_KEY_X, rms_x),
        MetricReading::scored(SUB_KEY_Y, rms_y),
        MetricReading::scored(SUB_KEY_Z, rms_z),
        MetricReading::scored(SUB_KEY_TEMPERATURE, temperature),
        MetricReading::raw(SUB_KEY_TOTAL, total),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_four_scored_axes_and_raw_total() {
        let readings = extract(0.5, 0.9, 12.0, 40.0).unwrap();
        assert_eq!(readings.len(), 5);

        let scored: Vec<&str> = readings
            .iter()
            .filter(|r| r.scored)
            .map(|r| r.sub_key.as_str())
            .collect();
        assert_eq!(scored, vec!["x", "y", "z", "temperature"]);

        let total = readings.iter().find(|r| r.sub_key == "total").unwrap();
        assert!(!total.scored);
        let expected = (0.25_f64 + 0.81 + 144.0).sqrt();
        assert!((total.value - expected).abs() < 1e-9);
    }

    #[test]
    fn one_bad_axis_drops_the_whole_sample() {
        assert!(extract(0.5, f64::NAN, 1.0, 40.0).is_err());
        assert!(extract(0.5, 0.9, 1.0, f64::INFINITY).is_err());
    }
}
