//! Air-valve travel-time extraction.
//!
//! Each measurement is tagged `(valve_name, travel kind)`. The pair forms
//! the scored sub-key, so extend and retract travel times — whose
//! distributions differ structurally — never share a window.

use crate::types::{DataError, MetricReading, ValveTravel};

pub fn extract(
    valve_name: &str,
    travel: ValveTravel,
    time_ms: f64,
) -> Result<Vec<MetricReading>, DataError> {
    if !time_ms.is_finite() {
        return Err(DataError::NonFinite {
            sub_key: format!("{valve_name}:{travel}"),
            value: time_ms,
        });
    }
    if time_ms < 0.0 {
        return Err(DataError::NegativeTravelTime {
            valve: valve_name.to_string(),
            time_ms,
        });
    }
    if valve_name.is_empty() {
        return Err(DataError::Malformed {
            family: "valve",
            reason: "empty valve_name".to_string(),
        });
    }

    Ok(vec![MetricReading::scored(
        format!("{valve_name}:{travel}"),
        time_ms,
    )])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extend_and_retract_use_distinct_sub_keys() {
        let extend = extract("V3", ValveTravel::Extend, 500.0).unwrap();
        let retract = extract("V3", ValveTravel::Retract, 650.0).unwrap();
        assert_eq!(extend[0].sub_key, "V3:Extend");
        assert_eq!(retract[0].sub_key, "V3:Retract");
        assert_ne!(extend[0].sub_key, retract[0].sub_key);
    }

    #[test]
    fn negative_travel_time_is_rejected() {
        assert!(matches!(
            extract("V3", ValveTravel::Extend, -1.0),
            Err(DataError::NegativeTravelTime { .. })
        ));
    }

    #[test]
    fn empty_valve_name_is_malformed() {
        assert!(matches!(
            extract("", ValveTravel::Extend, 500.0),
            Err(DataError::Malformed { .. })
        ));
    }
}
