//! Value coercion
//!
//! Pure conversions from source-system strings and attribute values into
//! numbers the protocol accepts. A conversion that fails yields `None`; the
//! caller skips the update.

use serde_json::Value;

pub const TEMP_CELSIUS: &str = "°C";
pub const TEMP_FAHRENHEIT: &str = "°F";

/// Parse a state string into a finite float
///
/// Surrounding whitespace is ignored. Empty, non-numeric and non-finite
/// input yields `None`.
pub fn convert_to_float(state: &str) -> Option<f64> {
    state
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Parse a state string as an integer, `0` when it is not one
pub fn coerce_int(state: &str) -> i64 {
    state.trim().parse::<i64>().unwrap_or(0)
}

/// Float view of an attribute value (number or numeric string)
pub fn value_to_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => convert_to_float(s),
        _ => None,
    }
}

/// Convert a temperature in `unit` to °C, rounded to one decimal
pub fn temperature_to_homekit(temperature: f64, unit: &str) -> f64 {
    let celsius = if unit == TEMP_FAHRENHEIT {
        (temperature - 32.0) / 1.8
    } else {
        temperature
    };
    (celsius * 10.0).round() / 10.0
}

/// Categorical air quality level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AirQuality {
    Unknown = 0,
    Excellent = 1,
    Good = 2,
    Fair = 3,
    Inferior = 4,
    Poor = 5,
}

impl AirQuality {
    pub fn level(&self) -> i64 {
        *self as i64
    }
}

const PM25_BREAKPOINTS: [(f64, AirQuality); 4] = [
    (12.0, AirQuality::Excellent),
    (35.4, AirQuality::Good),
    (55.4, AirQuality::Fair),
    (150.4, AirQuality::Inferior),
];

const PM10_BREAKPOINTS: [(f64, AirQuality); 4] = [
    (54.0, AirQuality::Excellent),
    (154.0, AirQuality::Good),
    (254.0, AirQuality::Fair),
    (354.0, AirQuality::Inferior),
];

fn classify(density: f64, breakpoints: &[(f64, AirQuality)]) -> AirQuality {
    breakpoints
        .iter()
        .find(|(limit, _)| density <= *limit)
        .map_or(AirQuality::Poor, |(_, level)| *level)
}

/// Map fine (PM2.5) and coarse (PM10) densities to an air quality level
///
/// The worse of the two readings wins; with neither present the level is
/// `Unknown`.
pub fn density_to_air_quality(pm25: Option<f64>, pm10: Option<f64>) -> AirQuality {
    let fine = pm25.map(|d| classify(d, &PM25_BREAKPOINTS));
    let coarse = pm10.map(|d| classify(d, &PM10_BREAKPOINTS));
    fine.max(coarse).unwrap_or(AirQuality::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("21.5", Some(21.5))]
    #[case(" 42 ", Some(42.0))]
    #[case("-3", Some(-3.0))]
    #[case("1e3", Some(1000.0))]
    #[case("", None)]
    #[case("unavailable", None)]
    #[case("unknown", None)]
    #[case("NaN", None)]
    #[case("inf", None)]
    fn test_convert_to_float(#[case] state: &str, #[case] expected: Option<f64>) {
        assert_eq!(convert_to_float(state), expected);
    }

    #[rstest]
    #[case("1200", 1200)]
    #[case("0", 0)]
    #[case("12.5", 0)]
    #[case("off", 0)]
    fn test_coerce_int(#[case] state: &str, #[case] expected: i64) {
        assert_eq!(coerce_int(state), expected);
    }

    #[test]
    fn test_value_to_float() {
        assert_eq!(value_to_float(&json!(40)), Some(40.0));
        assert_eq!(value_to_float(&json!("33.3")), Some(33.3));
        assert_eq!(value_to_float(&json!(null)), None);
        assert_eq!(value_to_float(&json!(true)), None);
    }

    #[rstest]
    #[case(20.0, TEMP_CELSIUS, 20.0)]
    #[case(68.0, TEMP_FAHRENHEIT, 20.0)]
    #[case(70.0, TEMP_FAHRENHEIT, 21.1)]
    #[case(21.46, TEMP_CELSIUS, 21.5)]
    fn test_temperature_to_homekit(#[case] value: f64, #[case] unit: &str, #[case] expected: f64) {
        assert!((temperature_to_homekit(value, unit) - expected).abs() < 1e-9);
    }

    #[rstest]
    #[case(None, None, AirQuality::Unknown)]
    #[case(Some(8.0), None, AirQuality::Excellent)]
    #[case(Some(12.0), None, AirQuality::Excellent)]
    #[case(Some(20.0), None, AirQuality::Good)]
    #[case(Some(50.0), None, AirQuality::Fair)]
    #[case(Some(100.0), None, AirQuality::Inferior)]
    #[case(Some(300.0), None, AirQuality::Poor)]
    #[case(None, Some(100.0), AirQuality::Good)]
    #[case(None, Some(400.0), AirQuality::Poor)]
    #[case(Some(8.0), Some(200.0), AirQuality::Fair)]
    #[case(Some(60.0), Some(10.0), AirQuality::Inferior)]
    fn test_density_to_air_quality(
        #[case] pm25: Option<f64>,
        #[case] pm10: Option<f64>,
        #[case] expected: AirQuality,
    ) {
        assert_eq!(density_to_air_quality(pm25, pm10), expected);
    }

    proptest! {
        #[test]
        fn prop_numeric_strings_parse_exactly(value in -1.0e9f64..1.0e9) {
            prop_assert_eq!(convert_to_float(&value.to_string()), Some(value));
        }

        #[test]
        fn prop_non_numeric_strings_yield_none(state in "[a-zA-Z_ ]{0,12}") {
            // "inf"/"nan" spellings parse but are not finite
            prop_assert_eq!(convert_to_float(&state), None);
        }

        #[test]
        fn prop_air_quality_is_monotone_in_pm25(a in 0.0f64..500.0, b in 0.0f64..500.0) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(density_to_air_quality(Some(low), None) <= density_to_air_quality(Some(high), None));
        }
    }
}
