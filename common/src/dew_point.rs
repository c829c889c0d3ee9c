const MAGNUS_A: f32 = 17.27;
const MAGNUS_B: f32 = 237.7;

// Degenerate inputs (non-positive humidity, a vanishing denominator, or any
// non-finite intermediate) return the temperature unchanged.
pub fn dew_point(temperature_c: f32, humidity_pct: f32) -> f32 {
    if humidity_pct.is_nan() || humidity_pct <= 0.0 {
        return temperature_c;
    }

    let alpha = (MAGNUS_A * temperature_c) / (MAGNUS_B + temperature_c) + (humidity_pct / 100.0).ln();
    let denominator = MAGNUS_A - alpha;
    if !alpha.is_finite() || denominator == 0.0 {
        return temperature_c;
    }

    let result = (MAGNUS_B * alpha) / denominator;
    if result.is_finite() {
        result
    } else {
        temperature_c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_positive_humidity_returns_temperature() {
        assert_eq!(dew_point(20.0, 0.0), 20.0);
        assert_eq!(dew_point(-3.5, -12.0), -3.5);
    }

    #[test]
    fn matches_reference_point() {
        let value = dew_point(25.0, 50.0);
        assert!((value - 13.86).abs() < 0.05, "got {value}");
    }

    #[test]
    fn saturated_air_dew_point_equals_temperature() {
        let value = dew_point(18.0, 100.0);
        assert!((value - 18.0).abs() < 0.01, "got {value}");
    }

    #[test]
    fn pole_in_temperature_term_falls_back() {
        // T = -b makes the first Magnus term divide by zero.
        assert_eq!(dew_point(-237.7, 40.0), -237.7);
    }

    #[test]
    fn nan_humidity_falls_back() {
        assert_eq!(dew_point(21.0, f32::NAN), 21.0);
    }
}
