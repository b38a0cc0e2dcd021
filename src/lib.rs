// Library module for testable functions

pub mod ingestion;

use ingestion::utils::python_float_repr;

/// Render a ratio as a percentage label
/// Formula: round(value × 100, 2) followed by `%`, e.g. 0.4567 -> "45.67%"
pub fn format_percentage(value: f64) -> String {
    let scaled = value * 100.0;

    // Array rounding: scale to hundredths, round ties to even, scale back
    let rounded = (scaled * 100.0).round_ties_even() / 100.0;

    format!("{}%", python_float_repr(rounded))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_two_decimals() {
        assert_eq!(format_percentage(0.4567), "45.67%");
    }

    #[test]
    fn test_percentage_rounds() {
        assert_eq!(format_percentage(0.123456), "12.35%");
        assert_eq!(format_percentage(0.0001), "0.01%");
    }

    #[test]
    fn test_percentage_ties_round_on_scaled_value() {
        assert_eq!(format_percentage(0.12345), "12.34%");
        assert_eq!(format_percentage(0.45675), "45.68%");
    }

    #[test]
    fn test_percentage_whole_values_keep_decimal_point() {
        assert_eq!(format_percentage(0.5), "50.0%");
        assert_eq!(format_percentage(1.0), "100.0%");
        assert_eq!(format_percentage(0.0), "0.0%");
    }

    #[test]
    fn test_percentage_negative() {
        assert_eq!(format_percentage(-0.25), "-25.0%");
    }

    #[test]
    fn test_percentage_not_a_number() {
        assert_eq!(format_percentage(f64::NAN), "nan%");
        assert_eq!(format_percentage(f64::INFINITY), "inf%");
    }

    #[test]
    fn test_percentage_huge_value() {
        assert!(format_percentage(1e30).ends_with("e+32%"));
    }
}
