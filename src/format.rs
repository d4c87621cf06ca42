// 💲 Value Formatter - display strings for metric values

/// Shown when a value is missing or undefined
pub const NOT_AVAILABLE: &str = "N/A (Data not available)";

const BILLION: f64 = 1_000_000_000.0;
const MILLION: f64 = 1_000_000.0;

/// Metric names containing "%", "Ratio" or "/" are percentage-like
pub fn is_percentage_metric(metric: &str) -> bool {
    metric.contains('%') || metric.contains("Ratio") || metric.contains('/')
}

/// Format a metric value for display
pub fn format_value(value: Option<f64>, metric: &str) -> String {
    let value = match value {
        Some(v) if !v.is_nan() => v,
        _ => return NOT_AVAILABLE.to_string(),
    };

    if is_percentage_metric(metric) {
        return format!("{:.2}%", value);
    }

    if value.abs() >= BILLION {
        format!("${:.2} Billion", value / BILLION)
    } else if value.abs() >= MILLION {
        format!("${:.2} Million", value / MILLION)
    } else {
        format!("${}", group_thousands(value))
    }
}

/// Two decimals with comma thousands separators: -1234.5 → "-1,234.50"
pub fn group_thousands(value: f64) -> String {
    let fixed = format!("{:.2}", value);
    let (sign, digits) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed.as_str()),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    format!("{sign}{grouped}.{frac_part}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_scales() {
        assert_eq!(format_value(Some(1_500_000_000.0), "Total Revenue"), "$1.50 Billion");
        assert_eq!(format_value(Some(1_000_000_000.0), "Net Income"), "$1.00 Billion");
        assert_eq!(format_value(Some(-2_340_000.0), "Net Income"), "$-2.34 Million");
        assert_eq!(format_value(Some(999_999.0), "Net Income"), "$999,999.00");
        assert_eq!(format_value(Some(12.5), "Total Revenue"), "$12.50");
    }

    #[test]
    fn test_percentage_metrics() {
        assert_eq!(format_value(Some(12.345), "ROA (%)"), "12.35%");
        assert_eq!(format_value(Some(0.8), "CFO / Net Income"), "0.80%");
        assert_eq!(format_value(Some(1.5), "Current Ratio"), "1.50%");
        assert_eq!(format_value(Some(-3.0), "Debt Ratio (%)"), "-3.00%");
    }

    #[test]
    fn test_missing_value() {
        assert_eq!(format_value(None, "ROA (%)"), NOT_AVAILABLE);
        assert_eq!(format_value(Some(f64::NAN), "Total Revenue"), NOT_AVAILABLE);
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(0.0), "0.00");
        assert_eq!(group_thousands(123.456), "123.46");
        assert_eq!(group_thousands(1234.5), "1,234.50");
        assert_eq!(group_thousands(-1234.5), "-1,234.50");
        assert_eq!(group_thousands(123456.0), "123,456.00");
    }
}
