//! Lenient conversions from loosely typed JSON values.

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde_json::Value;

/// Numbers and numeric strings become decimals. Booleans do not.
pub fn to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => decimal_from_str(&n.to_string())
            .or_else(|| n.as_f64().and_then(Decimal::from_f64)),
        Value::String(s) => decimal_from_str(s.trim()),
        _ => None,
    }
}

fn decimal_from_str(raw: &str) -> Option<Decimal> {
    if raw.is_empty() {
        return None;
    }
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
        .map(|d| d.normalize())
}

/// Positive whole numbers, as JSON integers, integral floats or digit strings.
pub fn to_id(value: &Value) -> Option<i64> {
    let id = match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().trim_start_matches('#').parse::<i64>().ok(),
        _ => None,
    }?;
    (id > 0).then_some(id)
}

/// Trimmed, non-empty string content.
pub fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().map(str::trim).filter(|s| !s.is_empty())
}

/// Human rendering of a decimal without trailing zeros.
pub fn fmt_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_to_decimal_numbers() {
        assert_eq!(to_decimal(&json!(18500)), Some(dec!(18500)));
        assert_eq!(to_decimal(&json!(18500.0)), Some(dec!(18500)));
        assert_eq!(to_decimal(&json!(1.0950)), Some(dec!(1.095)));
        assert_eq!(to_decimal(&json!(-5)), Some(dec!(-5)));
    }

    #[test]
    fn test_to_decimal_strings() {
        assert_eq!(to_decimal(&json!(" 0.5 ")), Some(dec!(0.5)));
        assert_eq!(to_decimal(&json!("1e3")), Some(dec!(1000)));
        assert_eq!(to_decimal(&json!("abc")), None);
        assert_eq!(to_decimal(&json!("")), None);
    }

    #[test]
    fn test_to_decimal_rejects_other_types() {
        assert_eq!(to_decimal(&json!(true)), None);
        assert_eq!(to_decimal(&Value::Null), None);
        assert_eq!(to_decimal(&json!([1])), None);
    }

    #[test]
    fn test_to_id() {
        assert_eq!(to_id(&json!(12)), Some(12));
        assert_eq!(to_id(&json!(12.0)), Some(12));
        assert_eq!(to_id(&json!("#7")), Some(7));
        assert_eq!(to_id(&json!(1.5)), None);
        assert_eq!(to_id(&json!(0)), None);
        assert_eq!(to_id(&json!("DAX")), None);
    }

    #[test]
    fn test_non_empty_str() {
        assert_eq!(non_empty_str(&json!("  DAX ")), Some("DAX"));
        assert_eq!(non_empty_str(&json!("   ")), None);
        assert_eq!(non_empty_str(&json!(5)), None);
    }

    #[test]
    fn test_fmt_decimal() {
        assert_eq!(fmt_decimal(dec!(18500.00)), "18500");
        assert_eq!(fmt_decimal(dec!(1.2500)), "1.25");
    }
}
