use serde_json::Value;

/// Decimal degrees written either as a JSON number or as a string using a
/// comma or dot as the decimal separator.
pub fn parse_decimal(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

pub fn parse_number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

/// Epoch milliseconds from an integer, a float, or a numeric string.
pub fn parse_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))
        }
        _ => None,
    }
}

/// Vehicle and route identifiers show up as strings or bare numbers.
pub fn parse_identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn valid_coordinates(latitude: f64, longitude: f64) -> bool {
    (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_both_decimal_separators() {
        assert_eq!(parse_decimal(&json!("-22,90685")), Some(-22.90685));
        assert_eq!(parse_decimal(&json!("-43.17207")), Some(-43.17207));
        assert_eq!(parse_decimal(&json!(-22.5)), Some(-22.5));
        assert_eq!(parse_decimal(&json!("abc")), None);
        assert_eq!(parse_decimal(&json!(null)), None);
        assert_eq!(parse_decimal(&json!("NaN")), None);
    }

    #[test]
    fn millis_from_numbers_and_strings() {
        assert_eq!(parse_millis(&json!(1715846400000_i64)), Some(1715846400000));
        assert_eq!(parse_millis(&json!("1715846400000")), Some(1715846400000));
        assert_eq!(parse_millis(&json!(1715846400000.0)), Some(1715846400000));
        assert_eq!(parse_millis(&json!("soon")), None);
    }

    #[test]
    fn identifiers_from_strings_or_numbers() {
        assert_eq!(parse_identifier(&json!("B32557")), Some("B32557".to_string()));
        assert_eq!(parse_identifier(&json!(483)), Some("483".to_string()));
        assert_eq!(parse_identifier(&json!("  ")), None);
        assert_eq!(parse_identifier(&json!(null)), None);
    }

    #[test]
    fn coordinate_ranges() {
        assert!(valid_coordinates(-22.9, -43.2));
        assert!(!valid_coordinates(91.0, 0.0));
        assert!(!valid_coordinates(0.0, -181.0));
    }
}
