//! Value coercion for filter rules and filter documents.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::domain::errors::ValidationError;
use crate::domain::field::{FieldKind, is_integer_field};
use crate::domain::predicate::FilterValue;

/// Coerce a rule value (always submitted as text) to the declared type of `field`.
pub fn coerce_text(field: &str, kind: FieldKind, raw: &str) -> Result<FilterValue, ValidationError> {
    match kind {
        FieldKind::Numeric => coerce_number(field, raw).map(FilterValue::Number),
        FieldKind::Date => coerce_date(field, raw).map(FilterValue::Date),
        FieldKind::Text => Ok(FilterValue::Text(raw.to_string())),
    }
}

/// Parse a number, tolerating surrounding whitespace and quotes (`"1000"`, `'5'`).
///
/// Count fields (`visits`, `orders`) are floored.
pub fn coerce_number(field: &str, raw: &str) -> Result<f64, ValidationError> {
    let cleaned = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    let parsed = cleaned
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| invalid(field, raw, FieldKind::Numeric))?;
    Ok(normalize_number(field, parsed))
}

/// Parse a date: RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS` (taken as UTC), or a bare `YYYY-MM-DD`.
pub fn coerce_date(field: &str, raw: &str) -> Result<DateTime<Utc>, ValidationError> {
    let cleaned = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(cleaned) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(cleaned, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    NaiveDate::parse_from_str(cleaned, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| invalid(field, raw, FieldKind::Date))
}

/// Coerce a JSON value taken from a filter document.
///
/// Fields in the type table are coerced to their declared type. Other fields
/// (identity, contact, custom attributes) keep the JSON type they arrived with.
pub fn coerce_json(field: &str, value: &Value) -> Result<FilterValue, ValidationError> {
    match FieldKind::of(field) {
        Some(FieldKind::Numeric) => match value {
            Value::Number(n) => n
                .as_f64()
                .map(|n| FilterValue::Number(normalize_number(field, n)))
                .ok_or_else(|| invalid(field, &value.to_string(), FieldKind::Numeric)),
            Value::String(s) => coerce_number(field, s).map(FilterValue::Number),
            other => Err(invalid(field, &other.to_string(), FieldKind::Numeric)),
        },
        Some(FieldKind::Date) => match value {
            Value::String(s) => coerce_date(field, s).map(FilterValue::Date),
            Value::Number(n) => n
                .as_i64()
                .and_then(DateTime::from_timestamp_millis)
                .map(FilterValue::Date)
                .ok_or_else(|| invalid(field, &value.to_string(), FieldKind::Date)),
            Value::Object(_) => match extended_date(value) {
                Some(s) => coerce_date(field, s).map(FilterValue::Date),
                None => Err(invalid(field, &value.to_string(), FieldKind::Date)),
            },
            other => Err(invalid(field, &other.to_string(), FieldKind::Date)),
        },
        Some(FieldKind::Text) => match value {
            Value::String(s) => Ok(FilterValue::Text(s.clone())),
            Value::Number(n) => Ok(FilterValue::Text(n.to_string())),
            Value::Bool(b) => Ok(FilterValue::Text(b.to_string())),
            other => Err(invalid(field, &other.to_string(), FieldKind::Text)),
        },
        None => match value {
            Value::String(s) => Ok(FilterValue::Text(s.clone())),
            Value::Bool(b) => Ok(FilterValue::Bool(*b)),
            Value::Number(n) => n
                .as_f64()
                .map(FilterValue::Number)
                .ok_or_else(|| untyped(field, value)),
            Value::Object(_) => extended_date(value)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|d| FilterValue::Date(d.with_timezone(&Utc)))
                .ok_or_else(|| untyped(field, value)),
            _ => Err(untyped(field, value)),
        },
    }
}

/// `{"$date": "..."}` literal, if `value` is one.
pub fn extended_date(value: &Value) -> Option<&str> {
    let obj = value.as_object()?;
    if obj.len() != 1 {
        return None;
    }
    obj.get("$date").and_then(Value::as_str)
}

fn normalize_number(field: &str, n: f64) -> f64 {
    if is_integer_field(field) { n.floor() } else { n }
}

fn invalid(field: &str, raw: &str, kind: FieldKind) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        value: raw.to_string(),
        kind: kind.name(),
    }
}

fn untyped(field: &str, value: &Value) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        kind: "scalar",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("spend", "1000", 1000.0)]
    #[case("spend", " \"1500.5\" ", 1500.5)]
    #[case("clv", "'12'", 12.0)]
    #[case("visits", "4.9", 4.0)]
    #[case("orders", "\"2.2\"", 2.0)]
    fn numbers(#[case] field: &str, #[case] raw: &str, #[case] expected: f64) {
        assert_eq!(coerce_number(field, raw).unwrap(), expected);
    }

    #[rstest]
    #[case("abc")]
    #[case("")]
    #[case("NaN")]
    #[case("inf")]
    fn rejects_non_numbers(#[case] raw: &str) {
        let err = coerce_number("spend", raw).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { kind: "numeric", .. }));
    }

    #[rstest]
    #[case("2024-01-01")]
    #[case("2024-01-01T00:00:00Z")]
    #[case("2024-01-01T00:00:00")]
    #[case("2024-01-01T02:00:00+02:00")]
    fn dates(#[case] raw: &str) {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(coerce_date("lastActive", raw).unwrap(), expected);
    }

    #[test]
    fn rejects_bad_date() {
        let err = coerce_date("lastActive", "yesterday").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { kind: "date", .. }));
    }

    #[test]
    fn json_values_follow_field_table() {
        assert_eq!(coerce_json("spend", &json!("\"10\"")).unwrap(), FilterValue::Number(10.0));
        assert_eq!(coerce_json("orders", &json!(2.7)).unwrap(), FilterValue::Number(2.0));
        assert!(matches!(
            coerce_json("lastActive", &json!({"$date": "2024-01-01T00:00:00.000Z"})).unwrap(),
            FilterValue::Date(_)
        ));
        assert_eq!(coerce_json("source", &json!(7)).unwrap(), FilterValue::Text("7".into()));
        assert_eq!(coerce_json("subscribed", &json!(true)).unwrap(), FilterValue::Bool(true));
        assert!(coerce_json("email", &Value::Null).is_err());
    }
}
