//! Conversion of raw CSV fields into typed values

use chrono::NaiveDateTime;

use super::reader::Value;
use crate::db::schema::SqlType;
use crate::error::LoadError;

/// Timestamp layouts accepted for timestamp columns
const TIMESTAMP_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",    // 2021-01-01 00:30:10
    "%Y-%m-%dT%H:%M:%S",    // ISO 8601
    "%Y-%m-%d %H:%M:%S%.f", // With fractional seconds
    "%Y-%m-%dT%H:%M:%S%.f", // ISO 8601 with fractional seconds
    "%Y-%m-%d %H:%M",       // Without seconds
    "%m/%d/%Y %H:%M:%S",    // US format with time
];

/// Tokens read as missing values in every column, whatever its type
const NA_TOKENS: [&str; 18] = [
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Where a field sits in the source, for error messages
pub struct FieldPosition<'a> {
    pub line: u64,
    pub column: &'a str,
}

/// Convert a raw field to its declared type.
///
/// Empty fields and NA tokens are absent values for every type. Whitespace-only
/// fields are absent too, except in text columns where they are kept as is.
pub fn convert_field(
    raw: &str,
    sql_type: SqlType,
    position: &FieldPosition<'_>,
) -> Result<Value, LoadError> {
    let trimmed = raw.trim();
    let mismatch = || LoadError::TypeCoercion {
        line: position.line,
        column: position.column.to_string(),
        expected: sql_type.to_postgres(),
        value: raw.to_string(),
    };

    let absent = match sql_type {
        SqlType::Text => raw.is_empty() || NA_TOKENS.contains(&raw),
        _ => trimmed.is_empty() || NA_TOKENS.contains(&trimmed),
    };
    if absent {
        return Ok(null_of(sql_type));
    }

    match sql_type {
        SqlType::BigInt => parse_integer(trimmed)
            .map(|v| Value::Int(Some(v)))
            .ok_or_else(mismatch),
        SqlType::DoublePrecision => trimmed
            .parse::<f64>()
            .map(|v| Value::Float(Some(v)))
            .map_err(|_| mismatch()),
        SqlType::Text => Ok(Value::Text(Some(raw.to_string()))),
        SqlType::Timestamp => parse_timestamp(trimmed)
            .map(|v| Value::Timestamp(Some(v)))
            .ok_or_else(mismatch),
    }
}

fn null_of(sql_type: SqlType) -> Value {
    match sql_type {
        SqlType::BigInt => Value::Int(None),
        SqlType::DoublePrecision => Value::Float(None),
        SqlType::Text => Value::Text(None),
        SqlType::Timestamp => Value::Timestamp(None),
    }
}

/// Integers, plus floats with no fractional part (`1.0`) that fit in an i64
fn parse_integer(value: &str) -> Option<i64> {
    if let Ok(v) = value.parse::<i64>() {
        return Some(v);
    }
    let v = value.parse::<f64>().ok()?;
    // 2^63 is exactly representable; anything at or above it overflows
    if v.is_finite() && v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}
