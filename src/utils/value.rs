//! Field readers for remote JSON payloads.
//!
//! Every reader has a fallback so a malformed or partial response degrades to
//! empty strings, zero counters or `None` instead of failing the request.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

/// First present key of `keys`, skipping nulls.
pub fn field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| value.get(*k))
        .find(|v| !v.is_null())
}

/// Convert arbitrary JSON values into sanitized strings.
pub fn value_to_string(value: &Value) -> String {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    raw.chars().filter(|c| !c.is_control() || *c == '\n').collect()
}

pub fn string_or_default(value: &Value, keys: &[&str]) -> String {
    field(value, keys).map(value_to_string).unwrap_or_default()
}

pub fn opt_string(value: &Value, keys: &[&str]) -> Option<String> {
    field(value, keys)
        .map(value_to_string)
        .filter(|s| !s.is_empty())
}

/// Non-negative counter; accepts numbers and numeric strings, anything else is 0.
pub fn counter(value: &Value, keys: &[&str]) -> u64 {
    match field(value, keys) {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

pub fn flag(value: &Value, keys: &[&str]) -> bool {
    match field(value, keys) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Timestamps arrive as RFC 3339 strings or as epoch milliseconds.
pub fn timestamp(value: &Value, keys: &[&str]) -> Option<DateTime<Utc>> {
    match field(value, keys)? {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.trim().parse::<i64>().ok().and_then(from_millis)),
        Value::Number(n) => n.as_i64().and_then(from_millis),
        _ => None,
    }
}

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

/// Array under one of `keys`, or an empty slice.
pub fn array<'a>(value: &'a Value, keys: &[&str]) -> &'a [Value] {
    field(value, keys)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}
