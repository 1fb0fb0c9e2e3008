//! Reading loosely-typed record values as the type their field declares.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value;
use tally_core::{FieldDataType, Timestamp};

/// A record or filter value read according to its field's data type.
#[derive(Debug, Clone, PartialEq)]
pub enum Typed {
    Number(f64),
    Instant(Timestamp),
    Bool(bool),
    Text(String),
}

impl Typed {
    /// Read `value` as `data_type`. `None` for null or unreadable values.
    pub fn read(data_type: FieldDataType, value: &Value) -> Option<Self> {
        if value.is_null() {
            return None;
        }
        if data_type.is_numeric() {
            as_number(value).map(Self::Number)
        } else if data_type.is_temporal() {
            as_timestamp(value).map(Self::Instant)
        } else if data_type == FieldDataType::Boolean {
            as_bool(value).map(Self::Bool)
        } else {
            as_text(value).map(Self::Text)
        }
    }

    /// Ordering between two values of the same kind.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.partial_cmp(b),
            (Self::Instant(a), Self::Instant(b)) => Some(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// RFC 3339, `YYYY-MM-DDTHH:MM:SS[.fff]` (read as UTC) or `YYYY-MM-DD` (midnight UTC).
pub fn as_timestamp(value: &Value) -> Option<Timestamp> {
    let text = value.as_str()?.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
}

pub fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

pub fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Equality under the field's data type (`5` equals `5.0` on a number field).
pub fn values_equal(data_type: FieldDataType, a: &Value, b: &Value) -> bool {
    match (Typed::read(data_type, a), Typed::read(data_type, b)) {
        (Some(x), Some(y)) => x.compare(&y) == Some(Ordering::Equal),
        _ => false,
    }
}

/// Total order used for sorting and group ordering: typed comparison, nulls
/// and unreadable values after everything else, then raw JSON text as a tiebreak.
pub fn sort_order(data_type: FieldDataType, a: &Value, b: &Value) -> Ordering {
    match (Typed::read(data_type, a), Typed::read(data_type, b)) {
        (Some(x), Some(y)) => x
            .compare(&y)
            .unwrap_or_else(|| a.to_string().cmp(&b.to_string())),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
