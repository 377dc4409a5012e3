//! Data types and value conversions.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Accepted textual timestamp layouts, besides RFC 3339.
const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQL data types understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Type of an untyped NULL literal or of a placeholder expression.
    Null,
    Boolean,
    /// 32-bit integers (INT in SQL).
    Int32,
    /// 64-bit integers (BIGINT in SQL).
    Int64,
    /// Floating point numbers (DOUBLE in SQL).
    Float64,
    /// Text/string data.
    Text,
    /// Calendar dates, stored as `YYYY-MM-DD` strings.
    Date,
    /// Timestamps, stored as strings or unix seconds.
    Timestamp,
}

impl DataType {
    /// Check if a non-null JSON value fits this type.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (DataType::Null, Value::Null) => true,
            (DataType::Boolean, Value::Bool(_)) => true,
            (DataType::Int32, Value::Number(n)) => {
                n.as_i64().is_some_and(|i| i32::try_from(i).is_ok())
            }
            (DataType::Int64, Value::Number(n)) => n.as_i64().is_some(),
            (DataType::Float64, Value::Number(_)) => true,
            (DataType::Text, Value::String(_)) => true,
            (DataType::Date, Value::String(_)) => to_date(value).is_ok(),
            (DataType::Timestamp, Value::String(_) | Value::Number(_)) => {
                to_timestamp(value).is_ok()
            }
            _ => false,
        }
    }

    /// Infer the type of a literal value.
    pub fn infer(value: &Value) -> DataType {
        match value {
            Value::Null => DataType::Null,
            Value::Bool(_) => DataType::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => DataType::Int64,
            Value::Number(_) => DataType::Float64,
            _ => DataType::Text,
        }
    }

    /// Get the SQL name for this type.
    pub fn sql_name(&self) -> &'static str {
        match self {
            DataType::Null => "NULL",
            DataType::Boolean => "BOOLEAN",
            DataType::Int32 => "INT",
            DataType::Int64 => "BIGINT",
            DataType::Float64 => "DOUBLE",
            DataType::Text => "TEXT",
            DataType::Date => "DATE",
            DataType::Timestamp => "TIMESTAMP",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int32 | DataType::Int64 | DataType::Float64)
    }

    /// Order two values under this type's semantics. NULL sorts first.
    pub fn compare(&self, a: &Value, b: &Value) -> Result<Ordering> {
        match (a, b) {
            (Value::Null, Value::Null) => return Ok(Ordering::Equal),
            (Value::Null, _) => return Ok(Ordering::Less),
            (_, Value::Null) => return Ok(Ordering::Greater),
            _ => {}
        }

        match self {
            DataType::Timestamp => Ok(to_timestamp(a)?.cmp(&to_timestamp(b)?)),
            DataType::Date => Ok(date_of(a)?.cmp(&date_of(b)?)),
            _ => compare_plain(a, b),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql_name())
    }
}

/// Convert a value to a timestamp.
pub fn to_timestamp(value: &Value) -> Result<NaiveDateTime> {
    match value {
        Value::String(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Ok(dt.naive_utc());
            }
            TIMESTAMP_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
                .ok_or_else(|| Error::type_mismatch(DataType::Timestamp.sql_name(), value))
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|dt| dt.naive_utc())
            .ok_or_else(|| Error::type_mismatch(DataType::Timestamp.sql_name(), value)),
        _ => Err(Error::type_mismatch(DataType::Timestamp.sql_name(), value)),
    }
}

/// Convert a value to a date. Only the `YYYY-MM-DD` layout is accepted.
pub fn to_date(value: &Value) -> Result<NaiveDate> {
    match value {
        Value::String(s) => NaiveDate::parse_from_str(s, DATE_FORMAT)
            .map_err(|_| Error::type_mismatch(DataType::Date.sql_name(), value)),
        _ => Err(Error::type_mismatch(DataType::Date.sql_name(), value)),
    }
}

fn date_of(value: &Value) -> Result<NaiveDate> {
    to_date(value).or_else(|_| to_timestamp(value).map(|ts| ts.date()))
}

fn compare_plain(a: &Value, b: &Value) -> Result<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Ok(x.cmp(&y)),
            _ => {
                let x = x.as_f64().unwrap_or(f64::NAN);
                let y = y.as_f64().unwrap_or(f64::NAN);
                Ok(x.total_cmp(&y))
            }
        },
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Ok(x.cmp(y)),
        (expected, actual) => Err(Error::type_mismatch(
            DataType::infer(expected).sql_name(),
            actual,
        )),
    }
}
