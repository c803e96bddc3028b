//! Scalar values read from the relational source.
//!
//! [`Value`] is the database-agnostic cell type produced by source readers.
//! Conversion into BSON applies the document-side normalizations:
//!
//! - a date-only value becomes a timestamp at midnight UTC
//! - decimals become doubles
//! - times of day become `HH:MM:SS` strings

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use mongodb::bson::{spec::BinarySubtype, Binary, Bson, DateTime as BsonDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// A single relational cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,

    /// Boolean value.
    Bool(bool),

    /// Any integer column (tinyint through bigint).
    Int(i64),

    /// Floating point (float/double).
    Float(f64),

    /// Fixed-point decimal (money columns).
    Decimal(Decimal),

    /// Character data.
    Text(String),

    /// Binary data.
    Bytes(Vec<u8>),

    /// Date without time component.
    Date(NaiveDate),

    /// Timestamp without timezone.
    DateTime(NaiveDateTime),

    /// Time without date component.
    Time(NaiveTime),
}

impl Value {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer view. Decimals with no fractional part are accepted.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Decimal(d) if d.fract().is_zero() => d.to_i64(),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Floating-point view used for monetary and measurement columns.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            Value::Decimal(d) => d.to_f64(),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Boolean view of a 0/1 flag column.
    #[must_use]
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(v) => Some(*v != 0),
            Value::Decimal(d) => Some(!d.is_zero()),
            Value::Bytes(b) => Some(b.iter().any(|byte| *byte != 0)),
            _ => None,
        }
    }

    /// String view.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Timestamp view; dates are widened to midnight.
    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            Value::Date(d) => Some(d.and_time(NaiveTime::MIN)),
            _ => None,
        }
    }

    /// Convert to BSON, unifying date and time types.
    #[must_use]
    pub fn to_bson(&self) -> Bson {
        match self {
            Value::Null => Bson::Null,
            Value::Bool(b) => Bson::Boolean(*b),
            Value::Int(v) => match i32::try_from(*v) {
                Ok(small) => Bson::Int32(small),
                Err(_) => Bson::Int64(*v),
            },
            Value::Float(v) => Bson::Double(*v),
            Value::Decimal(d) => d.to_f64().map(Bson::Double).unwrap_or(Bson::Null),
            Value::Text(s) => Bson::String(s.clone()),
            Value::Bytes(b) => Bson::Binary(Binary {
                subtype: BinarySubtype::Generic,
                bytes: b.clone(),
            }),
            Value::Date(_) | Value::DateTime(_) => self
                .as_timestamp()
                .map(timestamp_to_bson)
                .unwrap_or(Bson::Null),
            Value::Time(t) => Bson::String(t.format("%H:%M:%S").to_string()),
        }
    }
}

/// Store a naive timestamp as a BSON datetime, interpreting it as UTC.
pub fn timestamp_to_bson(ts: NaiveDateTime) -> Bson {
    Bson::DateTime(BsonDateTime::from_millis(ts.and_utc().timestamp_millis()))
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self {
        Value::Time(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
