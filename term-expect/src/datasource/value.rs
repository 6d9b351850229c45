//! Scalar values used as partition keys and expectation bounds.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use datafusion::scalar::ScalarValue;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Result, TermError};
use crate::security::SqlSecurity;

/// A single comparable value read from a backend.
///
/// Values are totally ordered so partition enumeration and sorting are
/// deterministic: `Null` sorts first, integers and floats compare
/// numerically with each other, and values of unrelated kinds fall back to
/// a fixed kind order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Text(String),
}

impl KeyValue {
    fn kind_rank(&self) -> u8 {
        match self {
            KeyValue::Null => 0,
            KeyValue::Boolean(_) => 1,
            KeyValue::Integer(_) | KeyValue::Float(_) => 2,
            KeyValue::Date(_) => 3,
            KeyValue::Timestamp(_) => 4,
            KeyValue::Text(_) => 5,
        }
    }

    /// Returns true for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, KeyValue::Null)
    }

    /// Returns true for integers and floats.
    pub fn is_numeric(&self) -> bool {
        matches!(self, KeyValue::Integer(_) | KeyValue::Float(_))
    }

    /// Returns the value as f64 if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            KeyValue::Integer(v) => Some(*v as f64),
            KeyValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value as i64 if it is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            KeyValue::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Compares two values only when they belong to comparable families.
    ///
    /// Numbers compare with numbers, dates and timestamps compare with each
    /// other (a date is midnight of that day), text with text and booleans
    /// with booleans. Anything else yields `None`.
    pub fn partial_compare(&self, other: &KeyValue) -> Option<Ordering> {
        match (self, other) {
            (KeyValue::Integer(a), KeyValue::Integer(b)) => Some(a.cmp(b)),
            (a, b) if a.is_numeric() && b.is_numeric() => {
                Some(a.as_f64()?.total_cmp(&b.as_f64()?))
            }
            (KeyValue::Date(a), KeyValue::Date(b)) => Some(a.cmp(b)),
            (KeyValue::Timestamp(a), KeyValue::Timestamp(b)) => Some(a.cmp(b)),
            (KeyValue::Date(a), KeyValue::Timestamp(b)) => {
                Some(a.and_hms_opt(0, 0, 0)?.cmp(b))
            }
            (KeyValue::Timestamp(a), KeyValue::Date(b)) => {
                Some(a.cmp(&b.and_hms_opt(0, 0, 0)?))
            }
            (KeyValue::Text(a), KeyValue::Text(b)) => Some(a.cmp(b)),
            (KeyValue::Boolean(a), KeyValue::Boolean(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// True when this partition value satisfies a requested option.
    ///
    /// String columns and regex captures yield `Text` partitions, while a
    /// JSON option such as `"2023-01-01"` or `"42"` may parse as a typed
    /// value. When exactly one side is text it is parsed into the other
    /// side's kind before comparing.
    pub fn matches_option(&self, option: &KeyValue) -> bool {
        if self == option {
            return true;
        }
        match (self, option) {
            (KeyValue::Text(text), other) | (other, KeyValue::Text(text)) => {
                KeyValue::parse_like(text, other).is_some_and(|parsed| &parsed == other)
            }
            _ => false,
        }
    }

    /// Parses `text` as a value of the same kind as `like`.
    fn parse_like(text: &str, like: &KeyValue) -> Option<KeyValue> {
        match like {
            KeyValue::Boolean(_) => text.parse().ok().map(KeyValue::Boolean),
            KeyValue::Integer(_) => text.parse().ok().map(KeyValue::Integer),
            KeyValue::Float(_) => text.parse().ok().map(KeyValue::Float),
            KeyValue::Date(_) => NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .map(KeyValue::Date),
            KeyValue::Timestamp(_) => text
                .parse::<NaiveDateTime>()
                .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
                .ok()
                .map(KeyValue::Timestamp),
            KeyValue::Null | KeyValue::Text(_) => None,
        }
    }

    /// Converts a DataFusion scalar into a key value.
    pub fn from_scalar(scalar: &ScalarValue) -> Result<Self> {
        if scalar.is_null() {
            return Ok(KeyValue::Null);
        }
        let value = match scalar {
            ScalarValue::Boolean(Some(v)) => KeyValue::Boolean(*v),
            ScalarValue::Int8(Some(v)) => KeyValue::Integer(i64::from(*v)),
            ScalarValue::Int16(Some(v)) => KeyValue::Integer(i64::from(*v)),
            ScalarValue::Int32(Some(v)) => KeyValue::Integer(i64::from(*v)),
            ScalarValue::Int64(Some(v)) => KeyValue::Integer(*v),
            ScalarValue::UInt8(Some(v)) => KeyValue::Integer(i64::from(*v)),
            ScalarValue::UInt16(Some(v)) => KeyValue::Integer(i64::from(*v)),
            ScalarValue::UInt32(Some(v)) => KeyValue::Integer(i64::from(*v)),
            ScalarValue::UInt64(Some(v)) => {
                KeyValue::Integer(i64::try_from(*v).map_err(|_| TermError::TypeMismatch {
                    expected: "integer within i64 range".to_string(),
                    found: v.to_string(),
                })?)
            }
            ScalarValue::Float32(Some(v)) => KeyValue::Float(f64::from(*v)),
            ScalarValue::Float64(Some(v)) => KeyValue::Float(*v),
            ScalarValue::Utf8(Some(v))
            | ScalarValue::LargeUtf8(Some(v))
            | ScalarValue::Utf8View(Some(v)) => KeyValue::Text(v.clone()),
            ScalarValue::Date32(Some(days)) => KeyValue::Date(date_from_days(i64::from(*days))?),
            ScalarValue::Date64(Some(millis)) => {
                KeyValue::Date(timestamp_from_units(*millis, 1_000)?.date())
            }
            ScalarValue::TimestampSecond(Some(v), _) => {
                KeyValue::Timestamp(timestamp_from_units(*v, 1)?)
            }
            ScalarValue::TimestampMillisecond(Some(v), _) => {
                KeyValue::Timestamp(timestamp_from_units(*v, 1_000)?)
            }
            ScalarValue::TimestampMicrosecond(Some(v), _) => {
                KeyValue::Timestamp(timestamp_from_units(*v, 1_000_000)?)
            }
            ScalarValue::TimestampNanosecond(Some(v), _) => {
                KeyValue::Timestamp(timestamp_from_units(*v, 1_000_000_000)?)
            }
            other => {
                return Err(TermError::TypeMismatch {
                    expected: "boolean, numeric, string, date or timestamp".to_string(),
                    found: other.data_type().to_string(),
                })
            }
        };
        Ok(value)
    }

    /// Renders the value as a SQL literal.
    pub fn to_sql_literal(&self) -> String {
        match self {
            KeyValue::Null => "NULL".to_string(),
            KeyValue::Boolean(v) => v.to_string(),
            KeyValue::Integer(v) => v.to_string(),
            KeyValue::Float(v) if v.is_nan() => "CAST('NaN' AS DOUBLE)".to_string(),
            KeyValue::Float(v) if v.is_infinite() => {
                let sign = if v.is_sign_negative() { "-" } else { "" };
                format!("CAST('{sign}inf' AS DOUBLE)")
            }
            KeyValue::Float(v) => format!("{v:?}"),
            KeyValue::Date(v) => format!("DATE '{}'", v.format("%Y-%m-%d")),
            KeyValue::Timestamp(v) => {
                format!("TIMESTAMP '{}'", v.format("%Y-%m-%dT%H:%M:%S%.f"))
            }
            KeyValue::Text(v) => SqlSecurity::escape_literal(v),
        }
    }
}

fn date_from_days(days: i64) -> Result<NaiveDate> {
    DateTime::from_timestamp(days * 86_400, 0)
        .map(|dt| dt.date_naive())
        .ok_or_else(|| TermError::Internal(format!("date out of range: {days} days")))
}

fn timestamp_from_units(value: i64, units_per_second: i64) -> Result<NaiveDateTime> {
    let secs = value.div_euclid(units_per_second);
    let nanos = value.rem_euclid(units_per_second) * (1_000_000_000 / units_per_second);
    DateTime::from_timestamp(secs, nanos as u32)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| TermError::Internal(format!("timestamp out of range: {value}")))
}

impl Ord for KeyValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (KeyValue::Null, KeyValue::Null) => Ordering::Equal,
            (KeyValue::Boolean(a), KeyValue::Boolean(b)) => a.cmp(b),
            (KeyValue::Integer(a), KeyValue::Integer(b)) => a.cmp(b),
            (KeyValue::Float(a), KeyValue::Float(b)) => a.total_cmp(b),
            (KeyValue::Integer(a), KeyValue::Float(b)) => (*a as f64).total_cmp(b),
            (KeyValue::Float(a), KeyValue::Integer(b)) => a.total_cmp(&(*b as f64)),
            (KeyValue::Date(a), KeyValue::Date(b)) => a.cmp(b),
            (KeyValue::Timestamp(a), KeyValue::Timestamp(b)) => a.cmp(b),
            (KeyValue::Text(a), KeyValue::Text(b)) => a.cmp(b),
            (a, b) => a.kind_rank().cmp(&b.kind_rank()),
        }
    }
}

impl PartialOrd for KeyValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for KeyValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyValue {}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Null => write!(f, "null"),
            KeyValue::Boolean(v) => write!(f, "{v}"),
            KeyValue::Integer(v) => write!(f, "{v}"),
            KeyValue::Float(v) => write!(f, "{v}"),
            KeyValue::Date(v) => write!(f, "{v}"),
            KeyValue::Timestamp(v) => write!(f, "{v}"),
            KeyValue::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for KeyValue {
    fn from(value: i64) -> Self {
        KeyValue::Integer(value)
    }
}

impl From<i32> for KeyValue {
    fn from(value: i32) -> Self {
        KeyValue::Integer(i64::from(value))
    }
}

impl From<f64> for KeyValue {
    fn from(value: f64) -> Self {
        KeyValue::Float(value)
    }
}

impl From<bool> for KeyValue {
    fn from(value: bool) -> Self {
        KeyValue::Boolean(value)
    }
}

impl From<&str> for KeyValue {
    fn from(value: &str) -> Self {
        KeyValue::Text(value.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(value: String) -> Self {
        KeyValue::Text(value)
    }
}

impl From<NaiveDate> for KeyValue {
    fn from(value: NaiveDate) -> Self {
        KeyValue::Date(value)
    }
}

impl From<NaiveDateTime> for KeyValue {
    fn from(value: NaiveDateTime) -> Self {
        KeyValue::Timestamp(value)
    }
}

/// One enumerated partition: a mapping from dimension name to value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionKey(BTreeMap<String, KeyValue>);

impl PartitionKey {
    /// Creates an empty key, the single partition of an unsplit asset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a key from `(dimension, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<KeyValue>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Adds or replaces one dimension.
    pub fn insert(&mut self, dimension: impl Into<String>, value: KeyValue) {
        self.0.insert(dimension.into(), value);
    }

    /// Returns the value of a dimension.
    pub fn get(&self, dimension: &str) -> Option<&KeyValue> {
        self.0.get(dimension)
    }

    /// Iterates dimensions in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &KeyValue)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Compares two keys dimension by dimension in the given order.
    pub fn cmp_by(&self, other: &Self, dimensions: &[String]) -> Ordering {
        for dimension in dimensions {
            let ordering = self.get(dimension).cmp(&other.get(dimension));
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k}={v}")?;
        }
        write!(f, "}}")
    }
}

/// Sorts keys ascending by the given dimensions and removes duplicates.
pub(crate) fn sort_and_dedup(keys: &mut Vec<PartitionKey>, dimensions: &[String]) {
    keys.sort_by(|a, b| a.cmp_by(b, dimensions));
    keys.dedup();
}
