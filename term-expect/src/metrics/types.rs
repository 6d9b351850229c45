//! Values produced by metric providers.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::datasource::KeyValue;

/// Represents the different kinds of value a metric can produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum MetricValue {
    /// A floating-point metric value (e.g., mean, sum of floats).
    Double(f64),

    /// An integer metric value (e.g., count, integer min/max).
    Long(i64),

    /// A string metric value (e.g., min of a text column).
    String(String),

    /// A boolean metric value.
    Boolean(bool),

    Date(NaiveDate),

    Timestamp(NaiveDateTime),

    /// A vector of values (e.g., for multi-dimensional metrics).
    Vector(Vec<f64>),

    /// A list of names (e.g., the columns of a table).
    StringList(Vec<String>),

    /// A map of string keys to metric values.
    Map(BTreeMap<String, MetricValue>),

    /// The metric is defined but has no value (e.g., max of an all-null column).
    Null,
}

impl MetricValue {
    /// Checks if the metric value is numeric (Double or Long).
    pub fn is_numeric(&self) -> bool {
        matches!(self, MetricValue::Double(_) | MetricValue::Long(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, MetricValue::Null)
    }

    /// Attempts to get the numeric value as f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Double(v) => Some(*v),
            MetricValue::Long(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Attempts to get the value as i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetricValue::Long(v) => Some(*v),
            MetricValue::Double(v) => {
                if v.fract() == 0.0 {
                    Some(*v as i64)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn as_string_list(&self) -> Option<&[String]> {
        match self {
            MetricValue::StringList(v) => Some(v),
            _ => None,
        }
    }

    /// Converts a scalar metric into a comparable value, if it is one.
    pub fn to_key_value(&self) -> Option<KeyValue> {
        match self {
            MetricValue::Double(v) => Some(KeyValue::Float(*v)),
            MetricValue::Long(v) => Some(KeyValue::Integer(*v)),
            MetricValue::String(v) => Some(KeyValue::Text(v.clone())),
            MetricValue::Boolean(v) => Some(KeyValue::Boolean(*v)),
            MetricValue::Date(v) => Some(KeyValue::Date(*v)),
            MetricValue::Timestamp(v) => Some(KeyValue::Timestamp(*v)),
            MetricValue::Null => Some(KeyValue::Null),
            MetricValue::Vector(_) | MetricValue::StringList(_) | MetricValue::Map(_) => None,
        }
    }

    /// Returns a human-readable string representation of the metric value.
    pub fn to_string_pretty(&self) -> String {
        match self {
            MetricValue::Double(v) => {
                if v.fract() == 0.0 {
                    format!("{v:.0}")
                } else {
                    format!("{v:.4}")
                }
            }
            MetricValue::Long(v) => v.to_string(),
            MetricValue::String(s) => s.clone(),
            MetricValue::Boolean(b) => b.to_string(),
            MetricValue::Date(d) => d.to_string(),
            MetricValue::Timestamp(ts) => ts.to_string(),
            MetricValue::Vector(v) => format!("Vector({} elements)", v.len()),
            MetricValue::StringList(v) => format!("[{}]", v.join(", ")),
            MetricValue::Map(m) => format!("Map({} entries)", m.len()),
            MetricValue::Null => "null".to_string(),
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_pretty())
    }
}

impl From<KeyValue> for MetricValue {
    fn from(value: KeyValue) -> Self {
        match value {
            KeyValue::Null => MetricValue::Null,
            KeyValue::Boolean(v) => MetricValue::Boolean(v),
            KeyValue::Integer(v) => MetricValue::Long(v),
            KeyValue::Float(v) => MetricValue::Double(v),
            KeyValue::Date(v) => MetricValue::Date(v),
            KeyValue::Timestamp(v) => MetricValue::Timestamp(v),
            KeyValue::Text(v) => MetricValue::String(v),
        }
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::Double(value)
    }
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        MetricValue::Long(value)
    }
}

impl From<bool> for MetricValue {
    fn from(value: bool) -> Self {
        MetricValue::Boolean(value)
    }
}

impl From<String> for MetricValue {
    fn from(value: String) -> Self {
        MetricValue::String(value)
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        MetricValue::String(value.to_string())
    }
}
