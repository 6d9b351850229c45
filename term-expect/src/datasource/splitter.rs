//! Splitters partition a table asset into enumerable logical slices.
//!
//! A [`Splitter`] only defines how partition dimensions are derived from
//! column values. Enumerating the distinct partitions is the execution
//! engine's job: the SQL engine pushes the derivation down as expressions
//! ([`Splitter::sql_dimensions`]) while the in-memory engine applies
//! [`Splitter::derive`] row by row. Both produce the same key schema.

use arrow::datatypes::{DataType, Schema};
use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use super::value::{KeyValue, PartitionKey};
use crate::error::{Result, TermError};
use crate::security::SqlSecurity;

/// A named part of a date or timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatePart {
    Year,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
}

impl DatePart {
    /// The dimension name this part emits.
    pub fn as_str(&self) -> &'static str {
        match self {
            DatePart::Year => "year",
            DatePart::Month => "month",
            DatePart::Week => "week",
            DatePart::Day => "day",
            DatePart::Hour => "hour",
            DatePart::Minute => "minute",
            DatePart::Second => "second",
        }
    }

    fn extract(&self, ts: &NaiveDateTime) -> i64 {
        match self {
            DatePart::Year => i64::from(ts.year()),
            DatePart::Month => i64::from(ts.month()),
            DatePart::Week => i64::from(ts.iso_week().week()),
            DatePart::Day => i64::from(ts.day()),
            DatePart::Hour => i64::from(ts.hour()),
            DatePart::Minute => i64::from(ts.minute()),
            DatePart::Second => i64::from(ts.second()),
        }
    }
}

impl fmt::Display for DatePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The rule that partitions a table asset.
///
/// Serialized as `{"method": "<kind>", ...}` with the kind's parameters;
/// unknown fields are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case", deny_unknown_fields)]
pub enum Splitter {
    /// One partition per distinct value of a column.
    ColumnValue { column_name: String },
    /// One partition per distinct tuple of several columns.
    MultiColumnValue { column_names: Vec<String> },
    /// Partition value is `floor(value / divisor)`.
    DividedInteger { column_name: String, divisor: i64 },
    /// Partition value is `value mod divisor`, always non-negative.
    ModInteger {
        column_name: String,
        #[serde(rename = "mod")]
        modulus: i64,
    },
    Year { column_name: String },
    YearAndMonth { column_name: String },
    YearAndMonthAndDay { column_name: String },
    /// Arbitrary ordered list of date parts, each its own dimension.
    DatetimePart {
        column_name: String,
        date_parts: Vec<DatePart>,
    },
}

impl Splitter {
    pub fn column_value(column: impl Into<String>) -> Self {
        Splitter::ColumnValue {
            column_name: column.into(),
        }
    }

    pub fn multi_column_value<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Splitter::MultiColumnValue {
            column_names: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn divided_integer(column: impl Into<String>, divisor: i64) -> Self {
        Splitter::DividedInteger {
            column_name: column.into(),
            divisor,
        }
    }

    pub fn mod_integer(column: impl Into<String>, modulus: i64) -> Self {
        Splitter::ModInteger {
            column_name: column.into(),
            modulus,
        }
    }

    pub fn year(column: impl Into<String>) -> Self {
        Splitter::Year {
            column_name: column.into(),
        }
    }

    pub fn year_and_month(column: impl Into<String>) -> Self {
        Splitter::YearAndMonth {
            column_name: column.into(),
        }
    }

    pub fn year_and_month_and_day(column: impl Into<String>) -> Self {
        Splitter::YearAndMonthAndDay {
            column_name: column.into(),
        }
    }

    pub fn datetime_part(column: impl Into<String>, date_parts: Vec<DatePart>) -> Self {
        Splitter::DatetimePart {
            column_name: column.into(),
            date_parts,
        }
    }

    /// The splitter kind as written in configuration.
    pub fn method(&self) -> &'static str {
        match self {
            Splitter::ColumnValue { .. } => "column_value",
            Splitter::MultiColumnValue { .. } => "multi_column_value",
            Splitter::DividedInteger { .. } => "divided_integer",
            Splitter::ModInteger { .. } => "mod_integer",
            Splitter::Year { .. } => "year",
            Splitter::YearAndMonth { .. } => "year_and_month",
            Splitter::YearAndMonthAndDay { .. } => "year_and_month_and_day",
            Splitter::DatetimePart { .. } => "datetime_part",
        }
    }

    /// The columns this splitter reads, in derivation order.
    pub fn columns(&self) -> Vec<&str> {
        match self {
            Splitter::MultiColumnValue { column_names } => {
                column_names.iter().map(String::as_str).collect()
            }
            Splitter::ColumnValue { column_name }
            | Splitter::DividedInteger { column_name, .. }
            | Splitter::ModInteger { column_name, .. }
            | Splitter::Year { column_name }
            | Splitter::YearAndMonth { column_name }
            | Splitter::YearAndMonthAndDay { column_name }
            | Splitter::DatetimePart { column_name, .. } => vec![column_name.as_str()],
        }
    }

    fn date_parts(&self) -> Option<Vec<DatePart>> {
        match self {
            Splitter::Year { .. } => Some(vec![DatePart::Year]),
            Splitter::YearAndMonth { .. } => Some(vec![DatePart::Year, DatePart::Month]),
            Splitter::YearAndMonthAndDay { .. } => {
                Some(vec![DatePart::Year, DatePart::Month, DatePart::Day])
            }
            Splitter::DatetimePart { date_parts, .. } => Some(date_parts.clone()),
            _ => None,
        }
    }

    /// The names of the partition dimensions this splitter emits.
    pub fn dimension_names(&self) -> Vec<String> {
        match self.date_parts() {
            Some(parts) => parts.iter().map(|p| p.as_str().to_string()).collect(),
            None => self.columns().into_iter().map(str::to_string).collect(),
        }
    }

    /// Checks parameters that need no data access.
    pub fn validate(&self) -> Result<()> {
        for column in self.columns() {
            SqlSecurity::validate_identifier(column).map_err(|e| {
                TermError::configuration(format!("{} splitter: {e}", self.method()))
            })?;
        }
        match self {
            Splitter::MultiColumnValue { column_names } => {
                if column_names.is_empty() {
                    return Err(TermError::configuration(
                        "multi_column_value splitter requires at least one column",
                    ));
                }
                let unique: HashSet<_> = column_names.iter().collect();
                if unique.len() != column_names.len() {
                    return Err(TermError::configuration(
                        "multi_column_value splitter lists a column twice",
                    ));
                }
            }
            Splitter::DividedInteger { divisor, .. } if *divisor <= 0 => {
                return Err(TermError::configuration(format!(
                    "divided_integer divisor must be a positive integer, got {divisor}"
                )));
            }
            Splitter::ModInteger { modulus, .. } if *modulus <= 0 => {
                return Err(TermError::configuration(format!(
                    "mod_integer mod must be a positive integer, got {modulus}"
                )));
            }
            Splitter::DatetimePart { date_parts, .. } => {
                if date_parts.is_empty() {
                    return Err(TermError::configuration(
                        "datetime_part splitter requires at least one date part",
                    ));
                }
                let unique: HashSet<_> = date_parts.iter().collect();
                if unique.len() != date_parts.len() {
                    return Err(TermError::configuration(
                        "datetime_part splitter lists a date part twice",
                    ));
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Checks that every column exists and has a type this kind supports.
    pub fn validate_schema(&self, schema: &Schema) -> Result<()> {
        self.validate()?;
        for column in self.columns() {
            let field = schema.field_with_name(column).map_err(|_| {
                TermError::configuration(format!(
                    "{} splitter references unknown column '{column}'",
                    self.method()
                ))
            })?;
            let data_type = field.data_type();
            let supported = match self {
                Splitter::ColumnValue { .. } | Splitter::MultiColumnValue { .. } => {
                    is_groupable(data_type)
                }
                Splitter::DividedInteger { .. } | Splitter::ModInteger { .. } => {
                    data_type.is_integer()
                }
                _ => is_temporal(data_type),
            };
            if !supported {
                return Err(TermError::configuration(format!(
                    "{} splitter does not support column '{column}' of type {data_type}",
                    self.method()
                )));
            }
        }
        Ok(())
    }

    /// Derives a partition key from the values of [`Splitter::columns`].
    pub fn derive(&self, values: &[KeyValue]) -> Result<PartitionKey> {
        let columns = self.columns();
        if values.len() != columns.len() {
            return Err(TermError::Internal(format!(
                "{} splitter expects {} values, got {}",
                self.method(),
                columns.len(),
                values.len()
            )));
        }

        let mut key = PartitionKey::new();
        match self {
            Splitter::ColumnValue { .. } | Splitter::MultiColumnValue { .. } => {
                for (column, value) in columns.iter().zip(values) {
                    key.insert(*column, value.clone());
                }
            }
            Splitter::DividedInteger {
                column_name,
                divisor,
            } => {
                key.insert(
                    column_name.as_str(),
                    integer_transform(&values[0], |v| v.div_euclid(*divisor))?,
                );
            }
            Splitter::ModInteger {
                column_name,
                modulus,
            } => {
                key.insert(
                    column_name.as_str(),
                    integer_transform(&values[0], |v| v.rem_euclid(*modulus))?,
                );
            }
            _ => {
                let parts = self.date_parts().unwrap_or_default();
                let timestamp = match &values[0] {
                    KeyValue::Date(d) => d.and_hms_opt(0, 0, 0),
                    KeyValue::Timestamp(ts) => Some(*ts),
                    KeyValue::Null => None,
                    other => {
                        return Err(TermError::TypeMismatch {
                            expected: "date or timestamp".to_string(),
                            found: other.to_string(),
                        })
                    }
                };
                for part in parts {
                    let value = timestamp
                        .map(|ts| KeyValue::Integer(part.extract(&ts)))
                        .unwrap_or(KeyValue::Null);
                    key.insert(part.as_str(), value);
                }
            }
        }
        Ok(key)
    }

    /// Returns `(dimension, sql_expression)` pairs computing each dimension.
    pub fn sql_dimensions(&self) -> Result<Vec<(String, String)>> {
        self.validate()?;
        let dims = match self {
            Splitter::ColumnValue { .. } | Splitter::MultiColumnValue { .. } => self
                .columns()
                .into_iter()
                .map(|c| Ok((c.to_string(), SqlSecurity::escape_identifier(c)?)))
                .collect::<Result<Vec<_>>>()?,
            Splitter::DividedInteger {
                column_name,
                divisor,
            } => {
                let column = SqlSecurity::escape_identifier(column_name)?;
                vec![(
                    column_name.clone(),
                    format!(
                        "CAST((({column} - ((({column} % {divisor}) + {divisor}) % {divisor})) / {divisor}) AS BIGINT)"
                    ),
                )]
            }
            Splitter::ModInteger {
                column_name,
                modulus,
            } => {
                let column = SqlSecurity::escape_identifier(column_name)?;
                vec![(
                    column_name.clone(),
                    format!("CAST(((({column} % {modulus}) + {modulus}) % {modulus}) AS BIGINT)"),
                )]
            }
            _ => {
                let column = SqlSecurity::escape_identifier(self.columns()[0])?;
                self.date_parts()
                    .unwrap_or_default()
                    .into_iter()
                    .map(|part| {
                        (
                            part.as_str().to_string(),
                            format!("CAST(date_part('{part}', {column}) AS BIGINT)"),
                        )
                    })
                    .collect()
            }
        };
        Ok(dims)
    }
}

fn integer_transform(value: &KeyValue, f: impl Fn(i64) -> i64) -> Result<KeyValue> {
    match value {
        KeyValue::Integer(v) => Ok(KeyValue::Integer(f(*v))),
        KeyValue::Null => Ok(KeyValue::Null),
        other => Err(TermError::TypeMismatch {
            expected: "integer".to_string(),
            found: other.to_string(),
        }),
    }
}

fn is_temporal(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Date32 | DataType::Date64 | DataType::Timestamp(_, _)
    )
}

fn is_groupable(data_type: &DataType) -> bool {
    data_type.is_integer()
        || data_type.is_floating()
        || is_temporal(data_type)
        || matches!(
            data_type,
            DataType::Boolean | DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View
        )
}
