//! Serde form of expectations as they appear in a suite configuration.
//!
//! ```json
//! {
//!   "expectation_type": "expect_column_values_to_be_between",
//!   "kwargs": { "column": "score", "min_value": 1, "max_value": 8, "mostly": 0.8 }
//! }
//! ```
//!
//! Every kwargs object also takes the standard `result_format`,
//! `catch_exceptions` and `meta` arguments (see [`ExpectationOptions`]).

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::bounds::RangeBounds;
use super::column_aggregate::{AggregateKind, ColumnAggregateBetween, TableRowCountBetween};
use super::column_map::{ColumnValuesBetween, ColumnValuesNotNull};
use crate::core::{Expectation, ExpectationOptions, ResultFormat};
use crate::datasource::KeyValue;

/// Kwargs of the column aggregate expectations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnBoundsKwargs {
    pub column: String,
    #[serde(default)]
    pub min_value: Option<KeyValue>,
    #[serde(default)]
    pub max_value: Option<KeyValue>,
    #[serde(default)]
    pub strict_min: bool,
    #[serde(default)]
    pub strict_max: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_format: Option<ResultFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catch_exceptions: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Kwargs structs carrying the standard arguments.
trait StandardArguments {
    fn options(&self) -> ExpectationOptions;
}

macro_rules! impl_standard_arguments {
    ($($kwargs:ty),*) => {
        $(
            impl StandardArguments for $kwargs {
                fn options(&self) -> ExpectationOptions {
                    ExpectationOptions {
                        result_format: self.result_format,
                        catch_exceptions: self.catch_exceptions,
                        meta: self.meta.clone(),
                    }
                }
            }
        )*
    };
}

impl_standard_arguments!(
    ColumnBoundsKwargs,
    TableBoundsKwargs,
    ColumnValuesBetweenKwargs,
    ColumnNotNullKwargs
);

impl ColumnBoundsKwargs {
    fn bounds(&self) -> RangeBounds {
        RangeBounds::new(self.min_value.clone(), self.max_value.clone())
            .strict(self.strict_min, self.strict_max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableBoundsKwargs {
    #[serde(default)]
    pub min_value: Option<KeyValue>,
    #[serde(default)]
    pub max_value: Option<KeyValue>,
    #[serde(default)]
    pub strict_min: bool,
    #[serde(default)]
    pub strict_max: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_format: Option<ResultFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catch_exceptions: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnValuesBetweenKwargs {
    pub column: String,
    #[serde(default)]
    pub min_value: Option<KeyValue>,
    #[serde(default)]
    pub max_value: Option<KeyValue>,
    #[serde(default)]
    pub strict_min: bool,
    #[serde(default)]
    pub strict_max: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mostly: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_format: Option<ResultFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catch_exceptions: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnNotNullKwargs {
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mostly: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_format: Option<ResultFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catch_exceptions: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Map<String, serde_json::Value>>,
}

/// One configured expectation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "expectation_type",
    content = "kwargs",
    rename_all = "snake_case"
)]
pub enum ExpectationConfiguration {
    ExpectColumnMinToBeBetween(ColumnBoundsKwargs),
    ExpectColumnMaxToBeBetween(ColumnBoundsKwargs),
    ExpectColumnMeanToBeBetween(ColumnBoundsKwargs),
    ExpectTableRowCountToBeBetween(TableBoundsKwargs),
    ExpectColumnValuesToBeBetween(ColumnValuesBetweenKwargs),
    ExpectColumnValuesToNotBeNull(ColumnNotNullKwargs),
}

impl ExpectationConfiguration {
    /// Builds the expectation. The kwargs are not validated here; that is
    /// the validator's first step.
    pub fn build(&self) -> Arc<dyn Expectation> {
        self.options().apply(self.build_inner())
    }

    /// The standard arguments given with the kwargs.
    pub fn options(&self) -> ExpectationOptions {
        use ExpectationConfiguration::*;
        match self {
            ExpectColumnMinToBeBetween(k)
            | ExpectColumnMaxToBeBetween(k)
            | ExpectColumnMeanToBeBetween(k) => k.options(),
            ExpectTableRowCountToBeBetween(k) => k.options(),
            ExpectColumnValuesToBeBetween(k) => k.options(),
            ExpectColumnValuesToNotBeNull(k) => k.options(),
        }
    }

    fn build_inner(&self) -> Arc<dyn Expectation> {
        use ExpectationConfiguration::*;
        match self {
            ExpectColumnMinToBeBetween(k) => aggregate(AggregateKind::Min, k),
            ExpectColumnMaxToBeBetween(k) => aggregate(AggregateKind::Max, k),
            ExpectColumnMeanToBeBetween(k) => aggregate(AggregateKind::Mean, k),
            ExpectTableRowCountToBeBetween(k) => Arc::new(TableRowCountBetween::new(
                RangeBounds::new(k.min_value.clone(), k.max_value.clone())
                    .strict(k.strict_min, k.strict_max),
            )),
            ExpectColumnValuesToBeBetween(k) => {
                let bounds = RangeBounds::new(k.min_value.clone(), k.max_value.clone())
                    .strict(k.strict_min, k.strict_max);
                let mut expectation = ColumnValuesBetween::new(k.column.clone(), bounds);
                if let Some(mostly) = k.mostly {
                    expectation = expectation.with_mostly(mostly);
                }
                Arc::new(expectation)
            }
            ExpectColumnValuesToNotBeNull(k) => {
                let mut expectation = ColumnValuesNotNull::new(k.column.clone());
                if let Some(mostly) = k.mostly {
                    expectation = expectation.with_mostly(mostly);
                }
                Arc::new(expectation)
            }
        }
    }
}

fn aggregate(kind: AggregateKind, kwargs: &ColumnBoundsKwargs) -> Arc<dyn Expectation> {
    Arc::new(ColumnAggregateBetween::new(
        kind,
        kwargs.column.clone(),
        kwargs.bounds(),
    ))
}
