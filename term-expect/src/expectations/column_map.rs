//! Row-level expectations with a `mostly` tolerance.
//!
//! Each reports the fraction of rows meeting the condition and succeeds
//! iff that fraction is at least `mostly` (1.0 when not given).

use serde_json::json;
use std::collections::BTreeMap;

use super::bounds::{meets_mostly, validate_mostly, RangeBounds};
use super::column_aggregate::{bounds_kwargs, require_column};
use crate::core::{Expectation, ExpectationOutcome};
use crate::error::{Result, TermError};
use crate::metrics::{names, DependencyValues, MetricConfiguration, MetricValue};

fn count(metrics: &DependencyValues, metric_name: &str) -> Result<i64> {
    let value = metrics.require(metric_name)?;
    value.as_i64().ok_or_else(|| TermError::TypeMismatch {
        expected: "integer count".to_string(),
        found: format!("{metric_name} = {value}"),
    })
}

/// Builds the observed value and success flag for `unexpected` out of
/// `element_count` rows. No rows is a vacuous success.
fn row_level_outcome(
    element_count: i64,
    unexpected: i64,
    mostly: Option<f64>,
) -> ExpectationOutcome {
    let fraction = if element_count > 0 {
        (element_count - unexpected) as f64 / element_count as f64
    } else {
        1.0
    };
    let unexpected_percent = if element_count > 0 {
        unexpected as f64 * 100.0 / element_count as f64
    } else {
        0.0
    };

    let observed = BTreeMap::from([
        ("element_count".to_string(), MetricValue::Long(element_count)),
        ("unexpected_count".to_string(), MetricValue::Long(unexpected)),
        (
            "unexpected_percent".to_string(),
            MetricValue::Double(unexpected_percent),
        ),
    ]);
    ExpectationOutcome::new(meets_mostly(fraction, mostly), MetricValue::Map(observed))
}

/// `expect_column_values_to_be_between`.
///
/// Nulls are not counted; the fraction is taken over non-null values.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnValuesBetween {
    column: String,
    bounds: RangeBounds,
    mostly: Option<f64>,
}

impl ColumnValuesBetween {
    pub fn new(column: impl Into<String>, bounds: RangeBounds) -> Self {
        Self {
            column: column.into(),
            bounds,
            mostly: None,
        }
    }

    pub fn with_mostly(mut self, mostly: f64) -> Self {
        self.mostly = Some(mostly);
        self
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn mostly(&self) -> Option<f64> {
        self.mostly
    }
}

impl Expectation for ColumnValuesBetween {
    fn expectation_type(&self) -> &str {
        "expect_column_values_to_be_between"
    }

    fn validate_configuration(&self) -> Result<()> {
        require_column(self.expectation_type(), &self.column)?;
        self.bounds.validate(self.expectation_type())?;
        validate_mostly(self.expectation_type(), self.mostly)
    }

    fn metric_dependencies(&self) -> Vec<MetricConfiguration> {
        let mut unexpected =
            MetricConfiguration::column(names::COLUMN_BETWEEN_UNEXPECTED_COUNT, &self.column);
        unexpected.value_kwargs = self.bounds.to_value_kwargs();
        vec![
            unexpected,
            MetricConfiguration::column(names::COLUMN_NONNULL_COUNT, &self.column),
        ]
    }

    fn evaluate(&self, metrics: &DependencyValues) -> Result<ExpectationOutcome> {
        let unexpected = count(metrics, names::COLUMN_BETWEEN_UNEXPECTED_COUNT)?;
        let nonnull = count(metrics, names::COLUMN_NONNULL_COUNT)?;
        Ok(row_level_outcome(nonnull, unexpected, self.mostly))
    }

    fn kwargs(&self) -> serde_json::Value {
        let mut kwargs = bounds_kwargs(&self.bounds);
        kwargs["column"] = json!(self.column);
        if let Some(mostly) = self.mostly {
            kwargs["mostly"] = json!(mostly);
        }
        kwargs
    }
}

/// `expect_column_values_to_not_be_null`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnValuesNotNull {
    column: String,
    mostly: Option<f64>,
}

impl ColumnValuesNotNull {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            mostly: None,
        }
    }

    pub fn with_mostly(mut self, mostly: f64) -> Self {
        self.mostly = Some(mostly);
        self
    }

    pub fn column(&self) -> &str {
        &self.column
    }
}

impl Expectation for ColumnValuesNotNull {
    fn expectation_type(&self) -> &str {
        "expect_column_values_to_not_be_null"
    }

    fn validate_configuration(&self) -> Result<()> {
        require_column(self.expectation_type(), &self.column)?;
        validate_mostly(self.expectation_type(), self.mostly)
    }

    fn metric_dependencies(&self) -> Vec<MetricConfiguration> {
        vec![
            MetricConfiguration::column(names::COLUMN_NULL_COUNT, &self.column),
            MetricConfiguration::table(names::TABLE_ROW_COUNT),
        ]
    }

    fn evaluate(&self, metrics: &DependencyValues) -> Result<ExpectationOutcome> {
        let nulls = count(metrics, names::COLUMN_NULL_COUNT)?;
        let rows = count(metrics, names::TABLE_ROW_COUNT)?;
        Ok(row_level_outcome(rows, nulls, self.mostly))
    }

    fn kwargs(&self) -> serde_json::Value {
        let mut kwargs = json!({ "column": self.column });
        if let Some(mostly) = self.mostly {
            kwargs["mostly"] = json!(mostly);
        }
        kwargs
    }
}
