//! Expectations that compare a single aggregate against a range.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::bounds::RangeBounds;
use crate::core::{Expectation, ExpectationOutcome};
use crate::error::{Result, TermError};
use crate::metrics::{names, DependencyValues, MetricConfiguration, MetricValue};

/// The column aggregate an expectation bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateKind {
    Min,
    Max,
    Mean,
}

impl AggregateKind {
    pub fn metric_name(&self) -> &'static str {
        match self {
            AggregateKind::Min => names::COLUMN_MIN,
            AggregateKind::Max => names::COLUMN_MAX,
            AggregateKind::Mean => names::COLUMN_MEAN,
        }
    }

    pub fn expectation_type(&self) -> &'static str {
        match self {
            AggregateKind::Min => "expect_column_min_to_be_between",
            AggregateKind::Max => "expect_column_max_to_be_between",
            AggregateKind::Mean => "expect_column_mean_to_be_between",
        }
    }
}

/// `expect_column_{min,max,mean}_to_be_between`.
///
/// Fails when the aggregate is null, which happens for an empty or
/// all-null column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnAggregateBetween {
    kind: AggregateKind,
    column: String,
    bounds: RangeBounds,
}

impl ColumnAggregateBetween {
    pub fn new(kind: AggregateKind, column: impl Into<String>, bounds: RangeBounds) -> Self {
        Self {
            kind,
            column: column.into(),
            bounds,
        }
    }

    pub fn min(column: impl Into<String>, bounds: RangeBounds) -> Self {
        Self::new(AggregateKind::Min, column, bounds)
    }

    pub fn max(column: impl Into<String>, bounds: RangeBounds) -> Self {
        Self::new(AggregateKind::Max, column, bounds)
    }

    pub fn mean(column: impl Into<String>, bounds: RangeBounds) -> Self {
        Self::new(AggregateKind::Mean, column, bounds)
    }

    pub fn kind(&self) -> AggregateKind {
        self.kind
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn bounds(&self) -> &RangeBounds {
        &self.bounds
    }

    fn metric(&self) -> MetricConfiguration {
        MetricConfiguration::column(self.kind.metric_name(), &self.column)
    }
}

impl Expectation for ColumnAggregateBetween {
    fn expectation_type(&self) -> &str {
        self.kind.expectation_type()
    }

    fn validate_configuration(&self) -> Result<()> {
        require_column(self.expectation_type(), &self.column)?;
        self.bounds.validate(self.expectation_type())
    }

    fn metric_dependencies(&self) -> Vec<MetricConfiguration> {
        vec![self.metric()]
    }

    fn evaluate(&self, metrics: &DependencyValues) -> Result<ExpectationOutcome> {
        let observed = metrics.require(self.kind.metric_name())?;
        Ok(ExpectationOutcome::new(
            bounds_hold(&self.bounds, observed),
            observed.clone(),
        ))
    }

    fn kwargs(&self) -> serde_json::Value {
        let mut kwargs = bounds_kwargs(&self.bounds);
        kwargs["column"] = json!(self.column);
        kwargs
    }
}

/// `expect_table_row_count_to_be_between`.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRowCountBetween {
    bounds: RangeBounds,
}

impl TableRowCountBetween {
    pub fn new(bounds: RangeBounds) -> Self {
        Self { bounds }
    }

    pub fn bounds(&self) -> &RangeBounds {
        &self.bounds
    }
}

impl Expectation for TableRowCountBetween {
    fn expectation_type(&self) -> &str {
        "expect_table_row_count_to_be_between"
    }

    fn validate_configuration(&self) -> Result<()> {
        self.bounds.validate(self.expectation_type())
    }

    fn metric_dependencies(&self) -> Vec<MetricConfiguration> {
        vec![MetricConfiguration::table(names::TABLE_ROW_COUNT)]
    }

    fn evaluate(&self, metrics: &DependencyValues) -> Result<ExpectationOutcome> {
        let observed = metrics.require(names::TABLE_ROW_COUNT)?;
        Ok(ExpectationOutcome::new(
            bounds_hold(&self.bounds, observed),
            observed.clone(),
        ))
    }

    fn kwargs(&self) -> serde_json::Value {
        bounds_kwargs(&self.bounds)
    }
}

pub(crate) fn require_column(expectation_type: &str, column: &str) -> Result<()> {
    if column.trim().is_empty() {
        return Err(TermError::configuration_invalid(
            expectation_type,
            "column must not be empty",
        ));
    }
    Ok(())
}

/// Null or incomparable observations never satisfy the bounds.
fn bounds_hold(bounds: &RangeBounds, observed: &MetricValue) -> bool {
    match observed.to_key_value() {
        Some(value) if !value.is_null() => bounds.contains(&value).unwrap_or(false),
        _ => false,
    }
}

pub(crate) fn bounds_kwargs(bounds: &RangeBounds) -> serde_json::Value {
    serde_json::to_value(bounds).unwrap_or_else(|_| json!({}))
}
