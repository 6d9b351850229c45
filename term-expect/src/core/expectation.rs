//! The expectation trait and its evaluation outcome.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

use super::result::ResultFormat;
use crate::error::Result;
use crate::metrics::{DependencyValues, MetricConfiguration, MetricValue};

/// The outcome of evaluating one expectation against its metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationOutcome {
    pub success: bool,
    pub observed_value: MetricValue,
}

impl ExpectationOutcome {
    pub fn new(success: bool, observed_value: impl Into<MetricValue>) -> Self {
        Self {
            success,
            observed_value: observed_value.into(),
        }
    }
}

/// A declarative assertion over metric values.
///
/// An expectation goes through three steps during validation:
///
/// 1. [`validate_configuration`](Expectation::validate_configuration) checks
///    its own kwargs without touching data. A failure here means none of
///    its metrics are requested.
/// 2. [`metric_dependencies`](Expectation::metric_dependencies) names every
///    metric it needs, ahead of execution.
/// 3. [`evaluate`](Expectation::evaluate) receives exactly those metric
///    values and decides success.
///
/// # Examples
///
/// ```rust
/// use term_expect::core::{Expectation, ExpectationOutcome};
/// use term_expect::error::Result;
/// use term_expect::metrics::{names, DependencyValues, MetricConfiguration};
///
/// #[derive(Debug)]
/// struct TableIsNotEmpty;
///
/// impl Expectation for TableIsNotEmpty {
///     fn expectation_type(&self) -> &str {
///         "expect_table_to_not_be_empty"
///     }
///
///     fn validate_configuration(&self) -> Result<()> {
///         Ok(())
///     }
///
///     fn metric_dependencies(&self) -> Vec<MetricConfiguration> {
///         vec![MetricConfiguration::table(names::TABLE_ROW_COUNT)]
///     }
///
///     fn evaluate(&self, metrics: &DependencyValues) -> Result<ExpectationOutcome> {
///         let rows = metrics.require(names::TABLE_ROW_COUNT)?;
///         Ok(ExpectationOutcome::new(rows.as_i64().unwrap_or(0) > 0, rows.clone()))
///     }
///
///     fn kwargs(&self) -> serde_json::Value {
///         serde_json::json!({})
///     }
/// }
/// ```
pub trait Expectation: Debug + Send + Sync {
    /// The snake_case type name, e.g. `expect_column_max_to_be_between`.
    fn expectation_type(&self) -> &str;

    /// Checks internal consistency of the kwargs.
    ///
    /// Must not access data. Fails with `TermError::ConfigurationInvalid`.
    fn validate_configuration(&self) -> Result<()>;

    /// Every metric [`evaluate`](Expectation::evaluate) will read.
    fn metric_dependencies(&self) -> Vec<MetricConfiguration>;

    /// Decides success from the resolved metric values.
    fn evaluate(&self, metrics: &DependencyValues) -> Result<ExpectationOutcome>;

    /// The kwargs as they appear in a suite configuration.
    fn kwargs(&self) -> serde_json::Value;

    /// Standard arguments controlling how the result is reported.
    fn options(&self) -> ExpectationOptions {
        ExpectationOptions::default()
    }
}

/// Arguments every expectation accepts next to its own kwargs.
///
/// ```json
/// { "result_format": "BOOLEAN_ONLY", "catch_exceptions": false, "meta": { "owner": "data-eng" } }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpectationOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_format: Option<ResultFormat>,
    /// Overrides `ValidatorConfig::catch_exceptions` for this expectation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catch_exceptions: Option<bool>,
    /// Opaque JSON copied into the result unchanged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Map<String, serde_json::Value>>,
}

impl ExpectationOptions {
    pub fn with_result_format(mut self, format: ResultFormat) -> Self {
        self.result_format = Some(format);
        self
    }

    pub fn with_catch_exceptions(mut self, catch_exceptions: bool) -> Self {
        self.catch_exceptions = Some(catch_exceptions);
        self
    }

    pub fn with_meta(mut self, meta: serde_json::Map<String, serde_json::Value>) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Attaches these options to an expectation, unless there are none.
    pub fn apply(self, expectation: Arc<dyn Expectation>) -> Arc<dyn Expectation> {
        if self.is_empty() {
            expectation
        } else {
            Arc::new(ConfiguredExpectation::new(expectation, self))
        }
    }
}

/// An expectation together with its [`ExpectationOptions`].
///
/// Delegates everything to the wrapped expectation; the options are added
/// to its reported kwargs so a result round-trips to its configuration.
#[derive(Debug, Clone)]
pub struct ConfiguredExpectation {
    inner: Arc<dyn Expectation>,
    options: ExpectationOptions,
}

impl ConfiguredExpectation {
    pub fn new(inner: Arc<dyn Expectation>, options: ExpectationOptions) -> Self {
        Self { inner, options }
    }

    pub fn inner(&self) -> &Arc<dyn Expectation> {
        &self.inner
    }
}

impl Expectation for ConfiguredExpectation {
    fn expectation_type(&self) -> &str {
        self.inner.expectation_type()
    }

    fn validate_configuration(&self) -> Result<()> {
        self.inner.validate_configuration()
    }

    fn metric_dependencies(&self) -> Vec<MetricConfiguration> {
        self.inner.metric_dependencies()
    }

    fn evaluate(&self, metrics: &DependencyValues) -> Result<ExpectationOutcome> {
        self.inner.evaluate(metrics)
    }

    fn kwargs(&self) -> serde_json::Value {
        let mut kwargs = self.inner.kwargs();
        if let (Some(target), Ok(serde_json::Value::Object(options))) =
            (kwargs.as_object_mut(), serde_json::to_value(&self.options))
        {
            target.extend(options);
        }
        kwargs
    }

    fn options(&self) -> ExpectationOptions {
        self.options.clone()
    }
}
