//! Expectation suites and their serde configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use super::expectation::{Expectation, ExpectationOptions};
use crate::error::{Result, TermError};
use crate::expectations::ExpectationConfiguration;

/// Serde form of a suite.
///
/// ```json
/// {
///   "name": "events_quality",
///   "expectations": [
///     { "expectation_type": "expect_table_row_count_to_be_between",
///       "kwargs": { "min_value": 1 } }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpectationSuiteConfig {
    pub name: String,
    #[serde(default)]
    pub expectations: Vec<ExpectationConfiguration>,
}

impl ExpectationSuiteConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| TermError::configuration(format!("invalid expectation suite: {e}")))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }
}

/// An ordered collection of expectations validated together.
///
/// # Examples
///
/// ```rust
/// use term_expect::core::ExpectationSuite;
/// use term_expect::expectations::{ColumnAggregateBetween, ColumnValuesNotNull, RangeBounds};
///
/// let suite = ExpectationSuite::builder("events_quality")
///     .expectation(ColumnAggregateBetween::max("score", RangeBounds::between(5, 10)))
///     .expectation(ColumnValuesNotNull::new("amount").with_mostly(0.9))
///     .build();
/// assert_eq!(suite.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct ExpectationSuite {
    name: String,
    expectations: Vec<Arc<dyn Expectation>>,
}

impl ExpectationSuite {
    pub fn builder(name: impl Into<String>) -> ExpectationSuiteBuilder {
        ExpectationSuiteBuilder::new(name)
    }

    /// Builds a suite from its configuration. Kwargs are validated later,
    /// per expectation, when the suite runs.
    pub fn from_config(config: &ExpectationSuiteConfig) -> Self {
        Self {
            name: config.name.clone(),
            expectations: config
                .expectations
                .iter()
                .map(ExpectationConfiguration::build)
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expectations(&self) -> &[Arc<dyn Expectation>] {
        &self.expectations
    }

    pub fn len(&self) -> usize {
        self.expectations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expectations.is_empty()
    }
}

/// Builder for [`ExpectationSuite`].
#[derive(Debug)]
pub struct ExpectationSuiteBuilder {
    name: String,
    expectations: Vec<Arc<dyn Expectation>>,
}

impl ExpectationSuiteBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expectations: Vec::new(),
        }
    }

    pub fn expectation<E: Expectation + 'static>(mut self, expectation: E) -> Self {
        self.expectations.push(Arc::new(expectation));
        self
    }

    /// Adds an expectation with its standard arguments.
    pub fn expectation_with_options<E: Expectation + 'static>(
        mut self,
        expectation: E,
        options: ExpectationOptions,
    ) -> Self {
        self.expectations.push(options.apply(Arc::new(expectation)));
        self
    }

    pub fn expectation_arc(mut self, expectation: Arc<dyn Expectation>) -> Self {
        self.expectations.push(expectation);
        self
    }

    pub fn expectations<I>(mut self, expectations: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Expectation>>,
    {
        self.expectations.extend(expectations);
        self
    }

    pub fn build(self) -> ExpectationSuite {
        ExpectationSuite {
            name: self.name,
            expectations: self.expectations,
        }
    }
}
