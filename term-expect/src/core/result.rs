//! Validation result types.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::metrics::MetricValue;

/// How much detail an expectation result carries.
///
/// Row-level expectations report their counts in the observed value under
/// every format except `BOOLEAN_ONLY`; unexpected row samples are not
/// collected, so `SUMMARY` and `COMPLETE` report what `BASIC` does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultFormat {
    /// Success and status only
    BooleanOnly,
    #[default]
    Basic,
    Summary,
    Complete,
}

impl ResultFormat {
    pub fn includes_observed_value(self) -> bool {
        !matches!(self, ResultFormat::BooleanOnly)
    }
}

/// Where an expectation ended up after a validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectationStatus {
    /// Metrics were resolved and the predicate evaluated.
    Evaluated,
    /// A required metric could not be computed.
    MetricUnavailable,
    /// The kwargs were rejected before any metric was requested.
    ConfigurationInvalid,
}

/// Details of a contained failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    pub raised_exception: bool,
    pub exception_message: String,
    /// The metric the failure originated from, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
}

impl ExceptionInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            raised_exception: true,
            exception_message: message.into(),
            metric: None,
        }
    }

    pub fn with_metric(mut self, metric: impl Into<String>) -> Self {
        self.metric = Some(metric.into());
        self
    }
}

/// The outcome of one expectation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationValidationResult {
    pub expectation_type: String,
    pub kwargs: serde_json::Value,
    pub status: ExpectationStatus,
    pub success: bool,
    /// Absent under `BOOLEAN_ONLY` and when nothing was observed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_value: Option<MetricValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception_info: Option<ExceptionInfo>,
    /// The expectation's `meta`, copied unchanged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Map<String, serde_json::Value>>,
}

impl ExpectationValidationResult {
    pub fn with_exception(mut self, info: ExceptionInfo) -> Self {
        self.exception_info = Some(info);
        self
    }

    pub fn with_meta(mut self, meta: Option<serde_json::Map<String, serde_json::Value>>) -> Self {
        self.meta = meta;
        self
    }

    /// Drops the detail `format` excludes.
    pub fn with_format(mut self, format: ResultFormat) -> Self {
        if !format.includes_observed_value() {
            self.observed_value = None;
        }
        self
    }
}

/// Counts over the expectations of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationStatistics {
    /// Total number of expectations in the suite
    pub evaluated_expectations: usize,
    /// Number of expectations that succeeded
    pub successful_expectations: usize,
    /// Number of expectations that failed, for any reason
    pub unsuccessful_expectations: usize,
    /// Successful share as a percentage (0.0 to 100.0)
    pub success_percent: f64,
}

impl ValidationStatistics {
    pub fn from_results(results: &[ExpectationValidationResult]) -> Self {
        let evaluated = results.len();
        let successful = results.iter().filter(|r| r.success).count();
        let success_percent = if evaluated == 0 {
            100.0
        } else {
            (successful as f64 / evaluated as f64) * 100.0
        };
        Self {
            evaluated_expectations: evaluated,
            successful_expectations: successful,
            unsuccessful_expectations: evaluated - successful,
            success_percent,
        }
    }
}

/// The outcome of validating one suite against one batch.
///
/// `results` holds exactly one entry per expectation in the suite, in
/// suite order. `success` is the conjunction of every entry's success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteValidationResult {
    pub suite_name: String,
    pub batch_id: String,
    pub success: bool,
    pub results: Vec<ExpectationValidationResult>,
    pub statistics: ValidationStatistics,
    /// Total execution time in milliseconds
    pub execution_time_ms: u64,
}

impl SuiteValidationResult {
    pub fn new(
        suite_name: impl Into<String>,
        batch_id: impl Into<String>,
        results: Vec<ExpectationValidationResult>,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            suite_name: suite_name.into(),
            batch_id: batch_id.into(),
            success: results.iter().all(|r| r.success),
            statistics: ValidationStatistics::from_results(&results),
            results,
            execution_time_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Results that did not succeed.
    pub fn failures(&self) -> impl Iterator<Item = &ExpectationValidationResult> {
        self.results.iter().filter(|r| !r.success)
    }

    /// Results for expectations of the given type.
    pub fn results_of_type<'a>(
        &'a self,
        expectation_type: &'a str,
    ) -> impl Iterator<Item = &'a ExpectationValidationResult> + 'a {
        self.results
            .iter()
            .filter(move |r| r.expectation_type == expectation_type)
    }

    /// Serializes the result as compact JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serializes the result as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(success: bool, status: ExpectationStatus) -> ExpectationValidationResult {
        ExpectationValidationResult {
            expectation_type: "expect_column_max_to_be_between".to_string(),
            kwargs: json!({ "column": "score" }),
            status,
            success,
            observed_value: Some(MetricValue::Long(10)),
            exception_info: None,
            meta: None,
        }
    }

    #[test]
    fn test_statistics() {
        let suite = SuiteValidationResult::new(
            "suite",
            "abc",
            vec![
                result(true, ExpectationStatus::Evaluated),
                result(false, ExpectationStatus::Evaluated),
                result(false, ExpectationStatus::MetricUnavailable),
                result(true, ExpectationStatus::Evaluated),
            ],
            3,
        );
        assert!(!suite.is_success());
        assert_eq!(suite.statistics.evaluated_expectations, 4);
        assert_eq!(suite.statistics.successful_expectations, 2);
        assert_eq!(suite.statistics.unsuccessful_expectations, 2);
        assert_eq!(suite.statistics.success_percent, 50.0);
        assert_eq!(suite.failures().count(), 2);
    }

    #[test]
    fn test_empty_suite_succeeds() {
        let suite = SuiteValidationResult::new("suite", "abc", Vec::new(), 0);
        assert!(suite.is_success());
        assert_eq!(suite.statistics.success_percent, 100.0);
    }

    #[test]
    fn test_json_shape() {
        let suite = SuiteValidationResult::new(
            "suite",
            "abc",
            vec![result(true, ExpectationStatus::Evaluated)],
            1,
        );
        let value: serde_json::Value = serde_json::from_str(&suite.to_json().unwrap()).unwrap();
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["results"][0]["status"], json!("evaluated"));
        assert_eq!(
            value["results"][0]["observed_value"],
            json!({ "type": "Long", "value": 10 })
        );
        assert!(value["results"][0].get("exception_info").is_none());
        assert!(value["results"][0].get("meta").is_none());
    }

    #[test]
    fn test_result_format_names() {
        let format: ResultFormat = serde_json::from_value(json!("BOOLEAN_ONLY")).unwrap();
        assert_eq!(format, ResultFormat::BooleanOnly);
        assert!(!format.includes_observed_value());
        assert_eq!(ResultFormat::default(), ResultFormat::Basic);
        assert_eq!(serde_json::to_value(ResultFormat::Complete).unwrap(), json!("COMPLETE"));
        assert!(serde_json::from_value::<ResultFormat>(json!("basic")).is_err());
    }
}
