//! Runs expectation suites against batches.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::expectation::Expectation;
use super::result::{
    ExceptionInfo, ExpectationStatus, ExpectationValidationResult, ResultFormat,
    SuiteValidationResult,
};
use super::suite::ExpectationSuite;
use crate::datasource::{BatchRequest, BatchResolver, BatchSelection};
use crate::engine::Batch;
use crate::error::{Result, TermError};
use crate::logging::LogConfig;
use crate::metrics::{MetricConfiguration, MetricExecutor, MetricRegistry};

fn default_max_concurrency() -> usize {
    num_cpus::get()
}

fn default_catch_exceptions() -> bool {
    true
}

/// Validator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ValidatorConfig {
    /// Metrics of one graph level computed at the same time
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Contain metric failures in per-expectation results instead of
    /// failing the run
    #[serde(default = "default_catch_exceptions")]
    pub catch_exceptions: bool,
    /// Detail of results for expectations that do not set their own
    #[serde(default)]
    pub result_format: ResultFormat,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            catch_exceptions: default_catch_exceptions(),
            result_format: ResultFormat::default(),
        }
    }
}

/// Validates expectation suites against materialized batches.
///
/// A run moves every expectation through
/// `Configured -> MetricsRequested -> {Evaluated | MetricUnavailable | ConfigurationInvalid}`:
/// kwargs are checked first, the metrics of all valid expectations are
/// resolved in one graph, then each expectation is evaluated against its
/// own metrics. One failing expectation never hides the others.
///
/// # Examples
///
/// ```rust,no_run
/// use term_expect::core::{ExpectationSuite, Validator};
/// use term_expect::expectations::{ColumnValuesBetween, RangeBounds};
/// # use term_expect::engine::Batch;
/// # async fn example(batch: Batch) -> term_expect::error::Result<()> {
/// let suite = ExpectationSuite::builder("scores")
///     .expectation(ColumnValuesBetween::new("score", RangeBounds::between(1, 8)).with_mostly(0.8))
///     .build();
///
/// let result = Validator::new().validate(&suite, &batch).await?;
/// println!("{}", result.to_json_pretty()?);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Validator {
    executor: MetricExecutor,
    config: ValidatorConfig,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    /// A validator over the built-in metric registry.
    pub fn new() -> Self {
        Self::with_registry(MetricRegistry::global())
    }

    pub fn with_registry(registry: Arc<MetricRegistry>) -> Self {
        Self::with_config(registry, ValidatorConfig::default())
    }

    pub fn with_config(registry: Arc<MetricRegistry>, config: ValidatorConfig) -> Self {
        Self {
            executor: MetricExecutor::new(registry).with_max_concurrency(config.max_concurrency),
            config,
        }
    }

    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.executor = self.executor.with_log_config(log_config);
        self
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn executor(&self) -> &MetricExecutor {
        &self.executor
    }

    /// Validates a suite against one batch.
    ///
    /// Returns an error only for a cyclic metric definition or, with
    /// `catch_exceptions` disabled, the first unavailable metric.
    #[instrument(skip(self, suite, batch), fields(
        suite.name = %suite.name(),
        suite.expectations = suite.len(),
        batch.id = %batch.id()
    ))]
    pub async fn validate(
        &self,
        suite: &ExpectationSuite,
        batch: &Batch,
    ) -> Result<SuiteValidationResult> {
        let start = Instant::now();
        info!(
            suite.name = %suite.name(),
            batch.id = %batch.id(),
            backend = %batch.backend(),
            "Starting expectation suite"
        );

        let planned: Vec<Planned> = suite
            .expectations()
            .iter()
            .map(|expectation| match expectation.validate_configuration() {
                Ok(()) => Planned::Ready(expectation.metric_dependencies()),
                Err(error) => {
                    warn!(
                        expectation = expectation.expectation_type(),
                        error = %error,
                        "Expectation configuration is invalid"
                    );
                    Planned::Invalid(error)
                }
            })
            .collect();

        let mut requested: Vec<MetricConfiguration> = Vec::new();
        for metrics in planned.iter().filter_map(Planned::metrics) {
            for metric in metrics {
                if !requested.contains(metric) {
                    requested.push(metric.clone());
                }
            }
        }
        debug!(metrics = requested.len(), "Requesting metrics");

        let resolution = self.executor.resolve(batch, &requested).await?;

        let mut results = Vec::with_capacity(planned.len());
        for (expectation, plan) in suite.expectations().iter().zip(planned) {
            let options = expectation.options();
            let catch_exceptions = options.catch_exceptions.unwrap_or(self.config.catch_exceptions);
            let result = match plan {
                Planned::Invalid(error) => {
                    failed_result(expectation.as_ref(), ExpectationStatus::ConfigurationInvalid)
                        .with_exception(ExceptionInfo::new(error.to_string()))
                }
                Planned::Ready(metrics) => match resolution.collect(&metrics) {
                    Ok(values) => match expectation.evaluate(&values) {
                        Ok(outcome) => ExpectationValidationResult {
                            expectation_type: expectation.expectation_type().to_string(),
                            kwargs: expectation.kwargs(),
                            status: ExpectationStatus::Evaluated,
                            success: outcome.success,
                            observed_value: Some(outcome.observed_value),
                            exception_info: None,
                            meta: None,
                        },
                        Err(error) => {
                            if !catch_exceptions {
                                return Err(error);
                            }
                            warn!(
                                expectation = expectation.expectation_type(),
                                error = %error,
                                "Expectation evaluation failed"
                            );
                            failed_result(expectation.as_ref(), ExpectationStatus::Evaluated)
                                .with_exception(ExceptionInfo::new(error.to_string()))
                        }
                    },
                    Err(failure) => {
                        if !catch_exceptions {
                            return Err(failure.to_error(batch.backend()));
                        }
                        warn!(
                            expectation = expectation.expectation_type(),
                            metric = %failure.metric,
                            "Expectation skipped, metric unavailable"
                        );
                        failed_result(expectation.as_ref(), ExpectationStatus::MetricUnavailable)
                            .with_exception(
                                ExceptionInfo::new(failure.message.clone())
                                    .with_metric(failure.root_cause().to_string()),
                            )
                    }
                },
            };
            let format = options.result_format.unwrap_or(self.config.result_format);
            results.push(result.with_format(format).with_meta(options.meta));
        }

        let result = SuiteValidationResult::new(
            suite.name(),
            batch.id(),
            results,
            start.elapsed().as_millis() as u64,
        );
        info!(
            suite.name = %result.suite_name,
            success = result.success,
            successful = result.statistics.successful_expectations,
            unsuccessful = result.statistics.unsuccessful_expectations,
            metrics.computed = resolution.computations,
            execution_time_ms = result.execution_time_ms,
            "Expectation suite completed"
        );
        Ok(result)
    }

    /// Resolves exactly one batch through the resolver and validates it.
    pub async fn validate_request(
        &self,
        suite: &ExpectationSuite,
        resolver: &BatchResolver,
        request: &BatchRequest,
        selection: BatchSelection,
    ) -> Result<SuiteValidationResult> {
        let batch = resolver.get_batch(request, selection).await?;
        self.validate(suite, &batch).await
    }
}

enum Planned {
    Ready(Vec<MetricConfiguration>),
    Invalid(TermError),
}

impl Planned {
    fn metrics(&self) -> Option<&Vec<MetricConfiguration>> {
        match self {
            Planned::Ready(metrics) => Some(metrics),
            Planned::Invalid(_) => None,
        }
    }
}

fn failed_result(
    expectation: &dyn Expectation,
    status: ExpectationStatus,
) -> ExpectationValidationResult {
    ExpectationValidationResult {
        expectation_type: expectation.expectation_type().to_string(),
        kwargs: expectation.kwargs(),
        status,
        success: false,
        observed_value: None,
        exception_info: None,
        meta: None,
    }
}
