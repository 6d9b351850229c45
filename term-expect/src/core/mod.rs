//! Core validation types: expectations, suites, results and the validator.
//!
//! ## Architecture
//!
//! ```text
//! ExpectationSuite
//!     ├── Expectation ── metric_dependencies() ──┐
//!     ├── Expectation ── metric_dependencies() ──┼──> MetricExecutor (one graph per run)
//!     └── Expectation ── metric_dependencies() ──┘            │
//!                                                             v
//!                       evaluate(&DependencyValues) <── MetricResolution
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use term_expect::core::{ExpectationSuite, ExpectationStatus, Validator};
//! use term_expect::expectations::{ColumnAggregateBetween, RangeBounds};
//! # use term_expect::engine::Batch;
//! # async fn example(batch: Batch) -> term_expect::error::Result<()> {
//! let suite = ExpectationSuite::builder("scores")
//!     .expectation(ColumnAggregateBetween::max("score", RangeBounds::between(5, 10)))
//!     .build();
//!
//! let result = Validator::new().validate(&suite, &batch).await?;
//! for outcome in &result.results {
//!     if outcome.status != ExpectationStatus::Evaluated {
//!         println!("{} was not evaluated", outcome.expectation_type);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod expectation;
pub mod result;
pub mod suite;
pub mod validator;

pub use expectation::{
    ConfiguredExpectation, Expectation, ExpectationOptions, ExpectationOutcome,
};
pub use result::{
    ExceptionInfo, ExpectationStatus, ExpectationValidationResult, ResultFormat,
    SuiteValidationResult, ValidationStatistics,
};
pub use suite::{ExpectationSuite, ExpectationSuiteBuilder, ExpectationSuiteConfig};
pub use validator::{Validator, ValidatorConfig};
