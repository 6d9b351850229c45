//! # Term Expect - Batch resolution and expectation validation for Rust
//!
//! Term Expect checks declarative assertions (expectations) against slices
//! of tabular data (batches). It leverages DataFusion for SQL execution and
//! Arrow for in-memory data, and reports through `tracing`.
//!
//! ## Overview
//!
//! A validation run has two halves:
//!
//! 1. **Batch resolution.** A [`DataAsset`](datasource::DataAsset) describes
//!    a table or a set of files. Its [`Splitter`](datasource::Splitter)
//!    partitions it into logical slices, a [`Sorter`](datasource::Sorter)
//!    orders them, and the [`BatchResolver`](datasource::BatchResolver)
//!    turns a [`BatchRequest`](datasource::BatchRequest) into concrete
//!    [`BatchConfig`](datasource::BatchConfig)s and a materialized
//!    [`Batch`](engine::Batch).
//! 2. **Expectation validation.** Each [`Expectation`](core::Expectation)
//!    declares the metrics it needs. The
//!    [`MetricExecutor`](metrics::MetricExecutor) expands them into a
//!    dependency graph, computes each distinct metric once on the batch's
//!    backend and contains failures to the metrics that depend on them. The
//!    [`Validator`](core::Validator) then evaluates every expectation and
//!    returns one outcome per expectation.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use term_expect::prelude::*;
//! use term_expect::expectations::{ColumnAggregateBetween, ColumnValuesBetween};
//!
//! # async fn example() -> Result<()> {
//! let engine = DataFusionEngine::new()?;
//! engine.register_csv("events", "data/events.csv").await?;
//!
//! let mut datasource = Datasource::new("warehouse", Arc::new(engine));
//! datasource
//!     .add_asset(
//!         AssetConfig::new("events_by_year", AssetSource::table("events"))
//!             .with_splitter(Splitter::year("event_date"))
//!             .with_order_by(Sorter::parse(["-year"])?),
//!     )
//!     .await?;
//! let resolver = BatchResolver::new(Arc::new(datasource));
//!
//! let suite = ExpectationSuite::builder("events_quality")
//!     .expectation(ColumnAggregateBetween::max("score", RangeBounds::at_most(100)))
//!     .expectation(ColumnValuesBetween::new("score", RangeBounds::between(0, 10)).with_mostly(0.95))
//!     .build();
//!
//! // Validate the most recent year
//! let result = Validator::new()
//!     .validate_request(
//!         &suite,
//!         &resolver,
//!         &BatchRequest::new("events_by_year"),
//!         BatchSelection::First,
//!     )
//!     .await?;
//! println!("{}", result.to_json_pretty()?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Backends
//!
//! - [`InMemoryEngine`](engine::InMemoryEngine) holds Arrow record batches
//!   and computes partitions and metrics in-process.
//! - [`DataFusionEngine`](engine::DataFusionEngine) pushes partition
//!   enumeration and metrics down to SQL, and reads file assets as CSV.
//!
//! Metric providers are registered per `(metric_name, backend)` in a
//! [`MetricRegistry`](metrics::MetricRegistry); a metric without a provider
//! for the active backend fails on its own without stopping the run.
//!
//! ## Logging
//!
//! All entry points are instrumented with `tracing`. Install a subscriber
//! with [`logging::setup::init_logging`] or your own.

pub mod core;
pub mod datasource;
pub mod engine;
pub mod error;
pub mod expectations;
pub mod logging;
pub mod metrics;
pub mod prelude;
pub mod security;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_fixtures;
