//! Metric definitions, the dependency graph and its executor.
//!
//! A metric is identified by a [`MetricConfiguration`]: its name, the
//! domain it is computed over and any value kwargs. The [`MetricRegistry`]
//! declares which metrics each metric needs and holds one
//! [`MetricProvider`] per backend. [`MetricExecutor::resolve`] expands a
//! request into a [`MetricGraph`], computes every distinct metric exactly
//! once and reports failures per metric.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use term_expect::metrics::{names, MetricConfiguration, MetricExecutor, MetricRegistry};
//! # use term_expect::engine::Batch;
//! # async fn example(batch: Batch) -> term_expect::error::Result<()> {
//! let executor = MetricExecutor::new(MetricRegistry::global()).with_max_concurrency(4);
//! let mean = MetricConfiguration::column(names::COLUMN_MEAN, "score");
//! let resolution = executor.resolve(&batch, &[mean.clone()]).await?;
//! println!("{:?}", resolution.value(&mean));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod executor;
pub mod graph;
mod providers;
pub mod registry;
pub mod types;

pub use config::{MetricConfiguration, MetricDomain, MetricId};
pub use executor::{FailureKind, MetricCache, MetricExecutor, MetricFailure, MetricResolution};
pub use graph::{MetricGraph, MetricNode, NodeId};
pub use registry::{DependencyValues, FnProvider, MetricProvider, MetricRegistry};
pub use types::MetricValue;

/// Names of the built-in metrics.
pub mod names {
    pub const TABLE_ROW_COUNT: &str = "table.row_count";
    pub const TABLE_COLUMNS: &str = "table.columns";
    pub const COLUMN_MIN: &str = "column.min";
    pub const COLUMN_MAX: &str = "column.max";
    pub const COLUMN_SUM: &str = "column.sum";
    pub const COLUMN_MEAN: &str = "column.mean";
    pub const COLUMN_NONNULL_COUNT: &str = "column_values.nonnull.count";
    pub const COLUMN_NULL_COUNT: &str = "column_values.null.count";
    /// Non-null values outside the bounds given in the value kwargs.
    pub const COLUMN_BETWEEN_UNEXPECTED_COUNT: &str = "column_values.between.unexpected_count";
}
