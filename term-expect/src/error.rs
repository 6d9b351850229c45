//! Error types for the Term expectation engine.
//!
//! Every fallible operation in the crate returns [`TermError`]. The variants
//! follow the lifecycle of a validation run: setup-time configuration errors
//! abort immediately, resolver errors are returned to the caller who may retry
//! with a different request, and metric or expectation errors are contained to
//! the smallest affected unit by the executor and validator.

use thiserror::Error;

/// The main error type for the Term expectation engine.
#[derive(Error, Debug)]
pub enum TermError {
    /// Invalid splitter, sorter, asset or datasource setup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested data asset does not exist on the datasource.
    #[error("Data asset '{asset}' not found on datasource '{datasource}'")]
    AssetNotFound {
        /// Name of the datasource that was searched
        datasource: String,
        /// Name of the missing asset
        asset: String,
    },

    /// The request demanded exactly one batch and none matched.
    #[error("No batch of asset '{asset}' matches options {options}")]
    NoMatchingBatch {
        /// Name of the asset
        asset: String,
        /// Rendered request options
        options: String,
    },

    /// The request demanded exactly one batch and several matched.
    #[error("Request against asset '{asset}' is ambiguous: {count} batches match")]
    AmbiguousBatch {
        /// Name of the asset
        asset: String,
        /// Number of matching batches
        count: usize,
    },

    /// Metric definitions depend on each other in a cycle.
    #[error("Cyclic metric dependency: {}", cycle.join(" -> "))]
    CyclicMetricDependency {
        /// Metric identities forming the cycle, first element repeated at the end
        cycle: Vec<String>,
    },

    /// No provider exists for the metric on the active backend.
    #[error("Metric '{metric}' is not supported by the {backend} backend")]
    UnsupportedMetric {
        /// Metric name
        metric: String,
        /// Backend tag
        backend: String,
    },

    /// A metric provider raised while computing a value.
    #[error("Metric computation failed for '{metric}': {message}")]
    MetricComputation {
        /// Metric identity
        metric: String,
        /// Detailed error message
        message: String,
    },

    /// An expectation's own kwargs are inconsistent.
    #[error("Invalid configuration for '{expectation}': {message}")]
    ConfigurationInvalid {
        /// Expectation type
        expectation: String,
        /// Detailed error message
        message: String,
    },

    /// Error from DataFusion operations.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error when a required column is not found in the dataset.
    #[error("Column '{column}' not found in dataset")]
    ColumnNotFound { column: String },

    /// Error when data types don't match expected types.
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// Error when an operation is not supported.
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// Security-related error.
    #[error("Security error: {0}")]
    SecurityError(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, TermError>`.
///
/// # Examples
///
/// ```rust
/// use term_expect::error::Result;
///
/// fn resolve_nothing() -> Result<()> {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, TermError>;

impl TermError {
    /// Creates a new configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates a new metric computation error.
    pub fn metric_computation(metric: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MetricComputation {
            metric: metric.into(),
            message: message.into(),
        }
    }

    /// Creates a new expectation configuration error.
    pub fn configuration_invalid(
        expectation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ConfigurationInvalid {
            expectation: expectation.into(),
            message: message.into(),
        }
    }

    /// Returns true when the caller may retry with a different request.
    ///
    /// Setup errors and cyclic metric definitions are programming or
    /// configuration defects and are never recoverable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TermError::AssetNotFound { .. }
                | TermError::NoMatchingBatch { .. }
                | TermError::AmbiguousBatch { .. }
                | TermError::UnsupportedMetric { .. }
                | TermError::MetricComputation { .. }
                | TermError::ConfigurationInvalid { .. }
        )
    }
}

impl From<serde_json::Error> for TermError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<TermError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| match e.into() {
            TermError::Internal(inner) => TermError::Internal(format!("{msg}: {inner}")),
            other => TermError::Internal(format!("{msg}: {other}")),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let msg = f();
            match e.into() {
                TermError::Internal(inner) => TermError::Internal(format!("{msg}: {inner}")),
                other => TermError::Internal(format!("{msg}: {other}")),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_not_found_message() {
        let err = TermError::AssetNotFound {
            datasource: "warehouse".to_string(),
            asset: "events".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Data asset 'events' not found on datasource 'warehouse'"
        );
    }

    #[test]
    fn test_cycle_message_joins_path() {
        let err = TermError::CyclicMetricDependency {
            cycle: vec!["a".to_string(), "b".to_string(), "a".to_string()],
        };
        assert_eq!(err.to_string(), "Cyclic metric dependency: a -> b -> a");
    }

    #[test]
    fn test_recoverability() {
        assert!(TermError::AmbiguousBatch {
            asset: "events".to_string(),
            count: 2
        }
        .is_recoverable());
        assert!(!TermError::configuration("bad splitter").is_recoverable());
        assert!(!TermError::CyclicMetricDependency { cycle: vec![] }.is_recoverable());
    }

    #[test]
    fn test_column_not_found() {
        let err = TermError::ColumnNotFound {
            column: "user_id".to_string(),
        };
        assert_eq!(err.to_string(), "Column 'user_id' not found in dataset");
    }

    #[test]
    fn test_error_context() {
        fn failing_operation() -> Result<()> {
            Err(TermError::Internal("Something went wrong".to_string()))
        }

        let err = failing_operation()
            .context("During batch resolution")
            .unwrap_err();
        assert!(err.to_string().contains("During batch resolution"));
    }
}
