//! Prelude for commonly used types and traits in term-expect.

pub use crate::core::{
    Expectation, ExpectationOptions, ExpectationStatus, ExpectationSuite, ResultFormat,
    SuiteValidationResult, Validator, ValidatorConfig,
};
pub use crate::datasource::{
    AssetConfig, AssetSource, BatchRequest, BatchResolver, BatchSelection, Datasource,
    DatasourceConfig, KeyValue, PartitionKey, Sorter, Splitter,
};
pub use crate::engine::{Batch, DataFusionEngine, ExecutionEngine, InMemoryEngine};
pub use crate::error::{ErrorContext, Result, TermError};
pub use crate::expectations::RangeBounds;
pub use crate::logging::LogConfig;
pub use crate::metrics::{MetricConfiguration, MetricRegistry, MetricValue};
