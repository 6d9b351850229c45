//! Backend capability interface and its implementations.
//!
//! An [`ExecutionEngine`] is the only component that touches data. The
//! resolver asks it for the distinct partition-key space of an asset and
//! for a materialized [`Batch`]; metric providers then compute against the
//! batch's [`BatchData`], dispatching on the engine's [`BackendTag`].

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use datafusion::prelude::SessionContext;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::datasource::{AssetSource, BatchConfig, PartitionKey, Splitter};
use crate::error::Result;

pub mod memory;
pub mod sql;

pub use memory::InMemoryEngine;
pub use sql::{DataFusionEngine, EngineConfig};

/// Identifies which family of metric providers can run against a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendTag {
    /// Arrow record batches evaluated in-process.
    InMemory,
    /// A DataFusion SQL session.
    Sql,
}

impl BackendTag {
    pub const ALL: [BackendTag; 2] = [BackendTag::InMemory, BackendTag::Sql];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendTag::InMemory => "in_memory",
            BackendTag::Sql => "sql",
        }
    }
}

impl fmt::Display for BackendTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The operations the resolver and metric executor need from a backend.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// The provider family batches of this engine are computed with.
    fn backend(&self) -> BackendTag;

    /// Schema of the rows behind an asset source.
    async fn schema(&self, source: &AssetSource) -> Result<SchemaRef>;

    /// Distinct partition keys of an asset, ascending by dimension.
    ///
    /// An unsplit table yields a single empty key. An empty table with a
    /// splitter yields no keys.
    async fn partition_keys(
        &self,
        source: &AssetSource,
        splitter: Option<&Splitter>,
    ) -> Result<Vec<PartitionKey>>;

    /// Makes the rows of one partition addressable for metric computation.
    async fn materialize(&self, config: &BatchConfig) -> Result<Batch>;
}

/// A SQL relation holding one batch's rows.
#[derive(Clone)]
pub struct SqlBatch {
    ctx: SessionContext,
    view_name: String,
}

impl SqlBatch {
    pub(crate) fn new(ctx: SessionContext, view_name: String) -> Self {
        Self { ctx, view_name }
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Unquoted name of the registered table or view.
    pub fn view_name(&self) -> &str {
        &self.view_name
    }
}

impl fmt::Debug for SqlBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlBatch")
            .field("view_name", &self.view_name)
            .finish()
    }
}

/// Backend-specific rows of a materialized batch.
#[derive(Debug, Clone)]
pub enum BatchData {
    InMemory(Arc<RecordBatch>),
    Sql(SqlBatch),
}

impl BatchData {
    pub fn backend(&self) -> BackendTag {
        match self {
            BatchData::InMemory(_) => BackendTag::InMemory,
            BatchData::Sql(_) => BackendTag::Sql,
        }
    }
}

/// A concrete, materialized slice of a data asset.
#[derive(Debug, Clone)]
pub struct Batch {
    config: Arc<BatchConfig>,
    data: BatchData,
}

impl Batch {
    pub fn new(config: BatchConfig, data: BatchData) -> Self {
        Self {
            config: Arc::new(config),
            data,
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn id(&self) -> &str {
        self.config.id()
    }

    pub fn data(&self) -> &BatchData {
        &self.data
    }

    pub fn backend(&self) -> BackendTag {
        self.data.backend()
    }
}
