//! SQL engine backed by a DataFusion [`SessionContext`].
//!
//! Partition enumeration is pushed down as a `SELECT DISTINCT` over the
//! splitter's dimension expressions, so the full column never has to be
//! pulled into memory. Each materialized batch is registered as a view
//! named after its batch id; repeated materialization reuses the view.

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use datafusion::execution::context::{SessionConfig, SessionContext};
use datafusion::execution::memory_pool::{FairSpillPool, MemoryPool};
use datafusion::execution::runtime_env::RuntimeEnvBuilder;
use datafusion::prelude::CsvReadOptions;
use datafusion::scalar::ScalarValue;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{BackendTag, Batch, BatchData, ExecutionEngine, SqlBatch};
use crate::datasource::files::{self, PATH_DIMENSION};
use crate::datasource::value::sort_and_dedup;
use crate::datasource::{AssetSource, BatchConfig, KeyValue, PartitionKey, Splitter};
use crate::error::{Result, TermError};
use crate::security::SqlSecurity;

/// Session settings for the SQL engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Batch size for query execution
    pub batch_size: usize,
    /// Target number of partitions for parallel execution
    pub target_partitions: usize,
    /// Maximum memory for query execution (in bytes)
    pub max_memory: usize,
    /// Memory fraction to use before spilling (0.0 to 1.0)
    pub memory_fraction: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 8192,
            target_partitions: num_cpus::get(),
            max_memory: 2 * 1024 * 1024 * 1024, // 2GB
            memory_fraction: 0.9,
        }
    }
}

impl EngineConfig {
    fn validate(&self) -> Result<()> {
        if self.batch_size == 0 || self.target_partitions == 0 {
            return Err(TermError::configuration(
                "batch_size and target_partitions must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.memory_fraction) || self.memory_fraction == 0.0 {
            return Err(TermError::configuration(format!(
                "memory_fraction must be in (0, 1], got {}",
                self.memory_fraction
            )));
        }
        Ok(())
    }
}

/// Executes partition enumeration and metric SQL with DataFusion.
pub struct DataFusionEngine {
    ctx: SessionContext,
    config: EngineConfig,
}

impl std::fmt::Debug for DataFusionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataFusionEngine")
            .field("config", &self.config)
            .finish()
    }
}

impl DataFusionEngine {
    pub fn new() -> Result<Self> {
        Self::with_config(EngineConfig::default())
    }

    #[instrument(skip(config))]
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let session_config = SessionConfig::new()
            .with_batch_size(config.batch_size)
            .with_target_partitions(config.target_partitions)
            .with_information_schema(true);

        let pool_size = (config.max_memory as f64 * config.memory_fraction) as usize;
        let memory_pool = Arc::new(FairSpillPool::new(pool_size)) as Arc<dyn MemoryPool>;

        let runtime_env = RuntimeEnvBuilder::new()
            .with_memory_pool(memory_pool)
            .with_temp_file_path(std::env::temp_dir())
            .build()
            .map(Arc::new)?;

        let ctx = SessionContext::new_with_config_rt(session_config, runtime_env);
        Ok(Self { ctx, config })
    }

    /// Wraps an existing session, for callers that register their own tables.
    pub fn from_context(ctx: SessionContext) -> Self {
        Self {
            ctx,
            config: EngineConfig::default(),
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Registers an in-memory record batch as a table.
    pub fn register_batch(&self, name: &str, batch: RecordBatch) -> Result<()> {
        SqlSecurity::validate_table_name(name)?;
        self.ctx.register_batch(name, batch)?;
        Ok(())
    }

    /// Registers a CSV file as a table.
    pub async fn register_csv(&self, name: &str, path: impl AsRef<Path>) -> Result<()> {
        SqlSecurity::validate_table_name(name)?;
        let path = path_str(path.as_ref())?;
        self.ctx
            .register_csv(name, path, CsvReadOptions::new())
            .await?;
        Ok(())
    }

    async fn query_keys(&self, sql: &str, dimensions: &[String]) -> Result<Vec<PartitionKey>> {
        let batches = self.ctx.sql(sql).await?.collect().await?;
        let mut keys = Vec::new();
        for batch in &batches {
            for row in 0..batch.num_rows() {
                let mut key = PartitionKey::new();
                for (i, dimension) in dimensions.iter().enumerate() {
                    let scalar = ScalarValue::try_from_array(batch.column(i), row)?;
                    key.insert(dimension.as_str(), KeyValue::from_scalar(&scalar)?);
                }
                keys.push(key);
            }
        }
        // DISTINCT output order is unspecified
        sort_and_dedup(&mut keys, dimensions);
        Ok(keys)
    }
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| {
        TermError::configuration(format!("path '{}' is not valid UTF-8", path.display()))
    })
}

async fn file_keys(source: &AssetSource) -> Result<Vec<PartitionKey>> {
    match source {
        AssetSource::Files {
            base_directory,
            glob,
            batching_regex,
        } => {
            let regex = files::compile_batching_regex(batching_regex)?;
            files::enumerate_files_blocking(base_directory.clone(), glob.clone(), regex).await
        }
        AssetSource::Table { .. } => Ok(Vec::new()),
    }
}

fn file_path(base_directory: &Path, partition: &PartitionKey) -> Result<PathBuf> {
    match partition.get(PATH_DIMENSION) {
        Some(KeyValue::Text(relative)) => Ok(base_directory.join(relative)),
        _ => Err(TermError::Internal(format!(
            "file batch {partition} has no '{PATH_DIMENSION}' dimension"
        ))),
    }
}

/// Builds the `WHERE` predicate selecting one partition.
fn partition_predicate(splitter: &Splitter, partition: &PartitionKey) -> Result<String> {
    let clauses = splitter
        .sql_dimensions()?
        .into_iter()
        .map(|(dimension, expr)| match partition.get(&dimension) {
            Some(KeyValue::Null) => Ok(format!("{expr} IS NULL")),
            Some(value) => Ok(format!("{expr} = {}", value.to_sql_literal())),
            None => Err(TermError::Internal(format!(
                "partition {partition} lacks dimension '{dimension}'"
            ))),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(clauses.join(" AND "))
}

#[async_trait]
impl ExecutionEngine for DataFusionEngine {
    fn backend(&self) -> BackendTag {
        BackendTag::Sql
    }

    async fn schema(&self, source: &AssetSource) -> Result<SchemaRef> {
        match source {
            AssetSource::Table { table_name } => {
                let df = self.ctx.table(table_name.as_str()).await?;
                Ok(df.schema().inner().clone())
            }
            AssetSource::Files { base_directory, .. } => {
                let first = file_keys(source).await?.into_iter().next().ok_or_else(|| {
                    TermError::configuration(format!(
                        "no files under '{}' match the asset",
                        base_directory.display()
                    ))
                })?;
                let path = file_path(base_directory, &first)?;
                let df = self
                    .ctx
                    .read_csv(path_str(&path)?, CsvReadOptions::new())
                    .await?;
                Ok(df.schema().inner().clone())
            }
        }
    }

    #[instrument(skip(self, source, splitter))]
    async fn partition_keys(
        &self,
        source: &AssetSource,
        splitter: Option<&Splitter>,
    ) -> Result<Vec<PartitionKey>> {
        let table_name = match source {
            AssetSource::Files { .. } => return file_keys(source).await,
            AssetSource::Table { table_name } => table_name,
        };
        let Some(splitter) = splitter else {
            return Ok(vec![PartitionKey::new()]);
        };

        let table = SqlSecurity::escape_identifier(table_name)?;
        let dimensions = splitter.sql_dimensions()?;
        let select = dimensions
            .iter()
            .map(|(name, expr)| Ok(format!("{expr} AS {}", SqlSecurity::escape_identifier(name)?)))
            .collect::<Result<Vec<_>>>()?
            .join(", ");
        let sql = format!("SELECT DISTINCT {select} FROM {table}");
        debug!(sql = %sql, "Enumerating partitions");

        let names: Vec<String> = dimensions.into_iter().map(|(name, _)| name).collect();
        let keys = self.query_keys(&sql, &names).await?;
        debug!(
            splitter = splitter.method(),
            partitions = keys.len(),
            "Enumerated partitions"
        );
        Ok(keys)
    }

    #[instrument(skip(self, config), fields(batch.id = %config.id()))]
    async fn materialize(&self, config: &BatchConfig) -> Result<Batch> {
        let view_name = match (config.source(), config.splitter()) {
            (AssetSource::Table { table_name }, None) => {
                SqlSecurity::validate_table_name(table_name)?;
                table_name.clone()
            }
            (AssetSource::Table { table_name }, Some(splitter)) => {
                let view_name = format!("batch_{}", config.id());
                if !self.ctx.table_exist(view_name.as_str())? {
                    let table = SqlSecurity::escape_identifier(table_name)?;
                    let predicate = partition_predicate(splitter, config.partition())?;
                    let sql = format!("SELECT * FROM {table} WHERE {predicate}");
                    debug!(sql = %sql, "Registering batch view");
                    let view = self.ctx.sql(&sql).await?.into_view();
                    self.ctx.register_table(view_name.as_str(), view)?;
                }
                view_name
            }
            (AssetSource::Files { base_directory, .. }, _) => {
                let view_name = format!("batch_{}", config.id());
                if !self.ctx.table_exist(view_name.as_str())? {
                    let path = file_path(base_directory, config.partition())?;
                    debug!(path = %path.display(), "Registering file batch");
                    self.ctx
                        .register_csv(view_name.as_str(), path_str(&path)?, CsvReadOptions::new())
                        .await?;
                }
                view_name
            }
        };

        Ok(Batch::new(
            config.clone(),
            BatchData::Sql(SqlBatch::new(self.ctx.clone(), view_name)),
        ))
    }
}
