//! In-process engine over Arrow record batches.

use arrow::array::{ArrayRef, BooleanArray};
use arrow::compute::filter_record_batch;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use datafusion::scalar::ScalarValue;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{BackendTag, Batch, BatchData, ExecutionEngine};
use crate::datasource::{AssetSource, BatchConfig, KeyValue, PartitionKey, Splitter};
use crate::error::{Result, TermError};

/// Holds named tables in memory and evaluates everything row by row.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEngine {
    tables: HashMap<String, Arc<RecordBatch>>,
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table, replacing any table of the same name.
    pub fn with_table(mut self, name: impl Into<String>, batch: RecordBatch) -> Self {
        self.tables.insert(name.into(), Arc::new(batch));
        self
    }

    fn table(&self, source: &AssetSource) -> Result<&Arc<RecordBatch>> {
        match source {
            AssetSource::Table { table_name } => {
                self.tables.get(table_name).ok_or_else(|| {
                    TermError::configuration(format!(
                        "table '{table_name}' is not registered with the in-memory engine"
                    ))
                })
            }
            AssetSource::Files { .. } => Err(TermError::NotSupported(
                "file assets require the SQL engine".to_string(),
            )),
        }
    }
}

/// Reads one column as key values, nulls included.
pub fn column_values(batch: &RecordBatch, column: &str) -> Result<Vec<KeyValue>> {
    let array = column_array(batch, column)?;
    (0..array.len())
        .map(|row| {
            let scalar = ScalarValue::try_from_array(array, row)?;
            KeyValue::from_scalar(&scalar)
        })
        .collect()
}

fn column_array<'a>(batch: &'a RecordBatch, column: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(column)
        .ok_or_else(|| TermError::ColumnNotFound {
            column: column.to_string(),
        })
}

/// Derives the partition key of every row.
fn row_keys(batch: &RecordBatch, splitter: &Splitter) -> Result<Vec<PartitionKey>> {
    let columns = splitter
        .columns()
        .into_iter()
        .map(|c| column_values(batch, c))
        .collect::<Result<Vec<_>>>()?;

    let mut row_values = Vec::with_capacity(columns.len());
    (0..batch.num_rows())
        .map(|row| {
            row_values.clear();
            row_values.extend(columns.iter().map(|values| values[row].clone()));
            splitter.derive(&row_values)
        })
        .collect()
}

#[async_trait]
impl ExecutionEngine for InMemoryEngine {
    fn backend(&self) -> BackendTag {
        BackendTag::InMemory
    }

    async fn schema(&self, source: &AssetSource) -> Result<SchemaRef> {
        Ok(self.table(source)?.schema())
    }

    #[instrument(skip(self, source, splitter))]
    async fn partition_keys(
        &self,
        source: &AssetSource,
        splitter: Option<&Splitter>,
    ) -> Result<Vec<PartitionKey>> {
        let table = self.table(source)?;
        let Some(splitter) = splitter else {
            return Ok(vec![PartitionKey::new()]);
        };

        let mut keys = row_keys(table, splitter)?;
        crate::datasource::value::sort_and_dedup(&mut keys, &splitter.dimension_names());
        debug!(
            splitter = splitter.method(),
            partitions = keys.len(),
            "Enumerated partitions"
        );
        Ok(keys)
    }

    #[instrument(skip(self, config), fields(batch.id = %config.id()))]
    async fn materialize(&self, config: &BatchConfig) -> Result<Batch> {
        let table = self.table(config.source())?;
        let rows = match config.splitter() {
            None => Arc::clone(table),
            Some(splitter) => {
                let mask: BooleanArray = row_keys(table, splitter)?
                    .iter()
                    .map(|key| Some(key == config.partition()))
                    .collect();
                Arc::new(filter_record_batch(table, &mask)?)
            }
        };
        debug!(rows = rows.num_rows(), "Materialized in-memory batch");
        Ok(Batch::new(config.clone(), BatchData::InMemory(rows)))
    }
}
