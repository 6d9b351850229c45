//! Shared fixtures for unit tests, integration tests and benchmarks.
//!
//! The `events` table has ten rows:
//!
//! | column       | values                                       |
//! |--------------|----------------------------------------------|
//! | `id`         | 0 through 9                                  |
//! | `score`      | 1 through 10                                 |
//! | `amount`     | floats, `NULL` at id 4                       |
//! | `category`   | a, b, a, c, b, a, c, b, a, c                 |
//! | `event_date` | ids 0-4 in 2022, ids 5-9 in 2023             |

use arrow::array::{Date32Array, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::datasource::{
    AssetConfig, AssetSource, BatchConfig, BatchResolver, Datasource, PartitionKey, Sorter,
    Splitter,
};
use crate::engine::{Batch, DataFusionEngine, ExecutionEngine, InMemoryEngine};
use crate::error::{Result, TermError};
use crate::metrics::{DependencyValues, MetricConfiguration, MetricProvider, MetricValue};

pub const EVENTS_TABLE: &str = "events";

fn days_since_epoch(year: i32, month: u32, day: u32) -> i32 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    NaiveDate::from_ymd_opt(year, month, day)
        .map(|d| (d - epoch).num_days() as i32)
        .unwrap_or_default()
}

/// The ten-row `events` fixture.
pub fn events_batch() -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("score", DataType::Int64, false),
        Field::new("amount", DataType::Float64, true),
        Field::new("category", DataType::Utf8, false),
        Field::new("event_date", DataType::Date32, false),
    ]));

    let dates = [
        (2022, 1, 15),
        (2022, 3, 2),
        (2022, 6, 30),
        (2022, 9, 9),
        (2022, 12, 31),
        (2023, 1, 1),
        (2023, 2, 14),
        (2023, 5, 20),
        (2023, 8, 8),
        (2023, 11, 11),
    ];

    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from((0..10).collect::<Vec<i64>>())),
            Arc::new(Int64Array::from((1..=10).collect::<Vec<i64>>())),
            Arc::new(Float64Array::from(vec![
                Some(10.5),
                Some(20.0),
                Some(7.25),
                Some(99.9),
                None,
                Some(15.0),
                Some(42.0),
                Some(3.5),
                Some(60.0),
                Some(8.75),
            ])),
            Arc::new(StringArray::from(vec![
                "a", "b", "a", "c", "b", "a", "c", "b", "a", "c",
            ])),
            Arc::new(Date32Array::from(
                dates
                    .iter()
                    .map(|(y, m, d)| days_since_epoch(*y, *m, *d))
                    .collect::<Vec<i32>>(),
            )),
        ],
    )
    .unwrap_or_else(|e| panic!("events fixture is malformed: {e}"))
}

/// An in-memory engine holding the `events` table.
pub fn memory_engine() -> InMemoryEngine {
    InMemoryEngine::new().with_table(EVENTS_TABLE, events_batch())
}

/// A DataFusion engine with the `events` table registered.
pub fn sql_engine() -> Result<DataFusionEngine> {
    let engine = DataFusionEngine::new()?;
    engine.register_batch(EVENTS_TABLE, events_batch())?;
    Ok(engine)
}

/// Both backends over the same `events` data, labelled for assertion messages.
pub fn engines() -> Result<Vec<(&'static str, Arc<dyn ExecutionEngine>)>> {
    Ok(vec![
        ("in_memory", Arc::new(memory_engine())),
        ("sql", Arc::new(sql_engine()?)),
    ])
}

/// A resolver over `events` with three assets: `events` (whole table),
/// `events_by_mod` (`id mod 4`) and `events_by_year` (newest first).
pub async fn events_resolver(engine: Arc<dyn ExecutionEngine>) -> Result<BatchResolver> {
    let mut datasource = Datasource::new("warehouse", engine);
    datasource
        .add_asset(AssetConfig::new(EVENTS_TABLE, AssetSource::table(EVENTS_TABLE)))
        .await?;
    datasource
        .add_asset(
            AssetConfig::new("events_by_mod", AssetSource::table(EVENTS_TABLE))
                .with_splitter(Splitter::mod_integer("id", 4)),
        )
        .await?;
    datasource
        .add_asset(
            AssetConfig::new("events_by_year", AssetSource::table(EVENTS_TABLE))
                .with_splitter(Splitter::year("event_date"))
                .with_order_by(Sorter::parse(["-year"])?),
        )
        .await?;
    Ok(BatchResolver::new(Arc::new(datasource)))
}

/// Materializes the whole `events` table as one batch on the given engine.
pub async fn events_table_batch(engine: &dyn ExecutionEngine) -> Result<Batch> {
    let config = BatchConfig::new(
        "fixtures",
        EVENTS_TABLE,
        AssetSource::table(EVENTS_TABLE),
        None,
        PartitionKey::new(),
    );
    engine.materialize(&config).await
}

/// Returns a fixed value and counts how often it was invoked.
#[derive(Debug, Clone)]
pub struct CountingProvider {
    calls: Arc<AtomicUsize>,
    value: MetricValue,
}

impl CountingProvider {
    pub fn new(value: impl Into<MetricValue>) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            value: value.into(),
        }
    }

    /// Handle onto the shared invocation counter.
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl MetricProvider for CountingProvider {
    async fn compute(
        &self,
        _: &Batch,
        _: &MetricConfiguration,
        _: &DependencyValues,
    ) -> Result<MetricValue> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.value.clone())
    }
}

/// Always fails with a computation error.
#[derive(Debug, Clone)]
pub struct FailingProvider {
    message: String,
}

impl FailingProvider {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl MetricProvider for FailingProvider {
    async fn compute(
        &self,
        _: &Batch,
        metric: &MetricConfiguration,
        _: &DependencyValues,
    ) -> Result<MetricValue> {
        Err(TermError::metric_computation(
            metric.id().to_string(),
            self.message.clone(),
        ))
    }
}
