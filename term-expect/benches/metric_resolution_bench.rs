//! Benchmarks for partition enumeration and suite validation.
//!
//! Compares the in-memory and SQL backends on the same generated table.

use arrow::array::{Date32Array, Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;
use term_expect::core::{ExpectationSuite, Validator};
use term_expect::datasource::{
    AssetConfig, AssetSource, BatchRequest, BatchResolver, BatchSelection, Datasource, Sorter,
    Splitter,
};
use term_expect::engine::{Batch, DataFusionEngine, ExecutionEngine, InMemoryEngine};
use term_expect::expectations::{
    ColumnAggregateBetween, ColumnValuesBetween, ColumnValuesNotNull, RangeBounds,
    TableRowCountBetween,
};

/// Deterministic rows spread over four years, every 50th amount null.
fn create_test_data(rows: usize) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("amount", DataType::Float64, true),
        Field::new("event_date", DataType::Date32, false),
    ]));

    // 2020-01-01
    let start = 18_262;
    let ids: Vec<i64> = (0..rows as i64).collect();
    let amounts: Vec<Option<f64>> = ids
        .iter()
        .map(|i| (i % 50 != 0).then(|| ((i * 37) % 1000) as f64 / 10.0))
        .collect();
    let dates: Vec<i32> = ids.iter().map(|i| start + (i % 1461) as i32).collect();

    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(ids)),
            Arc::new(Float64Array::from(amounts)),
            Arc::new(Date32Array::from(dates)),
        ],
    )
    .unwrap()
}

fn backends(rows: usize) -> Vec<(&'static str, Arc<dyn ExecutionEngine>)> {
    let data = create_test_data(rows);
    let memory = InMemoryEngine::new().with_table("events", data.clone());
    let sql = DataFusionEngine::new().unwrap();
    sql.register_batch("events", data).unwrap();
    let memory: Arc<dyn ExecutionEngine> = Arc::new(memory);
    let sql: Arc<dyn ExecutionEngine> = Arc::new(sql);
    vec![("in_memory", memory), ("sql", sql)]
}

async fn resolver(engine: Arc<dyn ExecutionEngine>) -> BatchResolver {
    let mut datasource = Datasource::new("bench", engine);
    datasource
        .add_asset(AssetConfig::new("events", AssetSource::table("events")))
        .await
        .unwrap();
    datasource
        .add_asset(
            AssetConfig::new("events_by_month", AssetSource::table("events"))
                .with_splitter(Splitter::year_and_month("event_date"))
                .with_order_by(Sorter::parse(["-year", "-month"]).unwrap()),
        )
        .await
        .unwrap();
    BatchResolver::new(Arc::new(datasource))
}

fn quality_suite() -> ExpectationSuite {
    ExpectationSuite::builder("bench")
        .expectation(TableRowCountBetween::new(RangeBounds::at_least(1)))
        .expectation(ColumnAggregateBetween::min("amount", RangeBounds::at_least(0.0)))
        .expectation(ColumnAggregateBetween::max("amount", RangeBounds::at_most(100.0)))
        .expectation(ColumnAggregateBetween::mean("amount", RangeBounds::between(0.0, 100.0)))
        .expectation(
            ColumnValuesBetween::new("amount", RangeBounds::between(0.0, 90.0)).with_mostly(0.8),
        )
        .expectation(ColumnValuesNotNull::new("amount").with_mostly(0.95))
        .build()
}

fn bench_partition_enumeration(c: &mut Criterion) {
    let mut group = c.benchmark_group("partition_enumeration");
    let runtime = tokio::runtime::Runtime::new().unwrap();

    for (backend, engine) in backends(10_000) {
        let resolver = runtime.block_on(resolver(engine));
        let request = BatchRequest::new("events_by_month");
        group.bench_function(BenchmarkId::new("year_and_month", backend), |b| {
            b.iter(|| {
                runtime.block_on(async {
                    std::hint::black_box(resolver.resolve(&request).await.unwrap())
                })
            });
        });
    }

    group.finish();
}

fn bench_suite_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("suite_validation");
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let suite = quality_suite();
    let validator = Validator::new();

    for size in [1_000, 10_000] {
        for (backend, engine) in backends(size) {
            let batch: Batch = runtime.block_on(async {
                resolver(engine)
                    .await
                    .get_batch(&BatchRequest::new("events"), BatchSelection::First)
                    .await
                    .unwrap()
            });
            group.bench_with_input(BenchmarkId::new(backend, size), &batch, |b, batch| {
                b.iter(|| {
                    runtime.block_on(async {
                        std::hint::black_box(validator.validate(&suite, batch).await.unwrap())
                    })
                });
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_partition_enumeration, bench_suite_validation);
criterion_main!(benches);
