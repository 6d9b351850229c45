//! Validates the most recent month of an events table.
//!
//! Registers an in-memory table with the SQL engine, splits it by year and
//! month, and runs a small suite against the newest partition.

use datafusion::arrow::array::{Date32Array, Float64Array, StringArray};
use datafusion::arrow::datatypes::{DataType, Field, Schema};
use datafusion::arrow::record_batch::RecordBatch;
use std::sync::Arc;
use term_expect::expectations::{
    ColumnAggregateBetween, ColumnValuesBetween, ColumnValuesNotNull,
};
use term_expect::logging::setup::{init_logging, LoggingConfig};
use term_expect::prelude::*;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    init_logging(LoggingConfig::development())?;

    // 2024-01-10 .. 2024-03-05
    let schema = Arc::new(Schema::new(vec![
        Field::new("order_id", DataType::Utf8, false),
        Field::new("amount", DataType::Float64, true),
        Field::new("ordered_on", DataType::Date32, false),
    ]));
    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(StringArray::from(vec!["o-1", "o-2", "o-3", "o-4", "o-5", "o-6"])),
            Arc::new(Float64Array::from(vec![
                Some(12.0),
                Some(80.5),
                None,
                Some(45.0),
                Some(300.0),
                Some(19.99),
            ])),
            Arc::new(Date32Array::from(vec![
                19_732, 19_740, 19_760, 19_770, 19_780, 19_787,
            ])),
        ],
    )?;

    let engine = DataFusionEngine::new()?;
    engine.register_batch("orders", batch)?;

    let mut datasource = Datasource::new("shop", Arc::new(engine));
    datasource
        .add_asset(
            AssetConfig::new("orders_by_month", AssetSource::table("orders"))
                .with_splitter(Splitter::year_and_month("ordered_on"))
                .with_order_by(Sorter::parse(["-year", "-month"])?),
        )
        .await?;
    let resolver = BatchResolver::new(Arc::new(datasource));

    for config in resolver.resolve(&BatchRequest::new("orders_by_month")).await? {
        println!("partition {} -> {}", config.partition(), config.id());
    }

    let suite = ExpectationSuite::builder("orders_quality")
        .expectation(ColumnValuesNotNull::new("amount").with_mostly(0.9))
        .expectation(ColumnAggregateBetween::max("amount", RangeBounds::at_most(500.0)))
        .expectation(ColumnValuesBetween::new("amount", RangeBounds::between(0.0, 100.0)))
        .build();

    let result = Validator::new()
        .validate_request(
            &suite,
            &resolver,
            &BatchRequest::new("orders_by_month"),
            BatchSelection::First,
        )
        .await?;

    println!("{}", result.to_json_pretty()?);
    for failure in result.failures() {
        println!("failed: {} ({:?})", failure.expectation_type, failure.status);
    }
    Ok(())
}
