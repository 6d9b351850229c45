//! Integration tests for batch resolution across both backends.

use arrow::array::{Date32Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use std::fs;
use std::sync::Arc;
use term_expect::datasource::{
    AssetConfig, AssetSource, BatchRequest, BatchResolver, BatchSelection, Datasource,
    DatasourceConfig, DatePart, KeyValue, PartitionKey, Sorter, Splitter,
};
use term_expect::engine::{
    Batch, BatchData, DataFusionEngine, ExecutionEngine, InMemoryEngine,
};
use term_expect::error::TermError;
use term_expect::test_fixtures::{engines, events_batch, events_resolver, memory_engine};

fn ids_of(data: &BatchData) -> Vec<i64> {
    match data {
        BatchData::InMemory(rows) => term_expect::engine::memory::column_values(rows, "id")
            .unwrap()
            .into_iter()
            .filter_map(|v| v.as_i64())
            .collect(),
        BatchData::Sql(_) => Vec::new(),
    }
}

#[tokio::test]
async fn test_mod_integer_partitions_and_constraint() {
    for (backend, engine) in engines().unwrap() {
        let resolver = events_resolver(engine).await.unwrap();

        let all = resolver
            .resolve(&BatchRequest::new("events_by_mod"))
            .await
            .unwrap();
        let values: Vec<&KeyValue> = all
            .iter()
            .filter_map(|c| c.partition().get("id"))
            .collect();
        assert_eq!(
            values,
            vec![
                &KeyValue::Integer(0),
                &KeyValue::Integer(1),
                &KeyValue::Integer(2),
                &KeyValue::Integer(3)
            ],
            "{backend}"
        );

        let request = BatchRequest::new("events_by_mod").with_option("id", 2);
        let matching = resolver.resolve(&request).await.unwrap();
        assert_eq!(matching.len(), 1, "{backend}");

        let batch = resolver
            .get_batch(&request, BatchSelection::All)
            .await
            .unwrap();
        if backend == "in_memory" {
            assert_eq!(ids_of(batch.data()), vec![2, 6]);
        }
        assert_eq!(batch.id(), matching[0].id());
    }
}

#[tokio::test]
async fn test_first_of_descending_year_is_latest() {
    for (backend, engine) in engines().unwrap() {
        let resolver = events_resolver(engine).await.unwrap();
        let config = resolver
            .resolve_one(&BatchRequest::new("events_by_year"), BatchSelection::First)
            .await
            .unwrap();
        assert_eq!(
            config.partition(),
            &PartitionKey::from_pairs([("year", 2023)]),
            "{backend}"
        );

        let oldest = resolver
            .resolve_one(&BatchRequest::new("events_by_year"), BatchSelection::Last)
            .await
            .unwrap();
        assert_eq!(oldest.partition().get("year"), Some(&KeyValue::Integer(2022)));
    }
}

#[tokio::test]
async fn test_order_by_override() {
    let resolver = events_resolver(Arc::new(memory_engine())).await.unwrap();
    let request =
        BatchRequest::new("events_by_year").with_order_by(Sorter::parse(["+year"]).unwrap());
    let first = resolver
        .resolve_one(&request, BatchSelection::First)
        .await
        .unwrap();
    assert_eq!(first.partition().get("year"), Some(&KeyValue::Integer(2022)));

    let unknown =
        BatchRequest::new("events_by_year").with_order_by(Sorter::parse(["-month"]).unwrap());
    assert!(matches!(
        resolver.resolve(&unknown).await,
        Err(TermError::Configuration(_))
    ));
}

#[tokio::test]
async fn test_selection_errors_are_recoverable() {
    let resolver = events_resolver(Arc::new(memory_engine())).await.unwrap();

    let ambiguous = resolver
        .resolve_one(&BatchRequest::new("events_by_mod"), BatchSelection::All)
        .await
        .unwrap_err();
    assert!(matches!(ambiguous, TermError::AmbiguousBatch { count: 4, .. }));
    assert!(ambiguous.is_recoverable());

    let empty = BatchRequest::new("events_by_mod").with_option("id", 7);
    assert!(resolver.resolve(&empty).await.unwrap().is_empty());
    let none = resolver
        .resolve_one(&empty, BatchSelection::First)
        .await
        .unwrap_err();
    assert!(matches!(none, TermError::NoMatchingBatch { .. }));

    let missing = resolver
        .resolve(&BatchRequest::new("orders"))
        .await
        .unwrap_err();
    assert!(matches!(missing, TermError::AssetNotFound { .. }));
    assert!(missing.is_recoverable());
}

#[tokio::test]
async fn test_index_selection() {
    let resolver = events_resolver(Arc::new(memory_engine())).await.unwrap();
    let request = BatchRequest::new("events_by_mod");

    let last = resolver
        .select(&request, BatchSelection::Index(-1))
        .await
        .unwrap();
    assert_eq!(last.len(), 1);
    assert_eq!(last[0].partition().get("id"), Some(&KeyValue::Integer(3)));

    let out_of_range = resolver
        .select(&request, BatchSelection::Index(4))
        .await
        .unwrap();
    assert!(out_of_range.is_empty());
}

#[tokio::test]
async fn test_unsplit_asset_is_single_batch() {
    for (_, engine) in engines().unwrap() {
        let resolver = events_resolver(engine).await.unwrap();
        let configs = resolver.resolve(&BatchRequest::new("events")).await.unwrap();
        assert_eq!(configs.len(), 1);
        assert!(configs[0].partition().is_empty());
    }
}

#[tokio::test]
async fn test_splitter_rejected_for_column_type() {
    let mut datasource = Datasource::new("memory", Arc::new(memory_engine()));
    let err = datasource
        .add_asset(
            AssetConfig::new("bad", AssetSource::table("events"))
                .with_splitter(Splitter::year("score")),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TermError::Configuration(_)));

    let err = datasource
        .add_asset(
            AssetConfig::new("bad_sort", AssetSource::table("events"))
                .with_splitter(Splitter::mod_integer("id", 4))
                .with_order_by(Sorter::parse(["-year"]).unwrap()),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, TermError::Configuration(_)));
}

#[tokio::test]
async fn test_datasource_from_json_config() {
    let config = DatasourceConfig::from_json_str(
        r#"{
            "config_version": 1,
            "name": "warehouse",
            "assets": [
                {
                    "name": "events_by_month",
                    "source": { "type": "table", "table_name": "events" },
                    "splitter": { "method": "year_and_month", "column_name": "event_date" },
                    "order_by": ["-year", { "key": "month", "reverse": true }]
                }
            ]
        }"#,
    )
    .unwrap();

    let engine = Arc::new(InMemoryEngine::new().with_table("events", events_batch()));
    let datasource = Datasource::from_config(config, engine).await.unwrap();
    let resolver = BatchResolver::new(Arc::new(datasource));

    let first = resolver
        .resolve_one(&BatchRequest::new("events_by_month"), BatchSelection::First)
        .await
        .unwrap();
    assert_eq!(
        first.partition(),
        &PartitionKey::from_pairs([("year", 2023), ("month", 11)])
    );

    let typo = DatasourceConfig::from_json_str(
        r#"{"config_version": 1, "name": "w", "assets": [], "asets": []}"#,
    );
    assert!(matches!(typo, Err(TermError::Configuration(_))));

    let future =
        DatasourceConfig::from_json_str(r#"{"config_version": 2, "name": "w", "assets": []}"#);
    assert!(matches!(future, Err(TermError::Configuration(_))));
}

#[tokio::test]
async fn test_file_asset_batches() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("events_2022.csv"),
        "id,score\n0,1\n1,2\n2,3\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("events_2023.csv"),
        "id,score\n3,4\n4,5\n",
    )
    .unwrap();
    fs::write(dir.path().join("README.txt"), "not data").unwrap();

    let engine = Arc::new(DataFusionEngine::new().unwrap());
    let mut datasource = Datasource::new("files", engine);
    datasource
        .add_asset(
            AssetConfig::new(
                "events",
                AssetSource::files(dir.path(), "*.csv", r"events_(?P<year>\d{4})\.csv"),
            )
            .with_order_by(Sorter::parse(["-year"]).unwrap()),
        )
        .await
        .unwrap();
    let resolver = BatchResolver::new(Arc::new(datasource));

    let configs = resolver.resolve(&BatchRequest::new("events")).await.unwrap();
    let years: Vec<&KeyValue> = configs
        .iter()
        .filter_map(|c| c.partition().get("year"))
        .collect();
    assert_eq!(years, vec![&KeyValue::Integer(2023), &KeyValue::Integer(2022)]);
    assert_eq!(
        configs[0].partition().get("path"),
        Some(&KeyValue::Text("events_2023.csv".to_string()))
    );

    let batch = resolver
        .get_batch(
            &BatchRequest::new("events").with_option("year", 2022),
            BatchSelection::First,
        )
        .await
        .unwrap();
    let BatchData::Sql(sql) = batch.data() else {
        panic!("file batches are SQL batches");
    };
    let rows = sql
        .context()
        .sql(&format!("SELECT COUNT(*) AS n FROM \"{}\"", sql.view_name()))
        .await
        .unwrap()
        .collect()
        .await
        .unwrap();
    let count = rows[0]
        .column(0)
        .as_any()
        .downcast_ref::<arrow::array::Int64Array>()
        .unwrap()
        .value(0);
    assert_eq!(count, 3);
}

// ============================================================================
// Splitter parity between backends
// ============================================================================

const TWO_POW_53: i64 = 1 << 53;

/// Eight rows whose dates straddle ISO week-year boundaries and whose
/// integers include negatives and values beyond exact `f64` range.
fn splits_batch() -> RecordBatch {
    let dates = [
        (2020, 12, 28),
        (2020, 12, 31),
        (2021, 1, 1),
        (2021, 1, 3),
        (2021, 1, 4),
        (2021, 12, 31),
        (2022, 1, 2),
        (2022, 1, 3),
    ];
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    let days: Vec<i32> = dates
        .iter()
        .map(|(y, m, d)| (NaiveDate::from_ymd_opt(*y, *m, *d).unwrap() - epoch).num_days() as i32)
        .collect();
    let day_text: Vec<String> = dates
        .iter()
        .map(|(y, m, d)| format!("{y:04}-{m:02}-{d:02}"))
        .collect();

    let schema = Arc::new(Schema::new(vec![
        Field::new("n", DataType::Int64, true),
        Field::new("region", DataType::Utf8, false),
        Field::new("tier", DataType::Int64, true),
        Field::new("event_date", DataType::Date32, false),
        Field::new("day", DataType::Utf8, false),
    ]));
    RecordBatch::try_new(
        schema,
        vec![
            Arc::new(Int64Array::from(vec![
                Some(-7),
                Some(-1),
                Some(0),
                Some(3),
                Some(9),
                Some(TWO_POW_53),
                Some(TWO_POW_53 + 1),
                None,
            ])),
            Arc::new(StringArray::from(vec![
                "east", "west", "east", "west", "east", "west", "east", "east",
            ])),
            Arc::new(Int64Array::from(vec![
                Some(1),
                Some(1),
                Some(2),
                Some(2),
                Some(1),
                Some(1),
                Some(2),
                None,
            ])),
            Arc::new(Date32Array::from(days)),
            Arc::new(StringArray::from(day_text)),
        ],
    )
    .unwrap()
}

fn splits_engines() -> Vec<(&'static str, Arc<dyn ExecutionEngine>)> {
    let sql = DataFusionEngine::new().unwrap();
    sql.register_batch("splits", splits_batch()).unwrap();
    vec![
        (
            "in_memory",
            Arc::new(InMemoryEngine::new().with_table("splits", splits_batch())),
        ),
        ("sql", Arc::new(sql)),
    ]
}

async fn row_count(batch: &Batch) -> usize {
    match batch.data() {
        BatchData::InMemory(rows) => rows.num_rows(),
        BatchData::Sql(sql) => {
            let rows = sql
                .context()
                .sql(&format!("SELECT COUNT(*) FROM \"{}\"", sql.view_name()))
                .await
                .unwrap()
                .collect()
                .await
                .unwrap();
            rows[0]
                .column(0)
                .as_any()
                .downcast_ref::<Int64Array>()
                .unwrap()
                .value(0) as usize
        }
    }
}

/// Every partition of `splits` under `splitter`, with its materialized row count.
async fn partition_rows(
    engine: Arc<dyn ExecutionEngine>,
    splitter: Splitter,
) -> Vec<(PartitionKey, usize)> {
    let mut datasource = Datasource::new("parity", Arc::clone(&engine));
    datasource
        .add_asset(AssetConfig::new("splits", AssetSource::table("splits")).with_splitter(splitter))
        .await
        .unwrap();
    let resolver = BatchResolver::new(Arc::new(datasource));

    let mut out = Vec::new();
    for config in resolver.resolve(&BatchRequest::new("splits")).await.unwrap() {
        let batch = engine.materialize(&config).await.unwrap();
        out.push((config.partition().clone(), row_count(&batch).await));
    }
    out
}

/// Partitions and row counts from both backends, asserted equal.
async fn assert_backends_agree(splitter: Splitter) -> Vec<(PartitionKey, usize)> {
    let mut outcomes = Vec::new();
    for (backend, engine) in splits_engines() {
        let rows = partition_rows(engine, splitter.clone()).await;
        let total: usize = rows.iter().map(|(_, n)| n).sum();
        assert_eq!(total, 8, "{backend} under {splitter:?}");
        outcomes.push(rows);
    }
    assert_eq!(outcomes[0], outcomes[1], "backends disagree under {splitter:?}");
    outcomes.remove(0)
}

#[tokio::test]
async fn test_divided_integer_parity_with_negatives() {
    let rows = assert_backends_agree(Splitter::divided_integer("n", 4)).await;
    assert_eq!(
        rows,
        vec![
            (PartitionKey::from_pairs([("n", KeyValue::Null)]), 1),
            (PartitionKey::from_pairs([("n", -2)]), 1),
            (PartitionKey::from_pairs([("n", -1)]), 1),
            (PartitionKey::from_pairs([("n", 0)]), 2),
            (PartitionKey::from_pairs([("n", 2)]), 1),
            (PartitionKey::from_pairs([("n", TWO_POW_53 / 4)]), 2),
        ]
    );
}

#[tokio::test]
async fn test_divided_integer_parity_beyond_f64_precision() {
    let rows = assert_backends_agree(Splitter::divided_integer("n", 1)).await;
    let large: Vec<&PartitionKey> = rows
        .iter()
        .map(|(key, _)| key)
        .filter(|key| matches!(key.get("n"), Some(KeyValue::Integer(v)) if *v >= TWO_POW_53))
        .collect();
    assert_eq!(
        large,
        vec![
            &PartitionKey::from_pairs([("n", TWO_POW_53)]),
            &PartitionKey::from_pairs([("n", TWO_POW_53 + 1)]),
        ]
    );
}

#[tokio::test]
async fn test_mod_integer_parity_with_negatives() {
    let rows = assert_backends_agree(Splitter::mod_integer("n", 4)).await;
    // -7 and -1 fold to 1 and 3; 2^53 + 1 to 1
    assert_eq!(
        rows,
        vec![
            (PartitionKey::from_pairs([("n", KeyValue::Null)]), 1),
            (PartitionKey::from_pairs([("n", 0)]), 2),
            (PartitionKey::from_pairs([("n", 1)]), 3),
            (PartitionKey::from_pairs([("n", 3)]), 2),
        ]
    );
}

#[tokio::test]
async fn test_multi_column_value_parity() {
    let rows = assert_backends_agree(Splitter::multi_column_value(["region", "tier"])).await;
    assert_eq!(
        rows,
        vec![
            (
                PartitionKey::from_pairs([
                    ("region", KeyValue::from("east")),
                    ("tier", KeyValue::Null)
                ]),
                1
            ),
            (
                PartitionKey::from_pairs([
                    ("region", KeyValue::from("east")),
                    ("tier", KeyValue::Integer(1))
                ]),
                2
            ),
            (
                PartitionKey::from_pairs([
                    ("region", KeyValue::from("east")),
                    ("tier", KeyValue::Integer(2))
                ]),
                2
            ),
            (
                PartitionKey::from_pairs([
                    ("region", KeyValue::from("west")),
                    ("tier", KeyValue::Integer(1))
                ]),
                2
            ),
            (
                PartitionKey::from_pairs([
                    ("region", KeyValue::from("west")),
                    ("tier", KeyValue::Integer(2))
                ]),
                1
            ),
        ]
    );
}

#[tokio::test]
async fn test_iso_week_parity_across_year_boundaries() {
    let rows = assert_backends_agree(Splitter::datetime_part(
        "event_date",
        vec![DatePart::Year, DatePart::Week],
    ))
    .await;
    // Calendar year with ISO week number: Jan 1-3 2021 fall in week 53
    assert_eq!(
        rows,
        vec![
            (PartitionKey::from_pairs([("year", 2020), ("week", 53)]), 2),
            (PartitionKey::from_pairs([("year", 2021), ("week", 1)]), 1),
            (PartitionKey::from_pairs([("year", 2021), ("week", 52)]), 1),
            (PartitionKey::from_pairs([("year", 2021), ("week", 53)]), 2),
            (PartitionKey::from_pairs([("year", 2022), ("week", 1)]), 1),
            (PartitionKey::from_pairs([("year", 2022), ("week", 52)]), 1),
        ]
    );
}

#[tokio::test]
async fn test_year_and_month_and_day_parity() {
    let rows = assert_backends_agree(Splitter::year_and_month_and_day("event_date")).await;
    assert_eq!(rows.len(), 8);
    assert!(rows.iter().all(|(_, n)| *n == 1));
    assert_eq!(
        rows[2].0,
        PartitionKey::from_pairs([("year", 2021), ("month", 1), ("day", 1)])
    );

    let months = assert_backends_agree(Splitter::year_and_month("event_date")).await;
    assert_eq!(
        months,
        vec![
            (PartitionKey::from_pairs([("year", 2020), ("month", 12)]), 2),
            (PartitionKey::from_pairs([("year", 2021), ("month", 1)]), 3),
            (PartitionKey::from_pairs([("year", 2021), ("month", 12)]), 1),
            (PartitionKey::from_pairs([("year", 2022), ("month", 1)]), 2),
        ]
    );
}

#[tokio::test]
async fn test_json_date_option_selects_text_partition() {
    let request: BatchRequest = serde_json::from_str(
        r#"{"asset_name": "by_day", "options": {"day": "2021-01-01"}}"#,
    )
    .unwrap();

    for (backend, engine) in splits_engines() {
        let mut datasource = Datasource::new("parity", Arc::clone(&engine));
        datasource
            .add_asset(
                AssetConfig::new("by_day", AssetSource::table("splits"))
                    .with_splitter(Splitter::column_value("day")),
            )
            .await
            .unwrap();
        let resolver = BatchResolver::new(Arc::new(datasource));

        let matching = resolver.resolve(&request).await.unwrap();
        assert_eq!(matching.len(), 1, "{backend}");
        assert_eq!(
            matching[0].partition().get("day"),
            Some(&KeyValue::from("2021-01-01")),
            "{backend}"
        );

        let batch = resolver
            .get_batch(&request, BatchSelection::First)
            .await
            .unwrap();
        assert_eq!(row_count(&batch).await, 1, "{backend}");
    }
}
