//! Property-based tests for partition enumeration, sorting and the
//! `mostly` threshold.
//!
//! ## Test Categories
//!
//! ### 1. Partition enumeration
//! - Enumerating the same asset twice yields identical keys
//! - In-memory and SQL backends agree on `mod_integer` partitions
//! - In-memory and SQL backends agree on `divided_integer` partitions,
//!   including values too large for exact `f64` arithmetic
//!
//! ### 2. Sorting
//! - Sorting is idempotent and agrees with `Sorter::compare`
//! - Ties keep their enumeration order
//!
//! ### 3. Row-level thresholds
//! - `expect_column_values_to_be_between` succeeds exactly when the
//!   in-range fraction of non-null values reaches `mostly`

use arrow::array::Int64Array;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use proptest::prelude::*;
use std::sync::Arc;
use term_expect::core::{ExpectationSuite, Validator};
use term_expect::datasource::{
    AssetConfig, AssetSource, BatchRequest, BatchResolver, BatchSelection, Datasource,
    KeyValue, PartitionKey, SortKey, Sorter, Splitter,
};
use term_expect::engine::{DataFusionEngine, ExecutionEngine, InMemoryEngine};
use term_expect::expectations::{ColumnValuesBetween, RangeBounds};

// ============================================================================
// Test Data Generation Utilities
// ============================================================================

fn values_batch(values: &[Option<i64>]) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![Field::new("v", DataType::Int64, true)]));
    RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(values.to_vec()))]).unwrap()
}

fn arb_partition_key() -> impl Strategy<Value = PartitionKey> {
    (
        prop::option::of(2018i64..2025),
        prop::option::of(1i64..13),
        prop::option::of("[a-c]"),
    )
        .prop_map(|(year, month, region)| {
            let mut key = PartitionKey::new();
            if let Some(year) = year {
                key.insert("year", KeyValue::Integer(year));
            }
            if let Some(month) = month {
                key.insert("month", KeyValue::Integer(month));
            }
            if let Some(region) = region {
                key.insert("region", KeyValue::Text(region));
            }
            key
        })
}

fn arb_sorter() -> impl Strategy<Value = Sorter> {
    prop::collection::vec(
        (prop::sample::select(vec!["year", "month", "region"]), any::<bool>()),
        0..4,
    )
    .prop_map(|keys| {
        Sorter::new(
            keys.into_iter()
                .map(|(key, reverse)| {
                    if reverse {
                        SortKey::desc(key)
                    } else {
                        SortKey::asc(key)
                    }
                })
                .collect(),
        )
    })
}

// ============================================================================
// Partition Enumeration Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_mod_partitions_are_deterministic_and_backend_independent(
        values in prop::collection::vec(prop::option::of(-1000i64..1000), 1..60),
        modulus in 1i64..8,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let source = AssetSource::table("t");
            let splitter = Splitter::mod_integer("v", modulus);

            let memory = InMemoryEngine::new().with_table("t", values_batch(&values));
            let sql = DataFusionEngine::new().unwrap();
            sql.register_batch("t", values_batch(&values)).unwrap();

            let first = memory.partition_keys(&source, Some(&splitter)).await.unwrap();
            let second = memory.partition_keys(&source, Some(&splitter)).await.unwrap();
            prop_assert_eq!(&first, &second);

            let from_sql = sql.partition_keys(&source, Some(&splitter)).await.unwrap();
            prop_assert_eq!(&first, &from_sql);

            // ascending and distinct
            let dimensions = splitter.dimension_names();
            prop_assert!(first
                .windows(2)
                .all(|w| w[0].cmp_by(&w[1], &dimensions) == std::cmp::Ordering::Less));
            for key in &first {
                match key.get("v") {
                    Some(KeyValue::Integer(r)) => prop_assert!((0..modulus).contains(r)),
                    Some(KeyValue::Null) => prop_assert!(values.iter().any(Option::is_none)),
                    other => prop_assert!(false, "unexpected partition value {:?}", other),
                }
            }
            Ok(())
        })?;
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_divided_partitions_are_backend_independent(
        values in prop::collection::vec(
            prop::option::of(prop_oneof![-1000i64..1000, -(1i64 << 60)..(1i64 << 60)]),
            1..40,
        ),
        divisor in 1i64..16,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let source = AssetSource::table("t");
            let splitter = Splitter::divided_integer("v", divisor);

            let memory = InMemoryEngine::new().with_table("t", values_batch(&values));
            let sql = DataFusionEngine::new().unwrap();
            sql.register_batch("t", values_batch(&values)).unwrap();

            let from_memory = memory.partition_keys(&source, Some(&splitter)).await.unwrap();
            let from_sql = sql.partition_keys(&source, Some(&splitter)).await.unwrap();
            prop_assert_eq!(&from_memory, &from_sql);

            let mut expected: Vec<Option<i64>> = values
                .iter()
                .map(|v| v.map(|v| v.div_euclid(divisor)))
                .collect();
            expected.sort();
            expected.dedup();
            let actual: Vec<Option<i64>> = from_memory
                .iter()
                .map(|key| key.get("v").and_then(KeyValue::as_i64))
                .collect();
            prop_assert_eq!(actual, expected);
            Ok(())
        })?;
    }
}

// ============================================================================
// Sorting Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_sort_is_idempotent(
        mut keys in prop::collection::vec(arb_partition_key(), 0..30),
        sorter in arb_sorter(),
    ) {
        sorter.sort(&mut keys);
        let once = keys.clone();
        sorter.sort(&mut keys);
        prop_assert_eq!(&once, &keys);
        prop_assert!(keys
            .windows(2)
            .all(|w| sorter.compare(&w[0], &w[1]) != std::cmp::Ordering::Greater));
    }

    #[test]
    fn prop_sort_is_stable(
        keys in prop::collection::vec(arb_partition_key(), 0..30),
        sorter in arb_sorter(),
    ) {
        let mut indexed: Vec<(usize, PartitionKey)> = keys.into_iter().enumerate().collect();
        indexed.sort_by(|a, b| sorter.compare(&a.1, &b.1));
        for pair in indexed.windows(2) {
            if sorter.compare(&pair[0].1, &pair[1].1) == std::cmp::Ordering::Equal {
                prop_assert!(pair[0].0 < pair[1].0);
            }
        }
    }
}

// ============================================================================
// Row-Level Threshold Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_mostly_matches_in_range_fraction(
        values in prop::collection::vec(prop::option::of(0i64..100), 1..50),
        lower in 0i64..50,
        width in 0i64..50,
        mostly in 0.0f64..=1.0,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let upper = lower + width;
            let non_null: Vec<i64> = values.iter().flatten().copied().collect();
            let in_range = non_null.iter().filter(|v| (lower..=upper).contains(*v)).count();
            let expected = non_null.is_empty()
                || in_range as f64 / non_null.len() as f64 >= mostly;

            let engine = Arc::new(InMemoryEngine::new().with_table("t", values_batch(&values)));
            let mut datasource = Datasource::new("props", engine);
            datasource
                .add_asset(AssetConfig::new("t", AssetSource::table("t")))
                .await
                .unwrap();
            let batch = BatchResolver::new(Arc::new(datasource))
                .get_batch(&BatchRequest::new("t"), BatchSelection::First)
                .await
                .unwrap();

            let suite = ExpectationSuite::builder("props")
                .expectation(
                    ColumnValuesBetween::new("v", RangeBounds::between(lower, upper))
                        .with_mostly(mostly),
                )
                .build();
            let result = Validator::new().validate(&suite, &batch).await.unwrap();
            prop_assert_eq!(result.results[0].success, expected);
            Ok(())
        })?;
    }
}
