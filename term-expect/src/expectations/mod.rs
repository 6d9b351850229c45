//! Built-in expectations.
//!
//! | expectation                              | metrics                                  |
//! |------------------------------------------|------------------------------------------|
//! | `expect_column_min_to_be_between`        | `column.min`                             |
//! | `expect_column_max_to_be_between`        | `column.max`                             |
//! | `expect_column_mean_to_be_between`       | `column.mean`                            |
//! | `expect_table_row_count_to_be_between`   | `table.row_count`                        |
//! | `expect_column_values_to_be_between`     | `column_values.between.unexpected_count`, `column_values.nonnull.count` |
//! | `expect_column_values_to_not_be_null`    | `column_values.null.count`, `table.row_count` |

pub mod bounds;
pub mod column_aggregate;
pub mod column_map;
pub mod config;

pub use bounds::{meets_mostly, validate_mostly, RangeBounds};
pub use column_aggregate::{AggregateKind, ColumnAggregateBetween, TableRowCountBetween};
pub use column_map::{ColumnValuesBetween, ColumnValuesNotNull};
pub use config::{
    ColumnBoundsKwargs, ColumnNotNullKwargs, ColumnValuesBetweenKwargs, ExpectationConfiguration,
    TableBoundsKwargs,
};
