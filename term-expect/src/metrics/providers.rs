//! Built-in metric definitions and their providers for each backend.

use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use datafusion::scalar::ScalarValue;
use std::cmp::Ordering;

use super::config::MetricConfiguration;
use super::names::*;
use super::registry::{DependencyValues, FnProvider, MetricProvider, MetricRegistry};
use super::types::MetricValue;
use crate::datasource::KeyValue;
use crate::engine::memory::column_values;
use crate::engine::{BackendTag, Batch, BatchData, SqlBatch};
use crate::error::{Result, TermError};
use crate::expectations::RangeBounds;
use crate::security::SqlSecurity;

pub(crate) fn register_builtins(registry: MetricRegistry) -> MetricRegistry {
    registry
        .define(TABLE_ROW_COUNT, |_| Vec::new())
        .define(TABLE_COLUMNS, |_| Vec::new())
        .define(COLUMN_MIN, requires_table_columns)
        .define(COLUMN_MAX, requires_table_columns)
        .define(COLUMN_SUM, requires_table_columns)
        .define(COLUMN_NONNULL_COUNT, requires_table_columns)
        .define(COLUMN_BETWEEN_UNEXPECTED_COUNT, requires_table_columns)
        .define(COLUMN_NULL_COUNT, |m| {
            vec![
                MetricConfiguration::table(TABLE_ROW_COUNT),
                m.derive_plain(COLUMN_NONNULL_COUNT),
            ]
        })
        .define(COLUMN_MEAN, |m| {
            vec![
                m.derive_plain(COLUMN_SUM),
                m.derive_plain(COLUMN_NONNULL_COUNT),
            ]
        })
        .register(TABLE_ROW_COUNT, BackendTag::InMemory, FnProvider(memory_row_count))
        .register(TABLE_COLUMNS, BackendTag::InMemory, FnProvider(memory_columns))
        .register(COLUMN_MIN, BackendTag::InMemory, FnProvider(memory_min))
        .register(COLUMN_MAX, BackendTag::InMemory, FnProvider(memory_max))
        .register(COLUMN_SUM, BackendTag::InMemory, FnProvider(memory_sum))
        .register(
            COLUMN_NONNULL_COUNT,
            BackendTag::InMemory,
            FnProvider(memory_nonnull_count),
        )
        .register(
            COLUMN_BETWEEN_UNEXPECTED_COUNT,
            BackendTag::InMemory,
            FnProvider(memory_between_unexpected),
        )
        .register(TABLE_ROW_COUNT, BackendTag::Sql, SqlAggregate::RowCount)
        .register(TABLE_COLUMNS, BackendTag::Sql, SqlColumns)
        .register(COLUMN_MIN, BackendTag::Sql, SqlAggregate::Min)
        .register(COLUMN_MAX, BackendTag::Sql, SqlAggregate::Max)
        .register(COLUMN_SUM, BackendTag::Sql, SqlAggregate::Sum)
        .register(COLUMN_NONNULL_COUNT, BackendTag::Sql, SqlAggregate::NonNullCount)
        .register(
            COLUMN_BETWEEN_UNEXPECTED_COUNT,
            BackendTag::Sql,
            SqlAggregate::BetweenUnexpected,
        )
        .register_all_backends(COLUMN_NULL_COUNT, FnProvider(derived_null_count))
        .register_all_backends(COLUMN_MEAN, FnProvider(derived_mean))
}

fn requires_table_columns(_: &MetricConfiguration) -> Vec<MetricConfiguration> {
    vec![MetricConfiguration::table(TABLE_COLUMNS)]
}

fn column_of(metric: &MetricConfiguration) -> Result<&str> {
    metric.domain.column_name().ok_or_else(|| {
        TermError::metric_computation(
            metric.id().to_string(),
            "metric requires a column domain",
        )
    })
}

/// Fails with `ColumnNotFound` unless the resolved table columns list the
/// metric's column.
fn ensure_column<'a>(
    metric: &'a MetricConfiguration,
    dependencies: &DependencyValues,
) -> Result<&'a str> {
    let column = column_of(metric)?;
    let columns = dependencies
        .require(TABLE_COLUMNS)?
        .as_string_list()
        .ok_or_else(|| TermError::Internal("table.columns is not a list".to_string()))?;
    if !columns.iter().any(|c| c == column) {
        return Err(TermError::ColumnNotFound {
            column: column.to_string(),
        });
    }
    Ok(column)
}

fn memory_rows(batch: &Batch) -> Result<&RecordBatch> {
    match batch.data() {
        BatchData::InMemory(rows) => Ok(rows.as_ref()),
        other => Err(TermError::Internal(format!(
            "in-memory provider called with a {} batch",
            other.backend()
        ))),
    }
}

fn sql_batch(batch: &Batch) -> Result<&SqlBatch> {
    match batch.data() {
        BatchData::Sql(sql) => Ok(sql),
        other => Err(TermError::Internal(format!(
            "SQL provider called with a {} batch",
            other.backend()
        ))),
    }
}

fn memory_row_count(
    batch: &Batch,
    _: &MetricConfiguration,
    _: &DependencyValues,
) -> Result<MetricValue> {
    Ok(MetricValue::Long(memory_rows(batch)?.num_rows() as i64))
}

fn memory_columns(
    batch: &Batch,
    _: &MetricConfiguration,
    _: &DependencyValues,
) -> Result<MetricValue> {
    let names = memory_rows(batch)?
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    Ok(MetricValue::StringList(names))
}

fn non_null_values(batch: &Batch, column: &str) -> Result<Vec<KeyValue>> {
    let mut values = column_values(memory_rows(batch)?, column)?;
    values.retain(|v| !v.is_null());
    Ok(values)
}

fn memory_extreme(
    batch: &Batch,
    metric: &MetricConfiguration,
    dependencies: &DependencyValues,
    wanted: Ordering,
) -> Result<MetricValue> {
    let column = ensure_column(metric, dependencies)?;
    let extreme = non_null_values(batch, column)?
        .into_iter()
        .reduce(|best, v| if v.cmp(&best) == wanted { v } else { best });
    Ok(extreme.map(MetricValue::from).unwrap_or(MetricValue::Null))
}

fn memory_min(
    batch: &Batch,
    metric: &MetricConfiguration,
    deps: &DependencyValues,
) -> Result<MetricValue> {
    memory_extreme(batch, metric, deps, Ordering::Less)
}

fn memory_max(
    batch: &Batch,
    metric: &MetricConfiguration,
    deps: &DependencyValues,
) -> Result<MetricValue> {
    memory_extreme(batch, metric, deps, Ordering::Greater)
}

fn memory_sum(
    batch: &Batch,
    metric: &MetricConfiguration,
    deps: &DependencyValues,
) -> Result<MetricValue> {
    let column = ensure_column(metric, deps)?;
    let values = non_null_values(batch, column)?;
    if values.is_empty() {
        return Ok(MetricValue::Null);
    }

    if values.iter().all(|v| matches!(v, KeyValue::Integer(_))) {
        let mut total: i64 = 0;
        for value in values.iter().filter_map(KeyValue::as_i64) {
            total = total.checked_add(value).ok_or_else(|| {
                TermError::metric_computation(metric.id().to_string(), "integer sum overflowed")
            })?;
        }
        return Ok(MetricValue::Long(total));
    }

    let mut total = 0.0;
    for value in &values {
        total += value.as_f64().ok_or_else(|| TermError::TypeMismatch {
            expected: "numeric column".to_string(),
            found: value.to_string(),
        })?;
    }
    Ok(MetricValue::Double(total))
}

fn memory_nonnull_count(
    batch: &Batch,
    metric: &MetricConfiguration,
    deps: &DependencyValues,
) -> Result<MetricValue> {
    let column = ensure_column(metric, deps)?;
    let array = memory_rows(batch)?
        .column_by_name(column)
        .ok_or_else(|| TermError::ColumnNotFound {
            column: column.to_string(),
        })?;
    Ok(MetricValue::Long((array.len() - array.null_count()) as i64))
}

fn memory_between_unexpected(
    batch: &Batch,
    metric: &MetricConfiguration,
    deps: &DependencyValues,
) -> Result<MetricValue> {
    let column = ensure_column(metric, deps)?;
    let bounds = RangeBounds::from_value_kwargs(&metric.value_kwargs)?;
    let mut unexpected = 0i64;
    for value in non_null_values(batch, column)? {
        match bounds.contains(&value) {
            Some(true) => {}
            Some(false) => unexpected += 1,
            None => {
                return Err(TermError::TypeMismatch {
                    expected: "values comparable with the bounds".to_string(),
                    found: value.to_string(),
                })
            }
        }
    }
    Ok(MetricValue::Long(unexpected))
}

fn derived_null_count(
    _: &Batch,
    metric: &MetricConfiguration,
    deps: &DependencyValues,
) -> Result<MetricValue> {
    let rows = deps.require(TABLE_ROW_COUNT)?.as_i64();
    let non_null = deps.require(COLUMN_NONNULL_COUNT)?.as_i64();
    match (rows, non_null) {
        (Some(rows), Some(non_null)) => Ok(MetricValue::Long(rows - non_null)),
        _ => Err(TermError::metric_computation(
            metric.id().to_string(),
            "row counts are not integers",
        )),
    }
}

fn derived_mean(
    _: &Batch,
    _: &MetricConfiguration,
    deps: &DependencyValues,
) -> Result<MetricValue> {
    let sum = deps.require(COLUMN_SUM)?;
    let count = deps.require(COLUMN_NONNULL_COUNT)?.as_i64().unwrap_or(0);
    match sum.as_f64() {
        Some(sum) if count > 0 => Ok(MetricValue::Double(sum / count as f64)),
        _ => Ok(MetricValue::Null),
    }
}

/// Single-aggregate SQL providers.
#[derive(Debug, Clone, Copy)]
enum SqlAggregate {
    RowCount,
    Min,
    Max,
    Sum,
    NonNullCount,
    BetweenUnexpected,
}

impl SqlAggregate {
    fn expression(&self, metric: &MetricConfiguration, deps: &DependencyValues) -> Result<String> {
        if let SqlAggregate::RowCount = self {
            return Ok("COUNT(*)".to_string());
        }
        let column = SqlSecurity::escape_identifier(ensure_column(metric, deps)?)?;
        let expr = match self {
            SqlAggregate::RowCount => "COUNT(*)".to_string(),
            SqlAggregate::Min => format!("MIN({column})"),
            SqlAggregate::Max => format!("MAX({column})"),
            SqlAggregate::Sum => format!("SUM({column})"),
            SqlAggregate::NonNullCount => format!("COUNT({column})"),
            SqlAggregate::BetweenUnexpected => {
                let bounds = RangeBounds::from_value_kwargs(&metric.value_kwargs)?;
                let mut inside = Vec::new();
                if let Some(min) = &bounds.min_value {
                    let op = if bounds.strict_min { ">" } else { ">=" };
                    inside.push(format!("{column} {op} {}", min.to_sql_literal()));
                }
                if let Some(max) = &bounds.max_value {
                    let op = if bounds.strict_max { "<" } else { "<=" };
                    inside.push(format!("{column} {op} {}", max.to_sql_literal()));
                }
                if inside.is_empty() {
                    inside.push("TRUE".to_string());
                }
                format!(
                    "COALESCE(SUM(CASE WHEN {column} IS NOT NULL AND NOT ({}) THEN 1 ELSE 0 END), 0)",
                    inside.join(" AND ")
                )
            }
        };
        Ok(expr)
    }
}

#[async_trait]
impl MetricProvider for SqlAggregate {
    async fn compute(
        &self,
        batch: &Batch,
        metric: &MetricConfiguration,
        dependencies: &DependencyValues,
    ) -> Result<MetricValue> {
        let sql_batch = sql_batch(batch)?;
        let expr = self.expression(metric, dependencies)?;
        let view = SqlSecurity::escape_identifier(sql_batch.view_name())?;
        let sql = format!("SELECT {expr} AS value FROM {view}");
        tracing::trace!(sql = %sql, "Computing SQL metric");

        let batches = sql_batch.context().sql(&sql).await?.collect().await?;
        let scalar = match batches.iter().find(|b| b.num_rows() > 0) {
            Some(result) => ScalarValue::try_from_array(result.column(0), 0)?,
            None => return Ok(MetricValue::Null),
        };
        let value = MetricValue::from(KeyValue::from_scalar(&scalar)?);
        Ok(match (self, value) {
            // Counts are always integral
            (
                SqlAggregate::RowCount
                | SqlAggregate::NonNullCount
                | SqlAggregate::BetweenUnexpected,
                MetricValue::Null,
            ) => MetricValue::Long(0),
            (_, value) => value,
        })
    }
}

struct SqlColumns;

#[async_trait]
impl MetricProvider for SqlColumns {
    async fn compute(
        &self,
        batch: &Batch,
        _metric: &MetricConfiguration,
        _dependencies: &DependencyValues,
    ) -> Result<MetricValue> {
        let sql_batch = sql_batch(batch)?;
        let df = sql_batch.context().table(sql_batch.view_name()).await?;
        let names = df
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        Ok(MetricValue::StringList(names))
    }
}
