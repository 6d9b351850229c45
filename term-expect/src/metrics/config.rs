//! Metric identity: name, domain and value kwargs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The part of a batch a metric is computed over.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricDomain {
    Table,
    Column { column: String },
}

impl MetricDomain {
    pub fn column_name(&self) -> Option<&str> {
        match self {
            MetricDomain::Column { column } => Some(column),
            MetricDomain::Table => None,
        }
    }
}

impl fmt::Display for MetricDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricDomain::Table => f.write_str("table"),
            MetricDomain::Column { column } => write!(f, "column={column}"),
        }
    }
}

/// A fully parameterized metric request.
///
/// Two configurations with equal name, domain and value kwargs are the same
/// computation and share one [`MetricId`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricConfiguration {
    pub metric_name: String,
    pub domain: MetricDomain,
    #[serde(default)]
    pub value_kwargs: BTreeMap<String, serde_json::Value>,
}

impl MetricConfiguration {
    pub fn new(metric_name: impl Into<String>, domain: MetricDomain) -> Self {
        Self {
            metric_name: metric_name.into(),
            domain,
            value_kwargs: BTreeMap::new(),
        }
    }

    pub fn table(metric_name: impl Into<String>) -> Self {
        Self::new(metric_name, MetricDomain::Table)
    }

    pub fn column(metric_name: impl Into<String>, column: impl Into<String>) -> Self {
        Self::new(
            metric_name,
            MetricDomain::Column {
                column: column.into(),
            },
        )
    }

    pub fn with_value(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.value_kwargs.insert(key.into(), value.into());
        self
    }

    pub fn value(&self, key: &str) -> Option<&serde_json::Value> {
        self.value_kwargs.get(key)
    }

    /// A copy restricted to the same domain without value kwargs.
    pub fn derive_plain(&self, metric_name: impl Into<String>) -> Self {
        Self::new(metric_name, self.domain.clone())
    }

    pub fn id(&self) -> MetricId {
        let kwargs = if self.value_kwargs.is_empty() {
            String::new()
        } else {
            serde_json::to_string(&self.value_kwargs).unwrap_or_default()
        };
        MetricId(format!("{}({}){kwargs}", self.metric_name, self.domain))
    }
}

impl fmt::Display for MetricConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Canonical identity of a metric computation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricId(String);

impl MetricId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
