//! Executes a metric graph against one batch.
//!
//! The graph is evaluated level by level; metrics within a level are
//! independent and run concurrently up to a configurable limit. A failing
//! metric is recorded against its own identity and every metric that
//! depends on it, directly or transitively, is skipped with a
//! dependency failure. Independent branches still complete.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::config::{MetricConfiguration, MetricId};
use super::graph::{MetricGraph, MetricNode, NodeId};
use super::registry::{DependencyValues, MetricRegistry};
use super::types::MetricValue;
use crate::engine::Batch;
use crate::error::{Result, TermError};
use crate::logging::{truncate_field, LogConfig};

/// Why a metric has no value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// No provider exists for the batch's backend.
    Unsupported,
    /// The provider returned an error.
    Computation,
    /// A metric this one depends on failed.
    DependencyFailed { dependency: MetricId },
}

/// A metric that could not be computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricFailure {
    pub metric: MetricId,
    #[serde(flatten)]
    pub kind: FailureKind,
    pub message: String,
}

impl MetricFailure {
    /// The originating failure, for failures inherited from a dependency.
    pub fn root_cause(&self) -> &MetricId {
        match &self.kind {
            FailureKind::DependencyFailed { dependency } => dependency,
            _ => &self.metric,
        }
    }

    /// Converts the failure back into a crate error.
    pub fn to_error(&self, backend: impl std::fmt::Display) -> TermError {
        match &self.kind {
            FailureKind::Unsupported => TermError::UnsupportedMetric {
                metric: self.metric.to_string(),
                backend: backend.to_string(),
            },
            _ => TermError::metric_computation(self.metric.to_string(), self.message.clone()),
        }
    }
}

/// Write-once store of computed values for one run.
///
/// The first value stored under an identity wins; later writes of the same
/// identity are ignored.
#[derive(Debug, Default)]
pub struct MetricCache {
    values: Mutex<HashMap<MetricId, MetricValue>>,
}

impl MetricCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value; returns false if the identity was already present.
    pub fn insert(&self, id: MetricId, value: MetricValue) -> bool {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        if values.contains_key(&id) {
            return false;
        }
        values.insert(id, value);
        true
    }

    pub fn get(&self, id: &MetricId) -> Option<MetricValue> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.values.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn into_inner(self) -> HashMap<MetricId, MetricValue> {
        self.values.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

/// Computed values and failures of one run, keyed by metric identity.
#[derive(Debug, Clone, Default)]
pub struct MetricResolution {
    values: HashMap<MetricId, MetricValue>,
    failures: HashMap<MetricId, MetricFailure>,
    /// Provider invocations made during the run.
    pub computations: usize,
    pub execution_time_ms: u64,
}

impl MetricResolution {
    pub fn value(&self, metric: &MetricConfiguration) -> Option<&MetricValue> {
        self.values.get(&metric.id())
    }

    pub fn failure(&self, metric: &MetricConfiguration) -> Option<&MetricFailure> {
        self.failures.get(&metric.id())
    }

    pub fn values(&self) -> &HashMap<MetricId, MetricValue> {
        &self.values
    }

    pub fn failures(&self) -> &HashMap<MetricId, MetricFailure> {
        &self.failures
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Collects the values of the given metrics, or the first failure.
    pub fn collect(
        &self,
        metrics: &[MetricConfiguration],
    ) -> std::result::Result<DependencyValues, MetricFailure> {
        let mut values = DependencyValues::new();
        for metric in metrics {
            let id = metric.id();
            if let Some(failure) = self.failures.get(&id) {
                return Err(failure.clone());
            }
            match self.values.get(&id) {
                Some(value) => values.insert(metric.clone(), value.clone()),
                None => {
                    return Err(MetricFailure {
                        metric: id,
                        kind: FailureKind::Computation,
                        message: "metric was not part of this run".to_string(),
                    })
                }
            }
        }
        Ok(values)
    }
}

/// Resolves metrics against a batch through the provider registry.
#[derive(Debug, Clone)]
pub struct MetricExecutor {
    registry: Arc<MetricRegistry>,
    max_concurrency: usize,
    log_config: LogConfig,
}

impl MetricExecutor {
    pub fn new(registry: Arc<MetricRegistry>) -> Self {
        Self {
            registry,
            max_concurrency: num_cpus::get(),
            log_config: LogConfig::default(),
        }
    }

    /// Limits how many metrics of one level run at the same time.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    pub fn registry(&self) -> &Arc<MetricRegistry> {
        &self.registry
    }

    /// Computes every requested metric and its dependencies.
    ///
    /// Only a cyclic definition fails the whole call; per-metric failures
    /// are reported in the returned resolution.
    #[instrument(skip(self, batch, requested), fields(batch.id = %batch.id(), requested = requested.len()))]
    pub async fn resolve(
        &self,
        batch: &Batch,
        requested: &[MetricConfiguration],
    ) -> Result<MetricResolution> {
        let start = Instant::now();
        let graph = MetricGraph::build(&self.registry, requested)?;
        let cache = MetricCache::new();
        let mut failures: HashMap<NodeId, MetricFailure> = HashMap::new();
        let mut computations = 0;

        for level in graph.levels() {
            let mut ready = Vec::new();
            for node_id in level {
                let node = graph.node(node_id);
                let blocked_by = node
                    .dependencies
                    .iter()
                    .find_map(|dep| failures.get(dep))
                    .cloned();
                match blocked_by {
                    Some(failure) => {
                        crate::log_skipped!(
                            self.log_config,
                            metric = %node.metric_id,
                            dependency = %failure.root_cause(),
                            "Skipping metric with failed dependency"
                        );
                        failures.insert(
                            node_id,
                            MetricFailure {
                                metric: node.metric_id.clone(),
                                kind: FailureKind::DependencyFailed {
                                    dependency: failure.root_cause().clone(),
                                },
                                message: failure.message.clone(),
                            },
                        );
                    }
                    None => {
                        let mut dependencies = DependencyValues::new();
                        for dep in &node.dependencies {
                            let dep_node = graph.node(*dep);
                            if let Some(value) = cache.get(&dep_node.metric_id) {
                                dependencies.insert(dep_node.metric.clone(), value);
                            }
                        }
                        ready.push((node_id, dependencies));
                    }
                }
            }

            computations += ready.len();
            let results: Vec<(NodeId, std::result::Result<MetricValue, MetricFailure>)> =
                stream::iter(ready)
                    .map(|(node_id, dependencies)| {
                        let node = graph.node(node_id);
                        async move { (node_id, self.compute(batch, node, &dependencies).await) }
                    })
                    .buffer_unordered(self.max_concurrency)
                    .collect()
                    .await;

            for (node_id, result) in results {
                let node = graph.node(node_id);
                match result {
                    Ok(value) => {
                        crate::log_metric!(
                            self.log_config,
                            metric = %node.metric_id,
                            value = %truncate_field(&value.to_string(), self.log_config.max_field_length),
                            "Metric computed"
                        );
                        cache.insert(node.metric_id.clone(), value);
                    }
                    Err(failure) => {
                        failures.insert(node_id, failure);
                    }
                }
            }
        }

        let resolution = MetricResolution {
            values: cache.into_inner(),
            failures: failures
                .into_values()
                .map(|f| (f.metric.clone(), f))
                .collect(),
            computations,
            execution_time_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            metrics = graph.len(),
            computed = resolution.values.len(),
            failed = resolution.failures.len(),
            execution_time_ms = resolution.execution_time_ms,
            "Metric resolution finished"
        );
        Ok(resolution)
    }

    async fn compute(
        &self,
        batch: &Batch,
        node: &MetricNode,
        dependencies: &DependencyValues,
    ) -> std::result::Result<MetricValue, MetricFailure> {
        let backend = batch.backend();
        let Some(provider) = self.registry.provider(&node.metric.metric_name, backend) else {
            let error = TermError::UnsupportedMetric {
                metric: node.metric.metric_name.clone(),
                backend: backend.to_string(),
            };
            warn!(metric = %node.metric_id, %backend, "No provider for metric");
            return Err(MetricFailure {
                metric: node.metric_id.clone(),
                kind: FailureKind::Unsupported,
                message: error.to_string(),
            });
        };

        debug!(metric = %node.metric_id, "Computing metric");
        provider
            .compute(batch, &node.metric, dependencies)
            .await
            .map_err(|error| {
                warn!(metric = %node.metric_id, error = %error, "Metric computation failed");
                MetricFailure {
                    metric: node.metric_id.clone(),
                    kind: FailureKind::Computation,
                    message: error.to_string(),
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::BackendTag;
    use crate::metrics::names;
    use crate::test_fixtures::{
        events_table_batch, memory_engine, sql_engine, CountingProvider, FailingProvider,
    };
    use std::sync::atomic::Ordering;

    fn table(name: &str) -> MetricConfiguration {
        MetricConfiguration::table(name)
    }

    #[tokio::test]
    async fn test_shared_dependency_is_computed_once() {
        let shared = CountingProvider::new(1i64);
        let shared_calls = shared.calls();
        let registry = MetricRegistry::new()
            .define("a", |_| vec![MetricConfiguration::table("shared")])
            .define("b", |_| vec![MetricConfiguration::table("shared")])
            .register_all_backends("shared", shared)
            .register_all_backends("a", CountingProvider::new(2i64))
            .register_all_backends("b", CountingProvider::new(3i64));

        let batch = events_table_batch(&memory_engine()).await.unwrap();
        let executor = MetricExecutor::new(Arc::new(registry));
        let resolution = executor
            .resolve(&batch, &[table("a"), table("b"), table("a")])
            .await
            .unwrap();

        assert_eq!(shared_calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolution.computations, 3);
        assert_eq!(resolution.value(&table("a")), Some(&MetricValue::Long(2)));
        assert_eq!(resolution.value(&table("b")), Some(&MetricValue::Long(3)));
        assert!(resolution.is_complete());
    }

    #[tokio::test]
    async fn test_failure_is_isolated_to_dependents() {
        let registry = MetricRegistry::new()
            .define("child", |_| vec![MetricConfiguration::table("broken")])
            .define("grandchild", |_| vec![MetricConfiguration::table("child")])
            .register_all_backends("broken", FailingProvider::new("division by zero"))
            .register_all_backends("child", CountingProvider::new(1i64))
            .register_all_backends("grandchild", CountingProvider::new(1i64))
            .register_all_backends("independent", CountingProvider::new(7i64));

        let batch = events_table_batch(&memory_engine()).await.unwrap();
        let executor = MetricExecutor::new(Arc::new(registry)).with_max_concurrency(2);
        let resolution = executor
            .resolve(&batch, &[table("grandchild"), table("independent")])
            .await
            .unwrap();

        let broken_id = table("broken").id();
        let broken = resolution.failure(&table("broken")).unwrap();
        assert_eq!(broken.kind, FailureKind::Computation);
        assert!(broken.message.contains("division by zero"));

        for name in ["child", "grandchild"] {
            let failure = resolution.failure(&table(name)).unwrap();
            assert_eq!(
                failure.kind,
                FailureKind::DependencyFailed {
                    dependency: broken_id.clone()
                }
            );
            assert_eq!(failure.root_cause(), &broken_id);
        }

        assert_eq!(
            resolution.value(&table("independent")),
            Some(&MetricValue::Long(7))
        );
        assert_eq!(resolution.computations, 2);
    }

    #[tokio::test]
    async fn test_missing_backend_provider_is_unsupported() {
        let registry = MetricRegistry::new().register(
            "memory_only",
            BackendTag::InMemory,
            CountingProvider::new(1i64),
        );
        let engine = sql_engine().unwrap();
        let batch = events_table_batch(&engine).await.unwrap();
        let resolution = MetricExecutor::new(Arc::new(registry))
            .resolve(&batch, &[table("memory_only")])
            .await
            .unwrap();

        let failure = resolution.failure(&table("memory_only")).unwrap();
        assert_eq!(failure.kind, FailureKind::Unsupported);
        assert!(matches!(
            failure.to_error(BackendTag::Sql),
            TermError::UnsupportedMetric { .. }
        ));
    }

    #[tokio::test]
    async fn test_cycle_fails_the_run() {
        let registry = MetricRegistry::new()
            .define("a", |_| vec![MetricConfiguration::table("b")])
            .define("b", |_| vec![MetricConfiguration::table("a")]);
        let batch = events_table_batch(&memory_engine()).await.unwrap();
        let err = MetricExecutor::new(Arc::new(registry))
            .resolve(&batch, &[table("a")])
            .await
            .unwrap_err();
        assert!(matches!(err, TermError::CyclicMetricDependency { .. }));
    }

    #[tokio::test]
    async fn test_builtin_mean_through_graph() {
        let batch = events_table_batch(&memory_engine()).await.unwrap();
        let mean = MetricConfiguration::column(names::COLUMN_MEAN, "score");
        let resolution = MetricExecutor::new(MetricRegistry::global())
            .resolve(&batch, std::slice::from_ref(&mean))
            .await
            .unwrap();
        assert_eq!(resolution.value(&mean), Some(&MetricValue::Double(5.5)));
        // table.columns, sum, nonnull.count, mean
        assert_eq!(resolution.computations, 4);

        let values = resolution.collect(&[mean]).unwrap();
        assert_eq!(values.get(names::COLUMN_MEAN), Some(&MetricValue::Double(5.5)));
        assert!(resolution
            .collect(&[MetricConfiguration::column(names::COLUMN_MAX, "score")])
            .is_err());
    }

    #[test]
    fn test_cache_is_write_once() {
        let cache = MetricCache::new();
        let id = table("m").id();
        assert!(cache.insert(id.clone(), MetricValue::Long(1)));
        assert!(!cache.insert(id.clone(), MetricValue::Long(2)));
        assert_eq!(cache.get(&id), Some(MetricValue::Long(1)));
        assert_eq!(cache.len(), 1);
    }
}
