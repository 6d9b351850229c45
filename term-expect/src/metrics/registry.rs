//! Metric definitions and the provider table.
//!
//! A metric *definition* is backend-agnostic: it names the metric and
//! declares which other metrics must be computed first. A *provider* is the
//! backend-specific computation, registered per `(metric_name, BackendTag)`.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::config::MetricConfiguration;
use super::types::MetricValue;
use crate::engine::{BackendTag, Batch};
use crate::error::{Result, TermError};

/// Values of already-resolved metrics handed to a provider or expectation.
#[derive(Debug, Clone, Default)]
pub struct DependencyValues {
    values: Vec<(MetricConfiguration, MetricValue)>,
}

impl DependencyValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, metric: MetricConfiguration, value: MetricValue) {
        let id = metric.id();
        self.values.retain(|(m, _)| m.id() != id);
        self.values.push((metric, value));
    }

    /// The first value computed for a metric of the given name.
    pub fn get(&self, metric_name: &str) -> Option<&MetricValue> {
        self.values
            .iter()
            .find(|(m, _)| m.metric_name == metric_name)
            .map(|(_, v)| v)
    }

    /// The value of exactly this metric configuration.
    pub fn get_config(&self, metric: &MetricConfiguration) -> Option<&MetricValue> {
        let id = metric.id();
        self.values
            .iter()
            .find(|(m, _)| m.id() == id)
            .map(|(_, v)| v)
    }

    /// Like [`DependencyValues::get`], failing when the value is missing.
    pub fn require(&self, metric_name: &str) -> Result<&MetricValue> {
        self.get(metric_name).ok_or_else(|| {
            TermError::Internal(format!("dependency '{metric_name}' was not resolved"))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MetricConfiguration, &MetricValue)> {
        self.values.iter().map(|(m, v)| (m, v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Computes one metric against a materialized batch.
///
/// Providers must be pure functions of the batch, the metric configuration
/// and the dependency values, so the executor may run independent metrics
/// concurrently.
#[async_trait]
pub trait MetricProvider: Send + Sync {
    async fn compute(
        &self,
        batch: &Batch,
        metric: &MetricConfiguration,
        dependencies: &DependencyValues,
    ) -> Result<MetricValue>;
}

/// Adapts a synchronous function into a [`MetricProvider`].
pub struct FnProvider<F>(pub F);

#[async_trait]
impl<F> MetricProvider for FnProvider<F>
where
    F: Fn(&Batch, &MetricConfiguration, &DependencyValues) -> Result<MetricValue> + Send + Sync,
{
    async fn compute(
        &self,
        batch: &Batch,
        metric: &MetricConfiguration,
        dependencies: &DependencyValues,
    ) -> Result<MetricValue> {
        (self.0)(batch, metric, dependencies)
    }
}

type DependencyFn = Arc<dyn Fn(&MetricConfiguration) -> Vec<MetricConfiguration> + Send + Sync>;

/// Static table of metric definitions and per-backend providers.
#[derive(Default)]
pub struct MetricRegistry {
    dependencies: HashMap<String, DependencyFn>,
    providers: HashMap<(String, BackendTag), Arc<dyn MetricProvider>>,
}

static GLOBAL: Lazy<Arc<MetricRegistry>> = Lazy::new(|| Arc::new(MetricRegistry::with_builtins()));

impl MetricRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in metric for every backend.
    pub fn with_builtins() -> Self {
        super::providers::register_builtins(Self::new())
    }

    /// Shared built-in registry.
    pub fn global() -> Arc<MetricRegistry> {
        Arc::clone(&GLOBAL)
    }

    /// Declares a metric and how to derive its dependencies.
    pub fn define<F>(mut self, metric_name: impl Into<String>, dependencies: F) -> Self
    where
        F: Fn(&MetricConfiguration) -> Vec<MetricConfiguration> + Send + Sync + 'static,
    {
        self.dependencies
            .insert(metric_name.into(), Arc::new(dependencies));
        self
    }

    /// Registers the provider for one backend, replacing any previous one.
    pub fn register<P>(
        mut self,
        metric_name: impl Into<String>,
        backend: BackendTag,
        provider: P,
    ) -> Self
    where
        P: MetricProvider + 'static,
    {
        self.providers
            .insert((metric_name.into(), backend), Arc::new(provider));
        self
    }

    /// Registers one provider for every backend.
    pub fn register_all_backends<P>(mut self, metric_name: impl Into<String>, provider: P) -> Self
    where
        P: MetricProvider + 'static,
    {
        let metric_name = metric_name.into();
        let provider: Arc<dyn MetricProvider> = Arc::new(provider);
        for backend in BackendTag::ALL {
            self.providers
                .insert((metric_name.clone(), backend), Arc::clone(&provider));
        }
        self
    }

    /// Declared dependencies of a metric. Undefined metrics have none.
    pub fn dependencies(&self, metric: &MetricConfiguration) -> Vec<MetricConfiguration> {
        self.dependencies
            .get(&metric.metric_name)
            .map(|f| f(metric))
            .unwrap_or_default()
    }

    pub fn provider(
        &self,
        metric_name: &str,
        backend: BackendTag,
    ) -> Option<Arc<dyn MetricProvider>> {
        self.providers
            .get(&(metric_name.to_string(), backend))
            .cloned()
    }

    pub fn supports(&self, metric_name: &str, backend: BackendTag) -> bool {
        self.providers
            .contains_key(&(metric_name.to_string(), backend))
    }

    /// Names of every metric with a definition or a provider.
    pub fn metric_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .dependencies
            .keys()
            .chain(self.providers.keys().map(|(name, _)| name))
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

impl fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("metrics", &self.metric_names())
            .field("providers", &self.providers.len())
            .finish()
    }
}
