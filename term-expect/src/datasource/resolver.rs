//! Turns batch requests into ordered, concrete batch configurations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument};

use super::asset::{DataAsset, Datasource};
use super::batch::{BatchConfig, BatchRequest, BatchSelection};
use super::value::PartitionKey;
use crate::engine::Batch;
use crate::error::{Result, TermError};
use crate::logging::LogConfig;

/// Resolves requests against one datasource, caching each asset's
/// enumerated partitions until [`BatchResolver::refresh`] is called.
#[derive(Debug)]
pub struct BatchResolver {
    datasource: Arc<Datasource>,
    partitions: Mutex<HashMap<String, Arc<Vec<PartitionKey>>>>,
    log_config: LogConfig,
}

impl BatchResolver {
    pub fn new(datasource: Arc<Datasource>) -> Self {
        Self {
            datasource,
            partitions: Mutex::new(HashMap::new()),
            log_config: LogConfig::default(),
        }
    }

    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    pub fn datasource(&self) -> &Arc<Datasource> {
        &self.datasource
    }

    /// Drops the cached partitions of one asset.
    pub fn refresh(&self, asset_name: &str) {
        self.cache().remove(asset_name);
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Vec<PartitionKey>>>> {
        self.partitions.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn partitions(&self, asset: &DataAsset) -> Result<Arc<Vec<PartitionKey>>> {
        let cached = self.cache().get(asset.name()).cloned();
        if let Some(cached) = cached {
            return Ok(cached);
        }
        let keys = self
            .datasource
            .engine()
            .partition_keys(asset.source(), asset.splitter())
            .await?;
        for key in &keys {
            crate::log_partition!(
                self.log_config,
                asset = asset.name(),
                partition = %key,
                "Enumerated partition"
            );
        }
        let keys = Arc::new(keys);
        // A concurrent enumeration of the same asset may have landed first
        let mut cache = self.cache();
        let entry = cache
            .entry(asset.name().to_string())
            .or_insert_with(|| Arc::clone(&keys));
        Ok(Arc::clone(entry))
    }

    /// Every batch matching the request, in sorter order.
    #[instrument(skip(self, request), fields(asset = %request.asset_name))]
    pub async fn resolve(&self, request: &BatchRequest) -> Result<Vec<BatchConfig>> {
        let asset = self.datasource.asset(&request.asset_name)?;

        if let Some(unknown) = request
            .options
            .keys()
            .find(|k| !asset.dimensions().iter().any(|d| d == *k))
        {
            return Err(TermError::configuration(format!(
                "request option '{unknown}' is not a dimension of asset '{}'; available: [{}]",
                asset.name(),
                asset.dimensions().join(", ")
            )));
        }

        let sorter = match &request.order_by {
            Some(sorter) => {
                sorter.validate(asset.dimensions())?;
                sorter
            }
            None => asset.order_by(),
        };

        let partitions = self.partitions(asset).await?;
        let mut matching: Vec<PartitionKey> = partitions
            .iter()
            .filter(|key| request.matches(key))
            .cloned()
            .collect();
        sorter.sort(&mut matching);

        debug!(
            enumerated = partitions.len(),
            matching = matching.len(),
            "Resolved batch request"
        );

        Ok(matching
            .into_iter()
            .map(|partition| {
                BatchConfig::new(
                    self.datasource.name(),
                    asset.name(),
                    asset.source().clone(),
                    asset.splitter().cloned(),
                    partition,
                )
            })
            .collect())
    }

    /// Batches selected by a policy; `All` returns every match.
    pub async fn select(
        &self,
        request: &BatchRequest,
        selection: BatchSelection,
    ) -> Result<Vec<BatchConfig>> {
        let mut configs = self.resolve(request).await?;
        if selection == BatchSelection::All {
            return Ok(configs);
        }
        Ok(match selection.position(configs.len()) {
            Some(position) => vec![configs.swap_remove(position)],
            None => Vec::new(),
        })
    }

    /// Exactly one batch under the policy.
    ///
    /// Fails with `NoMatchingBatch` when nothing is selected and, for
    /// [`BatchSelection::All`], with `AmbiguousBatch` when several match.
    pub async fn resolve_one(
        &self,
        request: &BatchRequest,
        selection: BatchSelection,
    ) -> Result<BatchConfig> {
        let mut configs = self.resolve(request).await?;
        let count = configs.len();
        if selection == BatchSelection::All && count > 1 {
            return Err(TermError::AmbiguousBatch {
                asset: request.asset_name.clone(),
                count,
            });
        }
        match selection.position(count) {
            Some(position) => Ok(configs.swap_remove(position)),
            None => Err(TermError::NoMatchingBatch {
                asset: request.asset_name.clone(),
                options: format!("{} under {selection:?}", request.describe_options()),
            }),
        }
    }

    /// Materializes a resolved batch through the datasource's engine.
    pub async fn materialize(&self, config: &BatchConfig) -> Result<Batch> {
        if config.datasource_name() != self.datasource.name() {
            return Err(TermError::configuration(format!(
                "batch {} belongs to datasource '{}', not '{}'",
                config.id(),
                config.datasource_name(),
                self.datasource.name()
            )));
        }
        self.datasource.engine().materialize(config).await
    }

    /// Resolves one batch and materializes it.
    #[instrument(skip(self, request), fields(asset = %request.asset_name))]
    pub async fn get_batch(
        &self,
        request: &BatchRequest,
        selection: BatchSelection,
    ) -> Result<Batch> {
        let config = self.resolve_one(request, selection).await?;
        info!(batch.id = %config.id(), partition = %config.partition(), "Selected batch");
        self.materialize(&config).await
    }
}
