//! Data assets, datasources and their serde configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::files;
use super::sorter::Sorter;
use super::splitter::Splitter;
use crate::engine::ExecutionEngine;
use crate::error::{Result, TermError};
use crate::security::SqlSecurity;

/// Only this version of the datasource configuration is understood.
pub const CONFIG_VERSION: u32 = 1;

fn default_glob() -> String {
    "**/*".to_string()
}

/// Where an asset's rows physically live.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum AssetSource {
    /// A table already known to the execution engine.
    Table { table_name: String },
    /// CSV files under a directory, one batch per file.
    Files {
        base_directory: PathBuf,
        #[serde(default = "default_glob")]
        glob: String,
        /// Matched against each file's path relative to `base_directory`;
        /// named groups become partition dimensions.
        batching_regex: String,
    },
}

impl AssetSource {
    pub fn table(table_name: impl Into<String>) -> Self {
        AssetSource::Table {
            table_name: table_name.into(),
        }
    }

    pub fn files(
        base_directory: impl Into<PathBuf>,
        glob: impl Into<String>,
        batching_regex: impl Into<String>,
    ) -> Self {
        AssetSource::Files {
            base_directory: base_directory.into(),
            glob: glob.into(),
            batching_regex: batching_regex.into(),
        }
    }
}

/// Serialized form of a data asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssetConfig {
    pub name: String,
    pub source: AssetSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub splitter: Option<Splitter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<Sorter>,
}

impl AssetConfig {
    pub fn new(name: impl Into<String>, source: AssetSource) -> Self {
        Self {
            name: name.into(),
            source,
            splitter: None,
            order_by: None,
        }
    }

    pub fn with_splitter(mut self, splitter: Splitter) -> Self {
        self.splitter = Some(splitter);
        self
    }

    pub fn with_order_by(mut self, sorter: Sorter) -> Self {
        self.order_by = Some(sorter);
        self
    }
}

/// Serialized form of a datasource and all of its assets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasourceConfig {
    pub config_version: u32,
    pub name: String,
    #[serde(default)]
    pub assets: Vec<AssetConfig>,
}

impl DatasourceConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| TermError::configuration(format!("invalid datasource config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.config_version != CONFIG_VERSION {
            return Err(TermError::configuration(format!(
                "unsupported config_version {}, expected {CONFIG_VERSION}",
                self.config_version
            )));
        }
        if self.name.trim().is_empty() {
            return Err(TermError::configuration("datasource name cannot be empty"));
        }
        Ok(())
    }
}

/// A validated, immutable description of a logical dataset.
#[derive(Debug, Clone)]
pub struct DataAsset {
    name: String,
    source: AssetSource,
    splitter: Option<Splitter>,
    order_by: Sorter,
    dimensions: Vec<String>,
}

impl DataAsset {
    /// Validates everything that can be checked without touching data.
    pub fn from_config(config: AssetConfig) -> Result<Self> {
        let AssetConfig {
            name,
            source,
            splitter,
            order_by,
        } = config;

        if name.trim().is_empty() {
            return Err(TermError::configuration("asset name cannot be empty"));
        }

        let dimensions = match (&source, &splitter) {
            (AssetSource::Table { table_name }, splitter) => {
                SqlSecurity::validate_identifier(table_name).map_err(|e| {
                    TermError::configuration(format!("asset '{name}' table name: {e}"))
                })?;
                match splitter {
                    Some(splitter) => {
                        splitter.validate()?;
                        splitter.dimension_names()
                    }
                    None => Vec::new(),
                }
            }
            (AssetSource::Files { .. }, Some(_)) => {
                return Err(TermError::configuration(format!(
                    "asset '{name}' is partitioned by batching_regex and cannot also have a splitter"
                )));
            }
            (
                AssetSource::Files {
                    glob,
                    batching_regex,
                    ..
                },
                None,
            ) => {
                glob::Pattern::new(glob).map_err(|e| {
                    TermError::configuration(format!("invalid glob pattern '{glob}': {e}"))
                })?;
                let regex = files::compile_batching_regex(batching_regex)?;
                files::dimension_names(&regex)
            }
        };

        let order_by = order_by.unwrap_or_default();
        order_by.validate(&dimensions)?;

        Ok(Self {
            name,
            source,
            splitter,
            order_by,
            dimensions,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &AssetSource {
        &self.source
    }

    pub fn splitter(&self) -> Option<&Splitter> {
        self.splitter.as_ref()
    }

    /// The asset's default batch ordering.
    pub fn order_by(&self) -> &Sorter {
        &self.order_by
    }

    /// The partition dimensions this asset's batches are keyed by.
    pub fn dimensions(&self) -> &[String] {
        &self.dimensions
    }
}

/// A named collection of assets sharing one execution engine.
pub struct Datasource {
    name: String,
    engine: Arc<dyn ExecutionEngine>,
    assets: BTreeMap<String, DataAsset>,
}

impl std::fmt::Debug for Datasource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Datasource")
            .field("name", &self.name)
            .field("backend", &self.engine.backend())
            .field("assets", &self.assets.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Datasource {
    pub fn new(name: impl Into<String>, engine: Arc<dyn ExecutionEngine>) -> Self {
        Self {
            name: name.into(),
            engine,
            assets: BTreeMap::new(),
        }
    }

    /// Builds a datasource and registers every configured asset.
    pub async fn from_config(
        config: DatasourceConfig,
        engine: Arc<dyn ExecutionEngine>,
    ) -> Result<Self> {
        config.validate()?;
        let mut datasource = Self::new(config.name, engine);
        for asset in config.assets {
            datasource.add_asset(asset).await?;
        }
        info!(
            datasource.name = %datasource.name,
            datasource.assets = datasource.assets.len(),
            "Datasource configured"
        );
        Ok(datasource)
    }

    /// Validates and registers an asset, checking the splitter against the
    /// table's schema.
    #[instrument(skip(self, config), fields(datasource = %self.name, asset = %config.name))]
    pub async fn add_asset(&mut self, config: AssetConfig) -> Result<&DataAsset> {
        if self.assets.contains_key(&config.name) {
            return Err(TermError::configuration(format!(
                "asset '{}' is already registered on datasource '{}'",
                config.name, self.name
            )));
        }

        let asset = DataAsset::from_config(config)?;
        if let Some(splitter) = asset.splitter() {
            let schema = self.engine.schema(asset.source()).await?;
            splitter.validate_schema(&schema)?;
        }
        debug!(dimensions = ?asset.dimensions(), "Asset registered");

        let name = asset.name().to_string();
        Ok(self.assets.entry(name).or_insert(asset))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn engine(&self) -> &Arc<dyn ExecutionEngine> {
        &self.engine
    }

    pub fn asset(&self, name: &str) -> Result<&DataAsset> {
        self.assets.get(name).ok_or_else(|| TermError::AssetNotFound {
            datasource: self.name.clone(),
            asset: name.to_string(),
        })
    }

    pub fn asset_names(&self) -> impl Iterator<Item = &str> {
        self.assets.keys().map(String::as_str)
    }
}
