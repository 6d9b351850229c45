//! Datasources, assets and batch resolution.
//!
//! A [`Datasource`] owns named [`DataAsset`]s on top of one execution
//! engine. An asset is split into partitions by a [`Splitter`] (or, for
//! file assets, by the named groups of a batching regex) and ordered by a
//! [`Sorter`]. The [`BatchResolver`] turns a [`BatchRequest`] into ordered
//! [`BatchConfig`]s and materializes the selected one.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use term_expect::datasource::*;
//! use term_expect::engine::DataFusionEngine;
//!
//! # async fn example() -> term_expect::error::Result<()> {
//! let engine = DataFusionEngine::new()?;
//! engine.register_csv("events", "data/events.csv").await?;
//!
//! let mut datasource = Datasource::new("warehouse", Arc::new(engine));
//! datasource
//!     .add_asset(
//!         AssetConfig::new("events", AssetSource::table("events"))
//!             .with_splitter(Splitter::year("event_date"))
//!             .with_order_by(Sorter::parse(["-year"])?),
//!     )
//!     .await?;
//!
//! let resolver = BatchResolver::new(Arc::new(datasource));
//! let latest = resolver
//!     .get_batch(&BatchRequest::new("events"), BatchSelection::First)
//!     .await?;
//! println!("validating batch {}", latest.id());
//! # Ok(())
//! # }
//! ```

pub mod asset;
pub mod batch;
pub mod files;
pub mod resolver;
pub mod sorter;
pub mod splitter;
pub mod value;

pub use asset::{AssetConfig, AssetSource, DataAsset, Datasource, DatasourceConfig};
pub use batch::{BatchConfig, BatchRequest, BatchSelection};
pub use resolver::BatchResolver;
pub use sorter::{SortKey, Sorter};
pub use splitter::{DatePart, Splitter};
pub use value::{KeyValue, PartitionKey};
