//! Batch identifiers, requests and selection policies.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

use super::asset::AssetSource;
use super::sorter::Sorter;
use super::splitter::Splitter;
use super::value::{KeyValue, PartitionKey};

/// One concrete partition of a data asset.
///
/// Only the resolver creates these; they are immutable once built and carry
/// a stable identifier derived from the datasource, asset and partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchConfig {
    id: String,
    datasource_name: String,
    asset_name: String,
    source: AssetSource,
    splitter: Option<Splitter>,
    partition: PartitionKey,
}

#[derive(Serialize)]
struct IdentityRepr<'a> {
    datasource: &'a str,
    asset: &'a str,
    partition: &'a PartitionKey,
}

impl BatchConfig {
    pub(crate) fn new(
        datasource_name: &str,
        asset_name: &str,
        source: AssetSource,
        splitter: Option<Splitter>,
        partition: PartitionKey,
    ) -> Self {
        let id = batch_id(datasource_name, asset_name, &partition);
        Self {
            id,
            datasource_name: datasource_name.to_string(),
            asset_name: asset_name.to_string(),
            source,
            splitter,
            partition,
        }
    }

    /// Stable hex identifier of this batch.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn datasource_name(&self) -> &str {
        &self.datasource_name
    }

    pub fn asset_name(&self) -> &str {
        &self.asset_name
    }

    pub fn source(&self) -> &AssetSource {
        &self.source
    }

    pub fn splitter(&self) -> Option<&Splitter> {
        self.splitter.as_ref()
    }

    /// The partition-key values this batch covers. Empty for an unsplit asset.
    pub fn partition(&self) -> &PartitionKey {
        &self.partition
    }
}

impl fmt::Display for BatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}{} [{}]",
            self.datasource_name, self.asset_name, self.partition, self.id
        )
    }
}

fn batch_id(datasource: &str, asset: &str, partition: &PartitionKey) -> String {
    let repr = IdentityRepr {
        datasource,
        asset,
        partition,
    };
    // BTreeMap keys make the JSON canonical
    let canonical = serde_json::to_string(&repr)
        .unwrap_or_else(|_| format!("{datasource}/{asset}/{partition}"));
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let hash = hasher.finalize();
    hex::encode(&hash[..16])
}

/// An unresolved query for batches of one asset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchRequest {
    pub asset_name: String,
    /// Dimension constraints; `None` matches every value of the dimension.
    #[serde(default)]
    pub options: BTreeMap<String, Option<KeyValue>>,
    /// Replaces the asset's default sorter for this request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<Sorter>,
}

impl BatchRequest {
    pub fn new(asset_name: impl Into<String>) -> Self {
        Self {
            asset_name: asset_name.into(),
            ..Default::default()
        }
    }

    /// Constrains a dimension to an exact value.
    pub fn with_option(mut self, dimension: impl Into<String>, value: impl Into<KeyValue>) -> Self {
        self.options.insert(dimension.into(), Some(value.into()));
        self
    }

    /// Explicitly accepts any value of a dimension.
    pub fn with_any(mut self, dimension: impl Into<String>) -> Self {
        self.options.insert(dimension.into(), None);
        self
    }

    pub fn with_order_by(mut self, sorter: Sorter) -> Self {
        self.order_by = Some(sorter);
        self
    }

    /// True when the partition satisfies every exact constraint.
    ///
    /// See [`KeyValue::matches_option`] for how text partitions compare
    /// with typed options.
    pub fn matches(&self, partition: &PartitionKey) -> bool {
        self.options.iter().all(|(dimension, wanted)| match wanted {
            None => true,
            Some(value) => partition
                .get(dimension)
                .is_some_and(|actual| actual.matches_option(value)),
        })
    }

    pub(crate) fn describe_options(&self) -> String {
        let rendered: Vec<String> = self
            .options
            .iter()
            .map(|(k, v)| match v {
                Some(v) => format!("{k}={v}"),
                None => format!("{k}=*"),
            })
            .collect();
        format!("{{{}}}", rendered.join(", "))
    }
}

/// Which of the matching batches a caller wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchSelection {
    First,
    Last,
    /// Position in sorted order; negative values count from the end.
    Index(i64),
    /// Every match; demanding exactly one under this policy fails when
    /// several batches match.
    All,
}

impl BatchSelection {
    /// Resolves the policy to a position in a sequence of `len` items.
    pub(crate) fn position(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        match self {
            BatchSelection::First => Some(0),
            BatchSelection::Last => Some(len - 1),
            BatchSelection::Index(i) => {
                let len = i64::try_from(len).ok()?;
                let idx = if *i < 0 { len + i } else { *i };
                if (0..len).contains(&idx) {
                    usize::try_from(idx).ok()
                } else {
                    None
                }
            }
            BatchSelection::All => (len == 1).then_some(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> AssetSource {
        AssetSource::Table {
            table_name: "events".to_string(),
        }
    }

    #[test]
    fn test_batch_id_is_stable_and_distinct() {
        let a = BatchConfig::new(
            "warehouse",
            "events",
            source(),
            None,
            PartitionKey::from_pairs([("id", 2)]),
        );
        let b = BatchConfig::new(
            "warehouse",
            "events",
            source(),
            None,
            PartitionKey::from_pairs([("id", 2)]),
        );
        let c = BatchConfig::new(
            "warehouse",
            "events",
            source(),
            None,
            PartitionKey::from_pairs([("id", 3)]),
        );
        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
        assert_eq!(a.id().len(), 32);
    }

    #[test]
    fn test_request_matching() {
        let partition = PartitionKey::from_pairs([("year", 2023), ("month", 1)]);
        assert!(BatchRequest::new("events").matches(&partition));
        assert!(BatchRequest::new("events")
            .with_option("year", 2023)
            .with_any("month")
            .matches(&partition));
        assert!(!BatchRequest::new("events")
            .with_option("year", 2022)
            .matches(&partition));
    }

    #[test]
    fn test_json_date_option_matches_text_partition() {
        let request: BatchRequest = serde_json::from_str(
            r#"{"asset_name": "events", "options": {"day": "2023-01-01"}}"#,
        )
        .unwrap();
        assert!(matches!(
            request.options.get("day"),
            Some(Some(KeyValue::Date(_)))
        ));
        assert!(request.matches(&PartitionKey::from_pairs([("day", "2023-01-01")])));
        assert!(!request.matches(&PartitionKey::from_pairs([("day", "2023-01-02")])));
    }

    #[test]
    fn test_selection_positions() {
        assert_eq!(BatchSelection::First.position(3), Some(0));
        assert_eq!(BatchSelection::Last.position(3), Some(2));
        assert_eq!(BatchSelection::Index(-1).position(3), Some(2));
        assert_eq!(BatchSelection::Index(3).position(3), None);
        assert_eq!(BatchSelection::Index(-4).position(3), None);
        assert_eq!(BatchSelection::All.position(1), Some(0));
        assert_eq!(BatchSelection::All.position(2), None);
        assert_eq!(BatchSelection::First.position(0), None);
    }

    #[test]
    fn test_request_deserialization() {
        let request: BatchRequest = serde_json::from_str(
            r#"{"asset_name": "events", "options": {"year": 2023, "month": null}, "order_by": ["-day"]}"#,
        )
        .unwrap();
        assert_eq!(request.options.get("year"), Some(&Some(KeyValue::Integer(2023))));
        assert_eq!(request.options.get("month"), Some(&None));
        assert!(request.order_by.is_some());
    }
}
