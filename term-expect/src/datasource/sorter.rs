//! Deterministic ordering over enumerated partitions.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use super::value::PartitionKey;
use crate::error::{Result, TermError};

/// One sort criterion: a partition dimension and its direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub key: String,
    pub reverse: bool,
}

impl SortKey {
    pub fn asc(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            reverse: false,
        }
    }

    pub fn desc(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            reverse: true,
        }
    }
}

impl FromStr for SortKey {
    type Err = TermError;

    /// Parses `"+key"`, `"-key"` or a bare `"key"` (ascending).
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (key, reverse) = match s.as_bytes().first() {
            Some(b'+') => (&s[1..], false),
            Some(b'-') => (&s[1..], true),
            _ => (s, false),
        };
        if key.trim().is_empty() {
            return Err(TermError::configuration(format!(
                "sort key '{s}' does not name a dimension"
            )));
        }
        Ok(Self {
            key: key.trim().to_string(),
            reverse,
        })
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", if self.reverse { '-' } else { '+' }, self.key)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SortKeyRepr {
    Short(String),
    Full {
        key: String,
        #[serde(default)]
        reverse: bool,
    },
}

impl<'de> Deserialize<'de> for SortKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match SortKeyRepr::deserialize(deserializer)? {
            SortKeyRepr::Short(s) => s.parse().map_err(serde::de::Error::custom),
            SortKeyRepr::Full { key, reverse } => Ok(SortKey { key, reverse }),
        }
    }
}

impl Serialize for SortKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// An ordered list of sort keys applied left to right.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sorter {
    keys: Vec<SortKey>,
}

impl Sorter {
    pub fn new(keys: Vec<SortKey>) -> Self {
        Self { keys }
    }

    /// Parses a list of `"+key"` / `"-key"` strings.
    pub fn parse<I, S>(keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        keys.into_iter()
            .map(|k| k.as_ref().parse())
            .collect::<Result<Vec<_>>>()
            .map(Self::new)
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Rejects keys that do not name one of the given dimensions.
    pub fn validate(&self, dimensions: &[String]) -> Result<()> {
        for sort_key in &self.keys {
            if !dimensions.iter().any(|d| d == &sort_key.key) {
                return Err(TermError::configuration(format!(
                    "sort key '{}' is not a partition dimension; available: [{}]",
                    sort_key.key,
                    dimensions.join(", ")
                )));
            }
        }
        Ok(())
    }

    /// Compares two keys under this sorter.
    pub fn compare(&self, a: &PartitionKey, b: &PartitionKey) -> Ordering {
        for sort_key in &self.keys {
            // Missing dimensions sort before present ones
            let ordering = a.get(&sort_key.key).cmp(&b.get(&sort_key.key));
            let ordering = if sort_key.reverse {
                ordering.reverse()
            } else {
                ordering
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Stable sort; ties keep their enumeration order.
    pub fn sort(&self, partitions: &mut [PartitionKey]) {
        if self.keys.is_empty() {
            return;
        }
        partitions.sort_by(|a, b| self.compare(a, b));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::value::KeyValue;

    fn key(year: i64, month: i64) -> PartitionKey {
        PartitionKey::from_pairs([("year", year), ("month", month)])
    }

    #[test]
    fn test_parse_sort_keys() {
        assert_eq!("-year".parse::<SortKey>().unwrap(), SortKey::desc("year"));
        assert_eq!("+year".parse::<SortKey>().unwrap(), SortKey::asc("year"));
        assert_eq!("month".parse::<SortKey>().unwrap(), SortKey::asc("month"));
        assert!("-".parse::<SortKey>().is_err());
    }

    #[test]
    fn test_deserialize_both_forms() {
        let sorter: Sorter =
            serde_json::from_str(r#"["-year", {"key": "month", "reverse": false}]"#).unwrap();
        assert_eq!(
            sorter.keys(),
            &[SortKey::desc("year"), SortKey::asc("month")]
        );
        assert_eq!(
            serde_json::to_string(&sorter).unwrap(),
            r#"["-year","+month"]"#
        );
    }

    #[test]
    fn test_validate_rejects_unknown_dimension() {
        let sorter = Sorter::parse(["-year", "day"]).unwrap();
        let dims = vec!["year".to_string(), "month".to_string()];
        assert!(matches!(
            sorter.validate(&dims),
            Err(TermError::Configuration(_))
        ));
    }

    #[test]
    fn test_multi_key_sort() {
        let sorter = Sorter::parse(["-year", "+month"]).unwrap();
        let mut partitions = vec![key(2022, 3), key(2023, 2), key(2022, 1), key(2023, 1)];
        sorter.sort(&mut partitions);
        assert_eq!(
            partitions,
            vec![key(2023, 1), key(2023, 2), key(2022, 1), key(2022, 3)]
        );
    }

    #[test]
    fn test_ties_preserve_enumeration_order() {
        let sorter = Sorter::parse(["-year"]).unwrap();
        let mut partitions = vec![key(2022, 3), key(2022, 1), key(2023, 9)];
        sorter.sort(&mut partitions);
        assert_eq!(partitions, vec![key(2023, 9), key(2022, 3), key(2022, 1)]);
    }

    #[test]
    fn test_missing_dimension_sorts_first() {
        let sorter = Sorter::parse(["region"]).unwrap();
        let with = PartitionKey::from_pairs([("region", KeyValue::from("eu"))]);
        let without = PartitionKey::new();
        let mut partitions = vec![with.clone(), without.clone()];
        sorter.sort(&mut partitions);
        assert_eq!(partitions, vec![without, with]);
    }
}
