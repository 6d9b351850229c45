//! Range bounds and `mostly` thresholds shared by the between-style
//! expectations and the row-level metrics they request.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::datasource::KeyValue;
use crate::error::{Result, TermError};

/// An optionally open interval with per-side strictness.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RangeBounds {
    #[serde(default)]
    pub min_value: Option<KeyValue>,
    #[serde(default)]
    pub max_value: Option<KeyValue>,
    /// Exclude `min_value` itself.
    #[serde(default)]
    pub strict_min: bool,
    /// Exclude `max_value` itself.
    #[serde(default)]
    pub strict_max: bool,
}

impl RangeBounds {
    pub fn new(min_value: Option<KeyValue>, max_value: Option<KeyValue>) -> Self {
        Self {
            min_value,
            max_value,
            strict_min: false,
            strict_max: false,
        }
    }

    pub fn between(min_value: impl Into<KeyValue>, max_value: impl Into<KeyValue>) -> Self {
        Self::new(Some(min_value.into()), Some(max_value.into()))
    }

    pub fn at_least(min_value: impl Into<KeyValue>) -> Self {
        Self::new(Some(min_value.into()), None)
    }

    pub fn at_most(max_value: impl Into<KeyValue>) -> Self {
        Self::new(None, Some(max_value.into()))
    }

    pub fn strict(mut self, strict_min: bool, strict_max: bool) -> Self {
        self.strict_min = strict_min;
        self.strict_max = strict_max;
        self
    }

    /// Checks the bounds without looking at data.
    pub fn validate(&self, expectation_type: &str) -> Result<()> {
        let invalid = |message: String| TermError::configuration_invalid(expectation_type, message);

        if self.min_value.is_none() && self.max_value.is_none() {
            return Err(invalid(
                "at least one of min_value or max_value must be provided".to_string(),
            ));
        }

        for (name, bound) in [("min_value", &self.min_value), ("max_value", &self.max_value)] {
            if let Some(value) = bound {
                if !is_orderable_bound(value) {
                    return Err(invalid(format!(
                        "{name} must be a number, date or timestamp, got {value}"
                    )));
                }
            }
        }

        if let (Some(min), Some(max)) = (&self.min_value, &self.max_value) {
            match min.partial_compare(max) {
                None => {
                    return Err(invalid(format!(
                        "min_value {min} and max_value {max} are not comparable"
                    )))
                }
                Some(Ordering::Greater) => {
                    return Err(invalid(format!(
                        "min_value {min} is greater than max_value {max}"
                    )))
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Whether a value lies inside the bounds; `None` when the value cannot
    /// be compared with them.
    pub fn contains(&self, value: &KeyValue) -> Option<bool> {
        if let Some(min) = &self.min_value {
            match value.partial_compare(min)? {
                Ordering::Less => return Some(false),
                Ordering::Equal if self.strict_min => return Some(false),
                _ => {}
            }
        }
        if let Some(max) = &self.max_value {
            match value.partial_compare(max)? {
                Ordering::Greater => return Some(false),
                Ordering::Equal if self.strict_max => return Some(false),
                _ => {}
            }
        }
        Some(true)
    }

    /// Encodes the bounds as metric value kwargs.
    pub fn to_value_kwargs(&self) -> BTreeMap<String, serde_json::Value> {
        let mut kwargs = BTreeMap::new();
        if let Some(min) = &self.min_value {
            kwargs.insert("min_value".to_string(), key_to_json(min));
        }
        if let Some(max) = &self.max_value {
            kwargs.insert("max_value".to_string(), key_to_json(max));
        }
        kwargs.insert("strict_min".to_string(), self.strict_min.into());
        kwargs.insert("strict_max".to_string(), self.strict_max.into());
        kwargs
    }

    /// Decodes bounds from metric value kwargs.
    pub fn from_value_kwargs(kwargs: &BTreeMap<String, serde_json::Value>) -> Result<Self> {
        let value = serde_json::Value::Object(
            kwargs
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        );
        Ok(serde_json::from_value(value)?)
    }
}

fn key_to_json(value: &KeyValue) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

fn is_orderable_bound(value: &KeyValue) -> bool {
    matches!(
        value,
        KeyValue::Integer(_) | KeyValue::Float(_) | KeyValue::Date(_) | KeyValue::Timestamp(_)
    )
}

/// Validates a `mostly` fraction.
pub fn validate_mostly(expectation_type: &str, mostly: Option<f64>) -> Result<()> {
    match mostly {
        Some(m) if !(0.0..=1.0).contains(&m) => Err(TermError::configuration_invalid(
            expectation_type,
            format!("mostly must be between 0 and 1, got {m}"),
        )),
        _ => Ok(()),
    }
}

/// Whether an observed fraction meets `mostly`; the bound is closed.
pub fn meets_mostly(fraction: f64, mostly: Option<f64>) -> bool {
    fraction >= mostly.unwrap_or(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_min_greater_than_max_is_invalid() {
        let err = RangeBounds::between(5, 1)
            .validate("expect_column_max_to_be_between")
            .unwrap_err();
        assert!(matches!(err, TermError::ConfigurationInvalid { .. }));
    }

    #[test]
    fn test_missing_and_mistyped_bounds() {
        assert!(RangeBounds::default().validate("e").is_err());
        assert!(RangeBounds::at_least("abc").validate("e").is_err());
        let date = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        assert!(RangeBounds::between(1, date).validate("e").is_err());
        assert!(RangeBounds::between(1, 2.5).validate("e").is_ok());
        assert!(RangeBounds::at_most(date).validate("e").is_ok());
    }

    #[test]
    fn test_strictness() {
        let inclusive = RangeBounds::between(1, 10);
        assert_eq!(inclusive.contains(&KeyValue::Integer(1)), Some(true));
        assert_eq!(inclusive.contains(&KeyValue::Integer(10)), Some(true));
        assert_eq!(inclusive.contains(&KeyValue::Float(10.5)), Some(false));

        let strict = RangeBounds::between(1, 10).strict(true, true);
        assert_eq!(strict.contains(&KeyValue::Integer(1)), Some(false));
        assert_eq!(strict.contains(&KeyValue::Integer(10)), Some(false));
        assert_eq!(strict.contains(&KeyValue::Integer(5)), Some(true));

        assert_eq!(inclusive.contains(&KeyValue::Text("x".to_string())), None);
    }

    #[test]
    fn test_value_kwargs_round_trip() {
        let bounds = RangeBounds::between(1, 8).strict(false, true);
        let decoded = RangeBounds::from_value_kwargs(&bounds.to_value_kwargs()).unwrap();
        assert_eq!(decoded, bounds);
    }

    #[test]
    fn test_mostly_is_a_closed_bound() {
        assert!(meets_mostly(0.8, Some(0.8)));
        assert!(!meets_mostly(0.8, Some(0.81)));
        assert!(!meets_mostly(0.99, None));
        assert!(validate_mostly("e", Some(1.5)).is_err());
        assert!(validate_mostly("e", Some(0.0)).is_ok());
    }
}
