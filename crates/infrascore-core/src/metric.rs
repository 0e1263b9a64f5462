//! Metric definitions: identity, category, weight, dependencies and input shape.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Stable metric identifier, e.g. `"score_tagging_coverage"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricId(String);

impl MetricId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for MetricId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for MetricId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for MetricId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Grouping used for sub-aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Cost,
    Efficiency,
    Reliability,
    Security,
    Governance,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Cost,
        Category::Efficiency,
        Category::Reliability,
        Category::Security,
        Category::Governance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Cost => "cost",
            Category::Efficiency => "efficiency",
            Category::Reliability => "reliability",
            Category::Security => "security",
            Category::Governance => "governance",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown category: {s}"))
    }
}

/// How a metric's input document is located and checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputDescriptor {
    /// Key the scoring backend knows the metric by, e.g. `"tagging.coverage"`.
    pub backbone_key: String,
    /// File name of the metric's input inside a sample set.
    pub sample_file: String,
    /// Top-level keys every input document must carry.
    pub required_keys: Vec<String>,
}

impl InputDescriptor {
    pub fn new(backbone_key: impl Into<String>, sample_file: impl Into<String>) -> Self {
        Self {
            backbone_key: backbone_key.into(),
            sample_file: sample_file.into(),
            required_keys: Vec::new(),
        }
    }

    pub fn with_required_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_keys = keys.into_iter().map(Into::into).collect();
        self
    }
}

/// A registered metric. Immutable once placed in a [`crate::MetricRegistry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DefinitionRepr")]
pub struct MetricDefinition {
    pub id: MetricId,
    pub category: Category,
    /// Positive weight used by the aggregator.
    pub weight: f64,
    /// Metrics that must complete before this one starts.
    pub depends_on: Vec<MetricId>,
    pub input: InputDescriptor,
}

impl MetricDefinition {
    /// Build a definition, rejecting non-positive or non-finite weights.
    pub fn new(
        id: impl Into<MetricId>,
        category: Category,
        weight: f64,
        input: InputDescriptor,
    ) -> ConfigResult<Self> {
        let id = id.into();
        if !weight.is_finite() || weight <= 0.0 {
            return Err(ConfigError::InvalidWeight {
                subject: id.to_string(),
                weight,
            });
        }
        Ok(Self {
            id,
            category,
            weight,
            depends_on: Vec::new(),
            input,
        })
    }

    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<MetricId>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }
}

/// Unchecked wire form; deserialisation goes through [`MetricDefinition::new`].
#[derive(Deserialize)]
struct DefinitionRepr {
    id: MetricId,
    category: Category,
    weight: f64,
    #[serde(default)]
    depends_on: Vec<MetricId>,
    input: InputDescriptor,
}

impl TryFrom<DefinitionRepr> for MetricDefinition {
    type Error = ConfigError;

    fn try_from(repr: DefinitionRepr) -> ConfigResult<Self> {
        Ok(MetricDefinition::new(repr.id, repr.category, repr.weight, repr.input)?
            .depends_on(repr.depends_on))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_rejects_non_positive_weight() {
        let input = InputDescriptor::new("x.y", "x_y.json");
        let err = MetricDefinition::new("score_x", Category::Cost, 0.0, input.clone()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidWeight { .. }));
        assert!(MetricDefinition::new("score_x", Category::Cost, f64::NAN, input).is_err());
    }

    #[test]
    fn test_deserialized_definition_is_weight_checked() {
        let ok: MetricDefinition = serde_json::from_value(serde_json::json!({
            "id": "score_x",
            "category": "cost",
            "weight": 0.4,
            "depends_on": ["score_y"],
            "input": {"backbone_key": "x.y", "sample_file": "x_y.json", "required_keys": []}
        }))
        .unwrap();
        assert_eq!(ok.depends_on, vec![MetricId::new("score_y")]);

        let err = serde_json::from_value::<MetricDefinition>(serde_json::json!({
            "id": "score_x",
            "category": "cost",
            "weight": -1.0,
            "input": {"backbone_key": "x.y", "sample_file": "x_y.json", "required_keys": []}
        }))
        .unwrap_err();
        assert!(err.to_string().contains("weight"), "{err}");
    }

    #[test]
    fn test_category_round_trips_through_str() {
        for c in Category::ALL {
            assert_eq!(c.as_str().parse::<Category>().unwrap(), c);
        }
        assert!("finance".parse::<Category>().is_err());
    }

    #[test]
    fn test_category_serializes_snake_case() {
        let v = serde_json::to_value(Category::Reliability).unwrap();
        assert_eq!(v, serde_json::json!("reliability"));
    }
}
