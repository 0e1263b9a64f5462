//! Engine configuration, built once at process start and shared by reference.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::metric::Category;

/// How per-metric scores roll up into the overall score.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum WeightingScheme {
    /// Overall = weighted mean over every scored metric, using metric weights.
    #[default]
    MetricWeighted,
    /// Overall = weighted mean over category scores, using category weights.
    /// Categories without a weight do not contribute to the overall score.
    CategoryWeighted {
        category_weights: BTreeMap<Category, f64>,
    },
}

impl WeightingScheme {
    /// Category weighting with the stock cost/efficiency/reliability/security
    /// split.
    pub fn category_weighted() -> Self {
        Self::CategoryWeighted {
            category_weights: default_category_weights(),
        }
    }
}

/// Stock category weights. Governance is intentionally absent.
pub fn default_category_weights() -> BTreeMap<Category, f64> {
    BTreeMap::from([
        (Category::Cost, 0.35),
        (Category::Efficiency, 0.25),
        (Category::Reliability, 0.15),
        (Category::Security, 0.25),
    ])
}

/// Engine-wide settings.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Maximum number of evaluations in flight at once.
    pub max_concurrency: usize,
    /// Per-call evaluation timeout.
    pub evaluation_timeout: Duration,
    /// Sample set used when the run context names none.
    pub default_sample_set: String,
    pub weighting: WeightingScheme,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 6,
            evaluation_timeout: Duration::from_secs(60),
            default_sample_set: "Sample2".to_string(),
            weighting: WeightingScheme::MetricWeighted,
        }
    }
}

impl EngineConfig {
    /// Set the concurrency bound. Zero is clamped to one.
    pub fn with_max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n.max(1);
        self
    }

    pub fn with_evaluation_timeout(mut self, timeout: Duration) -> Self {
        self.evaluation_timeout = timeout;
        self
    }

    pub fn with_default_sample_set(mut self, name: impl Into<String>) -> Self {
        self.default_sample_set = name.into();
        self
    }

    pub fn with_weighting(mut self, weighting: WeightingScheme) -> Self {
        self.weighting = weighting;
        self
    }
}
