//! Per-invocation inputs: the run context and run configuration.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::metric::{Category, MetricId};
use crate::resolver::MetricSelection;

/// Per-metric override supplied by the caller.
///
/// Both fields may be present; the input resolver gives `params` precedence
/// and never merges the two sources.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricOverride {
    /// Direct input document. Validated when the metric's input is resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Named sample set to load this metric's input from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_name: Option<String>,
}

impl MetricOverride {
    pub fn params(params: Value) -> Self {
        Self {
            params: Some(params),
            sample_name: None,
        }
    }

    pub fn sample(name: impl Into<String>) -> Self {
        Self {
            params: None,
            sample_name: Some(name.into()),
        }
    }
}

/// Mapping from metric identifier to its optional override. Read-only during
/// a run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunContext(BTreeMap<MetricId, MetricOverride>);

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: impl Into<MetricId>, entry: MetricOverride) -> Self {
        self.0.insert(id.into(), entry);
        self
    }

    pub fn get(&self, id: &MetricId) -> Option<&MetricOverride> {
        self.0.get(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Run identifier, derived from the start timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// `run-<UTC timestamp>-<8 hex chars>`; the suffix keeps runs started in
    /// the same second apart.
    pub fn generate() -> Self {
        let ts = Utc::now().format("%Y%m%dT%H%M%SZ");
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("run-{ts}-{}", &suffix[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-invocation run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub metrics: MetricSelection,
    /// Where the persistence collaborator should write the report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    #[serde(default = "RunId::generate")]
    pub run_id: RunId,
    /// Overrides the engine's concurrency bound for this run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<usize>,
    /// Overrides category weights for this run (category-weighted roll-up).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_weights: Option<BTreeMap<Category, f64>>,
    /// Overrides individual metric weights for this run.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metric_weights: HashMap<MetricId, f64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            metrics: MetricSelection::All,
            output_path: None,
            run_id: RunId::generate(),
            max_workers: None,
            category_weights: None,
            metric_weights: HashMap::new(),
        }
    }
}

impl RunConfig {
    pub fn new(metrics: MetricSelection) -> Self {
        Self {
            metrics,
            ..Self::default()
        }
    }

    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }
}
