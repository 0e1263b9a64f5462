//! Error taxonomy for the metric orchestration engine.
//!
//! Only [`ConfigError`] ever aborts a run. Input and evaluation errors are
//! captured per metric and surface in the report as a [`MetricFailure`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors: fatal, raised before any evaluation starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A metric identifier was registered twice.
    #[error("metric already registered: {metric}")]
    DuplicateMetric { metric: String },

    /// A metric identifier is not present in the registry.
    #[error("unknown metric: {metric}{}", referrer_suffix(.referenced_by))]
    UnknownMetric {
        metric: String,
        referenced_by: Option<String>,
    },

    /// The dependency graph contains a cycle. The path repeats its first node
    /// at the end, e.g. `[a, b, a]`.
    #[error("dependency cycle detected: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// A weight is not a finite positive number.
    #[error("invalid weight {weight} for {subject}")]
    InvalidWeight { subject: String, weight: f64 },

    /// An explicit metric selection contained no identifiers.
    #[error("metric selection is empty")]
    EmptySelection,
}

fn referrer_suffix(referenced_by: &Option<String>) -> String {
    referenced_by
        .as_ref()
        .map(|r| format!(" (dependency of {r})"))
        .unwrap_or_default()
}

/// Convenience result alias for configuration checks.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Errors raised while materialising a metric's input document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    /// The sample set has no input file for this metric.
    #[error("no input for metric {metric} in sample set '{sample_set}'")]
    SampleNotFound { sample_set: String, metric: String },

    /// Directly supplied parameters are not a JSON object.
    #[error("malformed params for metric {metric}: {reason}")]
    MalformedParams { metric: String, reason: String },

    /// The document lacks keys the metric requires.
    #[error("input for metric {metric} is missing required keys: {}", .missing.join(", "))]
    SchemaViolation { metric: String, missing: Vec<String> },

    /// The sample store could not read or parse its backing data.
    #[error("sample store error: {0}")]
    SampleStore(String),
}

/// Convenience result alias for input resolution.
pub type InputResult<T> = std::result::Result<T, InputError>;

/// Errors raised by an evaluation capability.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("evaluation timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("scoring backend error: {0}")]
    Backend(String),

    #[error("malformed backend response: {0}")]
    MalformedResponse(String),

    #[error("score {score} outside the 1-5 range")]
    ScoreOutOfRange { score: i64 },

    #[error("metric {metric} is not supported by this backend")]
    Unsupported { metric: String },

    /// The input passed schema checks but cannot be scored.
    #[error("input rejected: {0}")]
    InvalidInput(String),

    #[error("evaluation cancelled")]
    Cancelled,
}

/// Convenience result alias for evaluation calls.
pub type EvaluationResult<T> = std::result::Result<T, EvaluationError>;

/// Errors that abort an entire run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result alias for engine entry points.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Where a per-metric failure originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InputResolution,
    Evaluation,
}

/// A recoverable per-metric failure, recorded in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl From<InputError> for MetricFailure {
    fn from(err: InputError) -> Self {
        Self {
            kind: FailureKind::InputResolution,
            message: err.to_string(),
        }
    }
}

impl From<EvaluationError> for MetricFailure {
    fn from(err: EvaluationError) -> Self {
        Self {
            kind: FailureKind::Evaluation,
            message: err.to_string(),
        }
    }
}
