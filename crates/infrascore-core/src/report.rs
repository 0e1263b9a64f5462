//! Per-metric results and the assembled run report.
//!
//! [`ReportAssembler`] packages the result mapping and the [`Summary`] into a
//! single [`RunReport`]. It performs no I/O; writing the report out is the job
//! of a [`crate::persist::ReportSink`].

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::aggregate::Summary;
use crate::context::RunId;
use crate::error::{FailureKind, MetricFailure};
use crate::evaluator::Evaluation;
use crate::input::InputSource;
use crate::metric::{Category, MetricDefinition, MetricId};

/// Terminal state of one metric within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricStatus {
    Scored,
    Failed,
    /// Never attempted because the run was cancelled first.
    Skipped,
}

/// Outcome of one attempted metric. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    /// `null` unless the metric was scored.
    pub score: Option<u8>,
    pub rationale: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub status: MetricStatus,
    pub category: Category,
    /// Effective weight for this run, after any run-level override.
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_source: Option<InputSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl MetricResult {
    pub fn scored(
        definition: &MetricDefinition,
        weight: f64,
        source: InputSource,
        evaluation: Evaluation,
    ) -> Self {
        Self {
            score: Some(evaluation.score.get()),
            rationale: evaluation.rationale,
            error: None,
            status: MetricStatus::Scored,
            category: definition.category,
            weight,
            failure_kind: None,
            input_source: Some(source),
            details: evaluation.details,
        }
    }

    pub fn failed(
        definition: &MetricDefinition,
        weight: f64,
        source: Option<InputSource>,
        failure: MetricFailure,
    ) -> Self {
        Self {
            score: None,
            rationale: String::new(),
            error: Some(failure.message),
            status: MetricStatus::Failed,
            category: definition.category,
            weight,
            failure_kind: Some(failure.kind),
            input_source: source,
            details: None,
        }
    }

    pub fn skipped(definition: &MetricDefinition, weight: f64, reason: impl Into<String>) -> Self {
        Self {
            score: None,
            rationale: String::new(),
            error: Some(reason.into()),
            status: MetricStatus::Skipped,
            category: definition.category,
            weight,
            failure_kind: None,
            input_source: None,
            details: None,
        }
    }

    pub fn is_scored(&self) -> bool {
        self.status == MetricStatus::Scored && self.score.is_some()
    }
}

/// The final output of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,
    pub generated_at: DateTime<Utc>,
    /// Exactly one entry per metric in the resolved execution set.
    pub metrics: BTreeMap<MetricId, MetricResult>,
    pub summary: Summary,
}

impl RunReport {
    pub fn get(&self, id: &str) -> Option<&MetricResult> {
        self.metrics.get(&MetricId::from(id))
    }

    pub fn count(&self, status: MetricStatus) -> usize {
        self.metrics.values().filter(|r| r.status == status).count()
    }
}

/// Packages results and summary into a [`RunReport`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportAssembler;

impl ReportAssembler {
    pub fn assemble(
        &self,
        run_id: RunId,
        metrics: BTreeMap<MetricId, MetricResult>,
        summary: Summary,
    ) -> RunReport {
        RunReport {
            run_id,
            generated_at: Utc::now(),
            metrics,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvaluationError;
    use crate::evaluator::Score;
    use crate::metric::InputDescriptor;
    use serde_json::json;

    fn def() -> MetricDefinition {
        MetricDefinition::new(
            "score_lb_performance",
            Category::Reliability,
            0.4,
            InputDescriptor::new("lb.performance", "lb_performance.json"),
        )
        .unwrap()
    }

    #[test]
    fn test_scored_result_wire_shape() {
        let eval = Evaluation::new(Score::new(4).unwrap(), "p95 within SLO");
        let r = MetricResult::scored(&def(), 0.4, InputSource::Params, eval);
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["score"], json!(4));
        assert_eq!(v["rationale"], json!("p95 within SLO"));
        assert!(v.get("error").is_none());
        assert_eq!(v["status"], json!("scored"));
    }

    #[test]
    fn test_failed_result_has_null_score_and_error() {
        let r = MetricResult::failed(
            &def(),
            0.4,
            None,
            EvaluationError::Timeout { timeout_ms: 10 }.into(),
        );
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["score"], Value::Null);
        assert!(v["error"].as_str().unwrap().contains("timed out"));
        assert_eq!(v["failure_kind"], json!("evaluation"));
        assert!(!r.is_scored());
    }

    #[test]
    fn test_skipped_result() {
        let r = MetricResult::skipped(&def(), 0.4, "run cancelled");
        assert_eq!(r.status, MetricStatus::Skipped);
        assert_eq!(r.error.as_deref(), Some("run cancelled"));
    }
}
