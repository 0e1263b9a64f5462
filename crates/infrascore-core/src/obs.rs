//! Structured lifecycle events for scoring runs.
//!
//! Every event carries a stable `event = "..."` field so log pipelines can
//! filter on it regardless of message text. Levels are controlled through
//! `INFRASCORE_LOG` (see [`crate::telemetry`]).

use tracing::{info, info_span, warn, Span};

use crate::report::MetricStatus;

/// Span covering one run. Spawned metric tasks are instrumented with a child
/// of it via [`metric_span`].
pub fn run_span(run_id: &str) -> Span {
    info_span!("infrascore.run", run_id = %run_id)
}

/// Span covering one metric task, parented to `parent`.
pub fn metric_span(parent: &Span, metric: &str) -> Span {
    info_span!(parent: parent, "infrascore.metric", metric = %metric)
}

/// Emit event: run started.
pub fn emit_run_started(run_id: &str, evaluator: &str, max_workers: usize) {
    info!(
        event = "run.started",
        run_id = %run_id,
        evaluator = %evaluator,
        max_workers = max_workers,
    );
}

/// Emit event: dependency resolution succeeded.
pub fn emit_plan_resolved(run_id: &str, metrics: usize, waves: usize) {
    info!(event = "run.plan_resolved", run_id = %run_id, metrics = metrics, waves = waves);
}

/// Emit event: one metric reached a terminal state after being attempted.
pub fn emit_metric_finished(
    run_id: &str,
    metric: &str,
    status: MetricStatus,
    score: Option<u8>,
    duration_ms: u64,
) {
    info!(
        event = "metric.finished",
        run_id = %run_id,
        metric = %metric,
        status = ?status,
        score = ?score,
        duration_ms = duration_ms,
    );
}

/// Emit event: a metric was never attempted.
pub fn emit_metric_skipped(run_id: &str, metric: &str, reason: &str) {
    info!(event = "metric.skipped", run_id = %run_id, metric = %metric, reason = %reason);
}

/// Emit event: non-fatal aggregation warning (warning level).
pub fn emit_aggregation_warning(run_id: &str, warning: &str) {
    warn!(event = "aggregation.warning", run_id = %run_id, warning = %warning);
}

/// Emit event: run finished.
pub fn emit_run_finished(
    run_id: &str,
    duration_ms: u64,
    scored: usize,
    failed: usize,
    skipped: usize,
    overall_score: Option<f64>,
) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        scored = scored,
        failed = failed,
        skipped = skipped,
        overall_score = ?overall_score,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spans_and_events_do_not_panic_without_subscriber() {
        let run = run_span("run-test");
        let _metric = metric_span(&run, "score_x").entered();
        emit_metric_finished("run-test", "score_x", MetricStatus::Scored, Some(4), 12);
        emit_aggregation_warning("run-test", "category cost has no scored metrics");
    }
}
