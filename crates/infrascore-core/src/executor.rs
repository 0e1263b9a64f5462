//! Dependency-aware concurrent execution of a metric plan.
//!
//! Every planned metric becomes its own task. A task first waits for the
//! completion signals of its direct dependencies, then takes a permit from a
//! shared semaphore, then resolves its input and calls the evaluator under a
//! per-call timeout. Waiting happens before the permit is taken, so a blocked
//! dependent never holds capacity its dependencies need.
//!
//! Dependencies gate ordering only: a dependent starts once its dependencies
//! have finished, whether they scored or failed, and never sees their output.
//!
//! Tasks live in a [`JoinSet`] owned by the run future. Each returns its own
//! [`MetricResult`], so every slot is written exactly once with no shared map.
//! Dropping the run future drops the set, which aborts every task still
//! waiting or evaluating.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn, Instrument};

use crate::aggregate::Aggregator;
use crate::config::{default_category_weights, EngineConfig, WeightingScheme};
use crate::context::{MetricOverride, RunConfig, RunContext};
use crate::error::{ConfigError, ConfigResult, EngineResult, EvaluationError, MetricFailure};
use crate::evaluator::Evaluator;
use crate::input::InputResolver;
use crate::metric::{MetricDefinition, MetricId};
use crate::obs;
use crate::registry::MetricRegistry;
use crate::report::{MetricResult, MetricStatus, ReportAssembler, RunReport};
use crate::resolver::{DependencyResolver, ExecutionPlan, MetricSelection};
use crate::sample::SampleStore;

const CANCELLED_BEFORE_START: &str = "run cancelled before this metric started";

/// Runs metric plans against an evaluation capability.
#[derive(Clone)]
pub struct ExecutionEngine {
    registry: Arc<MetricRegistry>,
    inputs: InputResolver,
    evaluator: Arc<dyn Evaluator>,
    config: EngineConfig,
}

impl ExecutionEngine {
    pub fn new(
        registry: Arc<MetricRegistry>,
        store: Arc<dyn SampleStore>,
        evaluator: Arc<dyn Evaluator>,
        config: EngineConfig,
    ) -> Self {
        let inputs = InputResolver::new(store, config.default_sample_set.clone());
        Self {
            registry,
            inputs,
            evaluator,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    /// Resolve `selection` without running anything.
    pub fn plan(&self, selection: &MetricSelection) -> ConfigResult<ExecutionPlan> {
        DependencyResolver::new(&self.registry).resolve(selection)
    }

    /// Execute one run to completion.
    pub async fn run(&self, run: &RunConfig, context: &RunContext) -> EngineResult<RunReport> {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        self.run_with_cancel(run, context, cancel_rx).await
    }

    /// Execute one run, aborting early once `cancel` flips to `true`.
    ///
    /// In-flight evaluations are dropped and recorded as failed; metrics that
    /// had not started are recorded as skipped. The report is still complete.
    #[instrument(skip_all, fields(run_id = %run.run_id))]
    pub async fn run_with_cancel(
        &self,
        run: &RunConfig,
        context: &RunContext,
        cancel: watch::Receiver<bool>,
    ) -> EngineResult<RunReport> {
        let started = Instant::now();
        let run_id = run.run_id.to_string();

        self.check_overrides(run)?;
        let plan = self.plan(&run.metrics)?;

        let max_workers = run.max_workers.unwrap_or(self.config.max_concurrency).max(1);
        obs::emit_run_started(&run_id, self.evaluator.name(), max_workers);
        obs::emit_plan_resolved(&run_id, plan.len(), plan.levels().len());

        let sem = Arc::new(Semaphore::new(max_workers));
        let run_span = obs::run_span(&run_id);

        let mut done: HashMap<MetricId, watch::Receiver<bool>> = HashMap::new();
        let mut slots: Vec<(MetricDefinition, f64)> = Vec::with_capacity(plan.len());
        let mut join_set = JoinSet::new();

        for id in &plan.order {
            let definition = self.registry.get(id)?.clone();
            let weight = run
                .metric_weights
                .get(id)
                .copied()
                .unwrap_or(definition.weight);

            let deps: Vec<watch::Receiver<bool>> = plan
                .dependencies_of(id)
                .iter()
                .filter_map(|d| done.get(d).cloned())
                .collect();
            let (done_tx, done_rx) = watch::channel(false);
            done.insert(id.clone(), done_rx);

            let task = MetricTask {
                run_id: run_id.clone(),
                definition: definition.clone(),
                weight,
                entry: context.get(id).cloned(),
                deps,
                sem: Arc::clone(&sem),
                inputs: self.inputs.clone(),
                evaluator: Arc::clone(&self.evaluator),
                timeout: self.config.evaluation_timeout,
                cancel: cancel.clone(),
            };

            let span = obs::metric_span(&run_span, id.as_str());
            let task_id = id.clone();
            join_set.spawn(
                async move {
                    let result = task.run().await;
                    let _ = done_tx.send(true);
                    (task_id, result)
                }
                .instrument(span),
            );
            slots.push((definition, weight));
        }

        let mut results = BTreeMap::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((id, result)) => {
                    results.insert(id, result);
                }
                Err(e) => warn!(error = %e, "metric task aborted"),
            }
        }
        for (definition, weight) in slots {
            if !results.contains_key(&definition.id) {
                let result = MetricResult::failed(
                    &definition,
                    weight,
                    None,
                    EvaluationError::Backend("metric task aborted".to_string()).into(),
                );
                results.insert(definition.id.clone(), result);
            }
        }

        let summary = Aggregator::new(self.scheme_for(run)).aggregate(&results);
        for warning in &summary.warnings {
            obs::emit_aggregation_warning(&run_id, warning);
        }

        let report = ReportAssembler.assemble(run.run_id.clone(), results, summary);
        obs::emit_run_finished(
            &run_id,
            started.elapsed().as_millis() as u64,
            report.count(MetricStatus::Scored),
            report.count(MetricStatus::Failed),
            report.count(MetricStatus::Skipped),
            report.summary.overall_score,
        );
        Ok(report)
    }

    /// Run-level category weights are merged over the configured ones (or
    /// the defaults when the engine rolls up by metric weight). Categories the
    /// run leaves out keep their configured weight.
    fn scheme_for(&self, run: &RunConfig) -> WeightingScheme {
        let Some(overrides) = &run.category_weights else {
            return self.config.weighting.clone();
        };
        let mut category_weights = match &self.config.weighting {
            WeightingScheme::CategoryWeighted { category_weights } => category_weights.clone(),
            WeightingScheme::MetricWeighted => default_category_weights(),
        };
        category_weights.extend(overrides.iter().map(|(c, w)| (*c, *w)));
        WeightingScheme::CategoryWeighted { category_weights }
    }

    /// Reject run-level weight overrides that could not be aggregated.
    fn check_overrides(&self, run: &RunConfig) -> ConfigResult<()> {
        for (id, weight) in &run.metric_weights {
            if !self.registry.contains(id) {
                return Err(ConfigError::UnknownMetric {
                    metric: id.to_string(),
                    referenced_by: None,
                });
            }
            if !weight.is_finite() || *weight <= 0.0 {
                return Err(ConfigError::InvalidWeight {
                    subject: id.to_string(),
                    weight: *weight,
                });
            }
        }
        for (category, weight) in run.category_weights.iter().flatten() {
            if !weight.is_finite() || *weight <= 0.0 {
                return Err(ConfigError::InvalidWeight {
                    subject: format!("category {category}"),
                    weight: *weight,
                });
            }
        }
        Ok(())
    }
}

/// Everything one spawned metric task owns.
struct MetricTask {
    run_id: String,
    definition: MetricDefinition,
    weight: f64,
    entry: Option<MetricOverride>,
    deps: Vec<watch::Receiver<bool>>,
    sem: Arc<Semaphore>,
    inputs: InputResolver,
    evaluator: Arc<dyn Evaluator>,
    timeout: Duration,
    cancel: watch::Receiver<bool>,
}

impl MetricTask {
    async fn run(self) -> MetricResult {
        let metric = self.definition.id.to_string();

        for dep in &self.deps {
            tokio::select! {
                biased;
                _ = cancelled(self.cancel.clone()) => return self.skip(&metric),
                _ = finished(dep.clone()) => {}
            }
        }

        let _permit = tokio::select! {
            biased;
            _ = cancelled(self.cancel.clone()) => return self.skip(&metric),
            permit = Arc::clone(&self.sem).acquire_owned() => permit.ok(),
        };
        if *self.cancel.borrow() {
            return self.skip(&metric);
        }

        debug!(metric = %metric, "metric started");
        let started = Instant::now();
        let result = tokio::select! {
            biased;
            _ = cancelled(self.cancel.clone()) => MetricResult::failed(
                &self.definition,
                self.weight,
                None,
                EvaluationError::Cancelled.into(),
            ),
            result = self.attempt() => result,
        };

        obs::emit_metric_finished(
            &self.run_id,
            &metric,
            result.status,
            result.score,
            started.elapsed().as_millis() as u64,
        );
        result
    }

    async fn attempt(&self) -> MetricResult {
        let resolved = match self.inputs.resolve(&self.definition, self.entry.as_ref()).await {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(metric = %self.definition.id, error = %e, "input resolution failed");
                return MetricResult::failed(&self.definition, self.weight, None, e.into());
            }
        };

        let call = self.evaluator.evaluate(&self.definition, &resolved.document);
        let outcome = match tokio::time::timeout(self.timeout, call).await {
            Ok(outcome) => outcome,
            Err(_) => Err(EvaluationError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        };

        match outcome {
            Ok(evaluation) => {
                MetricResult::scored(&self.definition, self.weight, resolved.source, evaluation)
            }
            Err(e) => {
                warn!(metric = %self.definition.id, error = %e, "evaluation failed");
                let failure: MetricFailure = e.into();
                MetricResult::failed(&self.definition, self.weight, Some(resolved.source), failure)
            }
        }
    }

    fn skip(&self, metric: &str) -> MetricResult {
        obs::emit_metric_skipped(&self.run_id, metric, CANCELLED_BEFORE_START);
        MetricResult::skipped(&self.definition, self.weight, CANCELLED_BEFORE_START)
    }
}

/// Resolves once the flag reads `true`. A dropped sender means the flag can
/// never flip, so this then pends forever.
async fn cancelled(mut rx: watch::Receiver<bool>) {
    let flipped = rx.wait_for(|c| *c).await.is_ok();
    if !flipped {
        std::future::pending::<()>().await;
    }
}

/// Resolves once a dependency has signalled completion or its task is gone.
async fn finished(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|d| *d).await;
}
