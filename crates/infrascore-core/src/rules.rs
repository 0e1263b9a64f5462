//! Deterministic rubric scoring.
//!
//! [`RubricEvaluator`] scores the metrics whose rubric reduces to a formula
//! over the input document. Everything else is reported as unsupported so the
//! engine records a per-metric failure instead of guessing.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::document::Document;
use crate::error::{EvaluationError, EvaluationResult};
use crate::evaluator::{Evaluation, Evaluator, Score};
use crate::metric::MetricDefinition;

/// Backbone keys the rubric evaluator can score.
pub const SUPPORTED_KEYS: [&str; 6] = [
    "tagging.coverage",
    "compute.utilization",
    "cost.allocation_quality",
    "security.encryption",
    "security.iam_risk",
    "db.utilization",
];

const LOW_UTIL: f64 = 0.1;
const DB_LOW_CPU: f64 = 0.2;
const DB_HIGH_CPU: f64 = 0.85;
const KEY_MAX_AGE_DAYS: f64 = 90.0;
const LEGACY_TLS: [&str; 6] = ["SSLV3", "TLS1.0", "TLS1.1", "TLSV1", "TLSV1.0", "TLSV1.1"];

/// Rule-based evaluation capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct RubricEvaluator;

impl RubricEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn supports(backbone_key: &str) -> bool {
        SUPPORTED_KEYS.contains(&backbone_key)
    }
}

#[async_trait]
impl Evaluator for RubricEvaluator {
    async fn evaluate(
        &self,
        metric: &MetricDefinition,
        input: &Document,
    ) -> EvaluationResult<Evaluation> {
        match metric.input.backbone_key.as_str() {
            "tagging.coverage" => tagging_coverage(input),
            "compute.utilization" => compute_utilization(input),
            "cost.allocation_quality" => cost_allocation(input),
            "security.encryption" => encryption(input),
            "security.iam_risk" => iam_risk(input),
            "db.utilization" => db_utilization(input),
            _ => Err(EvaluationError::Unsupported {
                metric: metric.id.to_string(),
            }),
        }
    }

    fn name(&self) -> &str {
        "rules"
    }
}

fn array<'a>(input: &'a Document, key: &str) -> EvaluationResult<&'a Vec<Value>> {
    input
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| EvaluationError::InvalidInput(format!("'{key}' must be an array")))
}

fn non_empty<'a>(input: &'a Document, key: &str) -> EvaluationResult<&'a Vec<Value>> {
    let items = array(input, key)?;
    if items.is_empty() {
        return Err(EvaluationError::InvalidInput(format!(
            "'{key}' is empty, nothing to score"
        )));
    }
    Ok(items)
}

/// Missing, null, false, zero and empty values all read as unset.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn num(item: &Value, key: &str) -> Option<f64> {
    item.get(key).and_then(Value::as_f64)
}

/// Map a ratio onto 5..1 using descending lower bounds for scores 5, 4, 3, 2.
fn band(ratio: f64, bounds: [f64; 4]) -> u8 {
    let mut score = 5;
    for bound in bounds {
        if ratio >= bound {
            return score;
        }
        score -= 1;
    }
    1
}

fn scored(score: u8, rationale: String, details: Value) -> EvaluationResult<Evaluation> {
    Ok(Evaluation::new(Score::new(i64::from(score))?, rationale).with_details(details))
}

fn pct(ratio: f64) -> f64 {
    (ratio * 1000.0).round() / 10.0
}

fn tagging_coverage(input: &Document) -> EvaluationResult<Evaluation> {
    let resources = non_empty(input, "resources")?;
    let required: Vec<&str> = array(input, "required_tags")?
        .iter()
        .filter_map(Value::as_str)
        .collect();

    let mut missing_examples = Vec::new();
    let mut full = 0usize;
    for r in resources {
        let tags = r.get("tags").and_then(Value::as_object);
        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|t| {
                !tags
                    .and_then(|m| m.get(*t))
                    .is_some_and(|v| !v.is_null() && v.as_str() != Some(""))
            })
            .collect();
        if missing.is_empty() {
            full += 1;
        } else if missing_examples.len() < 5 {
            missing_examples.push(json!({"id": r.get("id"), "missing": missing}));
        }
    }

    let coverage = full as f64 / resources.len() as f64;
    scored(
        band(coverage, [0.95, 0.85, 0.70, 0.50]),
        format!(
            "{}% of {} resources carry every required tag",
            pct(coverage),
            resources.len()
        ),
        json!({"coverage_pct": coverage, "missing_examples": missing_examples}),
    )
}

fn compute_utilization(input: &Document) -> EvaluationResult<Evaluation> {
    let instances = non_empty(input, "instances")?;
    let n = instances.len() as f64;

    let mut low = 0usize;
    let (mut cpu_sum, mut mem_sum) = (0.0, 0.0);
    for i in instances {
        let cpu = num(i, "cpu_p95").unwrap_or(0.0);
        let mem = num(i, "mem_p95").unwrap_or(0.0);
        cpu_sum += cpu;
        mem_sum += mem;
        if cpu < LOW_UTIL && mem < LOW_UTIL {
            low += 1;
        }
    }

    let low_share = low as f64 / n;
    let score = match low_share {
        s if s < 0.10 => 5,
        s if s < 0.20 => 4,
        s if s < 0.35 => 3,
        s if s <= 0.50 => 2,
        _ => 1,
    };
    scored(
        score,
        format!("{low} of {} instances are persistently low-utilised", instances.len()),
        json!({
            "low_util_count": low,
            "fleet_cpu_p95": cpu_sum / n,
            "fleet_mem_p95": mem_sum / n,
        }),
    )
}

fn cost_allocation(input: &Document) -> EvaluationResult<Evaluation> {
    let rows = non_empty(input, "cost_rows")?;

    let attributable = |row: &Value| {
        let tagged = row
            .get("tags")
            .and_then(Value::as_object)
            .is_some_and(|t| !t.is_empty());
        let has_id = row
            .get("resource_id")
            .and_then(Value::as_str)
            .is_some_and(|s| !s.is_empty());
        tagged || has_id
    };

    let total: f64 = rows.iter().filter_map(|r| num(r, "cost")).sum();
    let ratio = if total > 0.0 {
        rows.iter()
            .filter(|r| attributable(r))
            .filter_map(|r| num(r, "cost"))
            .sum::<f64>()
            / total
    } else {
        rows.iter().filter(|r| attributable(r)).count() as f64 / rows.len() as f64
    };

    scored(
        band(ratio, [0.95, 0.90, 0.75, 0.50]),
        format!("{}% of spend is attributable", pct(ratio)),
        json!({"attributable_pct": ratio}),
    )
}

fn encryption(input: &Document) -> EvaluationResult<Evaluation> {
    let resources = non_empty(input, "resources")?;

    let at_rest: Vec<bool> = resources
        .iter()
        .filter_map(|r| r.get("encrypted_at_rest").and_then(Value::as_bool))
        .collect();
    let at_rest_ratio = if at_rest.is_empty() {
        1.0
    } else {
        at_rest.iter().filter(|e| **e).count() as f64 / at_rest.len() as f64
    };

    let endpoints: Vec<&str> = resources
        .iter()
        .filter(|r| r.get("type").and_then(Value::as_str) == Some("load_balancer"))
        .filter_map(|r| r.get("tls_policy").and_then(Value::as_str))
        .collect();
    let legacy = endpoints
        .iter()
        .filter(|p| {
            let p = p.to_ascii_uppercase().replace(' ', "").replace('_', ".");
            LEGACY_TLS.contains(&p.as_str())
        })
        .count();

    let base = band(at_rest_ratio, [0.98, 0.95, 0.85, 0.70]);
    let cap = if legacy == 0 {
        5
    } else if legacy * 2 > endpoints.len() {
        1
    } else if legacy >= 2 {
        2
    } else {
        3
    };

    scored(
        base.min(cap),
        format!(
            "{}% encrypted at rest, {legacy} legacy TLS endpoint(s)",
            pct(at_rest_ratio)
        ),
        json!({"at_rest_pct": at_rest_ratio, "legacy_tls_endpoints": legacy}),
    )
}

fn iam_risk(input: &Document) -> EvaluationResult<Evaluation> {
    let users = array(input, "users")?;
    let keys = array(input, "keys")?;
    let policies = array(input, "policies")?;

    let no_mfa = users
        .iter()
        .filter(|u| !u.get("mfa_enabled").is_some_and(truthy))
        .count();
    let old_keys = keys
        .iter()
        .filter(|k| num(k, "age_days").is_some_and(|d| d > KEY_MAX_AGE_DAYS))
        .count();
    let is_wildcard = |p: &Value, field: &str| {
        p.get(field)
            .and_then(Value::as_array)
            .is_some_and(|a| a.iter().any(|v| v.as_str() == Some("*")))
    };
    let permissive = policies
        .iter()
        .filter(|p| is_wildcard(p, "actions") && is_wildcard(p, "resources"))
        .count();

    let issues = no_mfa + old_keys + permissive;
    let mut score = match issues {
        0 => 5,
        1..=2 => 4,
        3..=5 => 3,
        6..=10 => 2,
        _ => 1,
    };
    if permissive > 0 {
        score = score.min(2);
    }

    scored(
        score,
        format!(
            "{no_mfa} user(s) without MFA, {old_keys} key(s) older than 90 days, {permissive} wildcard polic(ies)"
        ),
        json!({
            "users_without_mfa": no_mfa,
            "old_keys": old_keys,
            "overly_permissive_principals": permissive,
        }),
    )
}

fn db_utilization(input: &Document) -> EvaluationResult<Evaluation> {
    let dbs = non_empty(input, "databases")?;

    let mut low = 0usize;
    let mut high = 0usize;
    for db in dbs {
        match num(db, "cpu_p95") {
            Some(c) if c < DB_LOW_CPU => low += 1,
            Some(c) if c > DB_HIGH_CPU => high += 1,
            _ => {}
        }
    }

    let outliers = (low + high) as f64 / dbs.len() as f64;
    let score = match outliers {
        _ if low + high == 0 => 5,
        s if s <= 0.2 => 4,
        s if s <= 0.5 => 3,
        s if s <= 0.75 => 2,
        _ => 1,
    };
    scored(
        score,
        format!("{low} idle and {high} saturated of {} databases", dbs.len()),
        json!({"low_util_count": low, "high_util_count": high}),
    )
}
