//! The builtin cloud-posture metric catalog.

use crate::error::ConfigResult;
use crate::metric::{Category, InputDescriptor, MetricDefinition};
use crate::registry::MetricRegistry;

struct Entry {
    id: &'static str,
    category: Category,
    weight: f64,
    backbone_key: &'static str,
    required_keys: &'static [&'static str],
    depends_on: &'static [&'static str],
}

const fn entry(
    id: &'static str,
    category: Category,
    weight: f64,
    backbone_key: &'static str,
    required_keys: &'static [&'static str],
) -> Entry {
    Entry {
        id,
        category,
        weight,
        backbone_key,
        required_keys,
        depends_on: &[],
    }
}

const fn with_deps(mut e: Entry, depends_on: &'static [&'static str]) -> Entry {
    e.depends_on = depends_on;
    e
}

use Category::{Cost, Efficiency, Governance, Reliability, Security};

// Independent metrics first, then the ones that wait on them.
const CATALOG: [Entry; 16] = [
    entry("score_tagging_coverage", Governance, 0.5, "tagging.coverage", &["resources", "required_tags"]),
    entry("score_compute_utilization", Efficiency, 0.22, "compute.utilization", &["instances"]),
    entry(
        "score_k8s_utilization",
        Efficiency,
        0.22,
        "k8s.utilization",
        &["nodes", "pods", "binpack_efficiency", "pending_pods_p95"],
    ),
    entry("score_db_utilization", Efficiency, 0.18, "db.utilization", &["databases"]),
    entry(
        "score_storage_efficiency",
        Efficiency,
        0.18,
        "storage.efficiency",
        &["block_volumes", "snapshots", "objects"],
    ),
    entry("score_lb_performance", Reliability, 0.40, "lb.performance", &["load_balancers", "slo"]),
    entry(
        "score_availability_incidents",
        Reliability,
        0.60,
        "availability.incidents",
        &["incidents", "slo_breaches"],
    ),
    entry("score_commitment_coverage", Cost, 0.34, "cost.commit_coverage", &["commit_inventory", "usage"]),
    entry(
        "score_iac_coverage_drift",
        Governance,
        0.5,
        "iac.coverage_drift",
        &["inventory", "iac_index", "policy_findings"],
    ),
    entry("score_security_encryption", Security, 0.25, "security.encryption", &["resources"]),
    entry("score_security_iam", Security, 0.25, "security.iam_risk", &["users", "keys", "policies"]),
    entry(
        "score_security_public_exposure",
        Security,
        0.25,
        "security.public_exposure",
        &["network_policies", "storage_acls", "inventory"],
    ),
    entry("score_security_vuln_patch", Security, 0.25, "security.vuln_patch", &["findings", "patch_status"]),
    with_deps(
        entry("score_cost_allocation_quality", Cost, 0.33, "cost.allocation_quality", &["cost_rows"]),
        &["score_tagging_coverage"],
    ),
    with_deps(
        entry(
            "score_cost_idle_underutilized",
            Cost,
            0.33,
            "cost.idle_underutilized",
            &["cost_rows", "instances"],
        ),
        &["score_compute_utilization", "score_k8s_utilization"],
    ),
    with_deps(
        entry(
            "score_autoscaling_effectiveness",
            Efficiency,
            0.20,
            "scaling.effectiveness",
            &["ts_metrics", "scale_events"],
        ),
        &["score_compute_utilization"],
    ),
];

/// Sample file name for a backbone key: `tagging.coverage` -> `tagging_coverage.json`.
pub fn sample_file_for(backbone_key: &str) -> String {
    format!("{}.json", backbone_key.replace('.', "_"))
}

/// Definitions for every builtin metric, in registration order.
pub fn builtin_definitions() -> ConfigResult<Vec<MetricDefinition>> {
    CATALOG
        .iter()
        .map(|e| {
            let input = InputDescriptor::new(e.backbone_key, sample_file_for(e.backbone_key))
                .with_required_keys(e.required_keys.iter().copied());
            Ok(MetricDefinition::new(e.id, e.category, e.weight, input)?
                .depends_on(e.depends_on.iter().copied()))
        })
        .collect()
}

/// A validated registry holding the builtin catalog.
pub fn builtin_registry() -> ConfigResult<MetricRegistry> {
    let mut registry = MetricRegistry::new();
    for definition in builtin_definitions()? {
        registry.register(definition)?;
    }
    registry.validate()?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::MetricId;
    use std::collections::BTreeMap;

    #[test]
    fn test_catalog_is_valid_and_complete() {
        let reg = builtin_registry().unwrap();
        assert_eq!(reg.len(), 16);
    }

    #[test]
    fn test_category_weights_sum_to_one() {
        let reg = builtin_registry().unwrap();
        let mut sums: BTreeMap<Category, f64> = BTreeMap::new();
        for d in reg.definitions() {
            *sums.entry(d.category).or_default() += d.weight;
        }
        for (category, sum) in sums {
            assert!((sum - 1.0).abs() < 1e-9, "{category}: {sum}");
        }
    }

    #[test]
    fn test_sample_file_names_follow_backbone_keys() {
        let reg = builtin_registry().unwrap();
        let iam = reg.get(&MetricId::from("score_security_iam")).unwrap();
        assert_eq!(iam.input.backbone_key, "security.iam_risk");
        assert_eq!(iam.input.sample_file, "security_iam_risk.json");
    }

    #[test]
    fn test_cost_idle_waits_on_two_utilisation_metrics() {
        let reg = builtin_registry().unwrap();
        let idle = reg.get(&MetricId::from("score_cost_idle_underutilized")).unwrap();
        let deps: Vec<&str> = idle.depends_on.iter().map(MetricId::as_str).collect();
        assert_eq!(deps, vec!["score_compute_utilization", "score_k8s_utilization"]);
    }
}
