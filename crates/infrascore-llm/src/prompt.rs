//! Per-metric rubric prompts.
//!
//! A prompt has a system part (assessor role plus scoring rubric) and a user
//! part with a worked example, the meaning of each input key, the task input
//! and the required response shape.

use serde::Serialize;

use crate::error::{LlmError, LlmResult};

/// Static prompt material for one backbone key.
#[derive(Debug, Clone, Copy)]
pub struct Rubric {
    pub key: &'static str,
    pub system: &'static str,
    pub example_input: &'static str,
    pub example_output: &'static str,
    /// Shape of the `details` object the model should return.
    pub details_format: &'static str,
    pub key_meanings: &'static [(&'static str, &'static str)],
}

/// A rendered prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

pub const RUBRICS: [Rubric; 16] = [
    Rubric {
        key: "tagging.coverage",
        system: "You are a cloud FinOps assessor. Score tagging coverage from 1 to 5 (5 is best).\n\n\
RUBRIC:\n\
- 5: at least 95% of resources carry ALL required tags\n\
- 4: 85-94%\n\
- 3: 70-84%\n\
- 2: 50-69%\n\
- 1: below 50%\n\
Lower the score when key tags such as env or owner are missing even if the percentage is high.",
        example_input: r#"{"resources":[{"id":"x","tags":{"env":"prod","owner":"team","cost-center":"CC1","service":"api"}},{"id":"y","tags":{"env":"prod","owner":"team"}}],"required_tags":["env","owner","cost-center","service"]}"#,
        example_output: r#"{"metric_id":"tagging.coverage","score":2,"rationale":"Half of the resources are fully tagged; y lacks cost-center and service.","details":{"coverage_pct":0.5,"missing_examples":[{"id":"y","missing":["cost-center","service"]}]}}"#,
        details_format: r#"{"coverage_pct":<0..1>,"missing_examples":[...]}"#,
        key_meanings: &[
            ("resources", "resources to evaluate"),
            ("resources[].id", "resource identifier"),
            ("resources[].tags", "key/value tags on the resource"),
            ("required_tags", "tag keys required for full coverage"),
        ],
    },
    Rubric {
        key: "compute.utilization",
        system: "You assess reliability and cost efficiency. Score how well compute capacity is used.\n\n\
RUBRIC:\n\
- 5: fleet p95 CPU/memory within 40-70%, under 10% low-utilisation instances\n\
- 4: mostly healthy, 10-20% low-utilisation outliers\n\
- 3: mixed, 20-35% low-utilisation or frequent skew\n\
- 2: significant waste, 35-50% low-utilisation\n\
- 1: largely idle or badly overprovisioned, over 50% low-utilisation",
        example_input: r#"{"instances":[{"id":"a","cpu_p95":0.55,"mem_p95":0.51,"low_util_hours_30d":0},{"id":"b","cpu_p95":0.1,"mem_p95":0.09,"low_util_hours_30d":200}]}"#,
        example_output: r#"{"metric_id":"compute.utilization","score":2,"rationale":"Half the fleet is persistently idle.","details":{"low_util_count":1,"fleet_cpu_p95":0.325,"fleet_mem_p95":0.3}}"#,
        details_format: r#"{"low_util_count":<int>,"fleet_cpu_p95":<0..1>,"fleet_mem_p95":<0..1>}"#,
        key_meanings: &[
            ("instances", "compute instances"),
            ("instances[].cpu_p95", "95th percentile CPU utilisation (0..1)"),
            ("instances[].mem_p95", "95th percentile memory utilisation (0..1)"),
            ("instances[].low_util_hours_30d", "hours below the low-utilisation threshold in the last 30 days"),
        ],
    },
    Rubric {
        key: "k8s.utilization",
        system: "Score Kubernetes capacity efficiency and scheduling.\n\n\
RUBRIC:\n\
- 5: node CPU/memory p95 around 60-80%, requested vs used 0.7-0.9, binpack at least 0.8, few pending pods\n\
- 4: minor headroom waste, binpack at least 0.7\n\
- 3: mixed signals, binpack 0.6-0.7 or intermittent pending spikes\n\
- 2: common over- or under-requesting, binpack below 0.6\n\
- 1: chronic mismatch, many pending pods or extreme overprovisioning",
        example_input: r#"{"nodes":{"cpu_p95":0.6,"mem_p95":0.58},"pods":{"cpu_req_vs_used":0.8},"binpack_efficiency":0.82,"pending_pods_p95":1}"#,
        example_output: r#"{"metric_id":"k8s.utilization","score":5,"rationale":"Requests match usage and packing is efficient.","details":{"binpack_efficiency":0.82,"pending_pods_p95":1}}"#,
        details_format: r#"{"binpack_efficiency":<0..1>,"pending_pods_p95":<int>}"#,
        key_meanings: &[
            ("nodes.cpu_p95", "aggregate node CPU p95 (0..1)"),
            ("nodes.mem_p95", "aggregate node memory p95 (0..1)"),
            ("pods.cpu_req_vs_used", "ratio of requested to used CPU"),
            ("binpack_efficiency", "packing efficiency (0..1)"),
            ("pending_pods_p95", "95th percentile pending pod count"),
        ],
    },
    Rubric {
        key: "scaling.effectiveness",
        system: "Evaluate autoscaling health: reaction time, target adherence and thrash.\n\n\
RUBRIC:\n\
- 5: reacts within 1-2 minutes, minimal target violations, no thrash\n\
- 4: reacts within 5 minutes, rare violations\n\
- 3: noticeable delays or occasional thrash\n\
- 2: slow (over 10 minutes) or frequent oscillation\n\
- 1: chronically late or incorrect scaling",
        example_input: r#"{"ts_metrics":[{"ts":"2025-01-01T10:00:00Z","target_cpu":0.6,"actual_cpu":0.85}],"scale_events":[{"ts":"2025-01-01T10:03:00Z","action":"scale_out","delta":2}]}"#,
        example_output: r#"{"metric_id":"scaling.effectiveness","score":4,"rationale":"Scale-out followed the breach within three minutes.","details":{"median_reaction_s":180,"target_violation_pct":0.1,"thrash_rate":0.0}}"#,
        details_format: r#"{"median_reaction_s":<number>,"target_violation_pct":<0..1>,"thrash_rate":<0..1>}"#,
        key_meanings: &[
            ("ts_metrics", "time series of target vs actual utilisation"),
            ("ts_metrics[].target_cpu", "autoscaler CPU target (0..1)"),
            ("ts_metrics[].actual_cpu", "observed CPU (0..1)"),
            ("scale_events", "autoscaler actions"),
            ("scale_events[].action", "scale_out or scale_in"),
            ("scale_events[].delta", "capacity change"),
        ],
    },
    Rubric {
        key: "db.utilization",
        system: "Score database fleet efficiency and risk: hotspots versus idle waste.\n\n\
RUBRIC:\n\
- 5: most databases at 40-70% CPU, healthy IOPS, capacity aligned\n\
- 4: minor outliers\n\
- 3: a mix of idle and hot instances\n\
- 2: many idle or several saturated\n\
- 1: widespread saturation or waste",
        example_input: r#"{"databases":[{"id":"a","cpu_p95":0.6,"connections_p95":0.5},{"id":"b","cpu_p95":0.1,"connections_p95":0.1}]}"#,
        example_output: r#"{"metric_id":"db.utilization","score":3,"rationale":"One healthy, one idle; uneven sizing.","details":{"low_util_count":1,"high_util_count":0}}"#,
        details_format: r#"{"low_util_count":<int>,"high_util_count":<int>}"#,
        key_meanings: &[
            ("databases", "database instances"),
            ("databases[].cpu_p95", "95th percentile CPU (0..1)"),
            ("databases[].connections_p95", "95th percentile connection load (0..1)"),
        ],
    },
    Rubric {
        key: "lb.performance",
        system: "Score load balancer health against the supplied SLOs (latency and 5xx).\n\n\
RUBRIC:\n\
- 5: p95/p99 well under SLO, 5xx rare, minimal unhealthy time\n\
- 4: near SLO with small spikes\n\
- 3: periodic breaches\n\
- 2: frequent breaches or elevated 5xx\n\
- 1: chronic SLO failure",
        example_input: r#"{"load_balancers":[{"id":"lb-1","lat_p95":180,"lat_p99":400,"r5xx":0.002,"unhealthy_minutes":3}],"slo":{"p95_ms":200,"p99_ms":500,"5xx_rate_max":0.01}}"#,
        example_output: r#"{"metric_id":"lb.performance","score":4,"rationale":"Latency within SLO with little headroom.","details":{"breaches":0,"worst_lb":"lb-1"}}"#,
        details_format: r#"{"breaches":<int>,"worst_lb":"<id>"}"#,
        key_meanings: &[
            ("load_balancers", "load balancers"),
            ("load_balancers[].lat_p95", "p95 latency in ms"),
            ("load_balancers[].lat_p99", "p99 latency in ms"),
            ("load_balancers[].r5xx", "5xx response rate (0..1)"),
            ("load_balancers[].unhealthy_minutes", "minutes with unhealthy targets"),
            ("slo", "latency and error-rate objectives"),
        ],
    },
    Rubric {
        key: "storage.efficiency",
        system: "Score storage efficiency: unattached disks, orphaned snapshots and stale objects in hot tiers.\n\n\
RUBRIC:\n\
- 5: no obvious waste\n\
- 4: minor waste\n\
- 3: noticeable but not severe\n\
- 2: significant avoidable cost\n\
- 1: systemic waste",
        example_input: r#"{"block_volumes":[{"id":"v1","attached":false}],"snapshots":[{"id":"s1","source_volume":null}],"objects":[{"storage_class":"STANDARD","last_modified":"2023-01-01"}]}"#,
        example_output: r#"{"metric_id":"storage.efficiency","score":3,"rationale":"One unattached volume and an orphaned snapshot.","details":{"unattached":1,"orphaned_snaps":1,"hot_stale_objects":1}}"#,
        details_format: r#"{"unattached":<int>,"orphaned_snaps":<int>,"hot_stale_objects":<int>}"#,
        key_meanings: &[
            ("block_volumes[].attached", "whether the volume is attached"),
            ("snapshots[].source_volume", "volume the snapshot came from, null if deleted"),
            ("objects[].storage_class", "storage tier"),
            ("objects[].last_modified", "last modification date"),
        ],
    },
    Rubric {
        key: "iac.coverage_drift",
        system: "Score infrastructure-as-code adoption and policy drift severity.\n\n\
RUBRIC:\n\
- 5: at least 90% IaC-managed, no high or critical drift\n\
- 4: 75-89%, few high drifts\n\
- 3: 50-74% or some high drifts\n\
- 2: 25-49% or multiple high/critical drifts\n\
- 1: below 25% or widespread critical drift",
        example_input: r#"{"inventory":[{"id":"a"},{"id":"b"}],"iac_index":["a"],"policy_findings":[{"severity":"high"}]}"#,
        example_output: r#"{"metric_id":"iac.coverage_drift","score":3,"rationale":"Half the estate is managed and one high finding is open.","details":{"coverage_pct":0.5,"high_critical":1}}"#,
        details_format: r#"{"coverage_pct":<0..1>,"high_critical":<int>}"#,
        key_meanings: &[
            ("inventory", "deployed resources"),
            ("iac_index", "resource ids managed by IaC"),
            ("policy_findings[].severity", "drift finding severity"),
        ],
    },
    Rubric {
        key: "availability.incidents",
        system: "Score reliability from Sev1/2 incident count, MTTR and SLO breach hours over the last 30 days.\n\n\
RUBRIC:\n\
- 5: no Sev1/2, MTTR under 1h, no SLO breaches\n\
- 4: at most one Sev2, MTTR 1-2h, minor breach\n\
- 3: some incidents, MTTR 2-4h, breaches present\n\
- 2: frequent incidents or MTTR 4-8h\n\
- 1: severe or frequent incidents, MTTR over 8h",
        example_input: r#"{"incidents":[{"sev":2,"opened":"2025-01-02T10:00:00Z","resolved":"2025-01-02T11:30:00Z"}],"slo_breaches":[{"hours":0.5}]}"#,
        example_output: r#"{"metric_id":"availability.incidents","score":4,"rationale":"One Sev2 resolved in 90 minutes.","details":{"sev12_30d":1,"mttr_h":1.5,"slo_breach_hours":0.5}}"#,
        details_format: r#"{"sev12_30d":<int>,"mttr_h":<number>,"slo_breach_hours":<number>}"#,
        key_meanings: &[
            ("incidents[].sev", "severity, 1 is highest"),
            ("incidents[].opened", "open timestamp"),
            ("incidents[].resolved", "resolution timestamp"),
            ("slo_breaches[].hours", "hours in breach"),
        ],
    },
    Rubric {
        key: "cost.idle_underutilized",
        system: "Estimate spend on idle or underused compute and score cost hygiene.\n\n\
RUBRIC:\n\
- 5: idle cost below 2% of total\n\
- 4: 2-5%\n\
- 3: 5-10%\n\
- 2: 10-20%\n\
- 1: over 20%",
        example_input: r#"{"cost_rows":[{"resource_id":"a","cost":100},{"resource_id":"b","cost":100}],"instances":[{"id":"a","cpu_p95":0.5,"mem_p95":0.5},{"id":"b","cpu_p95":0.05,"mem_p95":0.04}]}"#,
        example_output: r#"{"metric_id":"cost.idle_underutilized","score":1,"rationale":"Half of compute spend is on an idle instance.","details":{"idle_cost_usd":100,"idle_pct":0.5}}"#,
        details_format: r#"{"idle_cost_usd":<number>,"idle_pct":<0..1>}"#,
        key_meanings: &[
            ("cost_rows[].resource_id", "resource the cost belongs to"),
            ("cost_rows[].cost", "cost amount"),
            ("instances[].cpu_p95", "95th percentile CPU (0..1)"),
            ("instances[].mem_p95", "95th percentile memory (0..1)"),
        ],
    },
    Rubric {
        key: "cost.commit_coverage",
        system: "Score commitment coverage against usage and realised savings.\n\n\
RUBRIC:\n\
- 5: at least 90% coverage with high realised savings\n\
- 4: 75-89%\n\
- 3: 50-74%\n\
- 2: 25-49% or notable waste\n\
- 1: below 25% or large unused commitments",
        example_input: r#"{"commit_inventory":[{"commit_usd_hour":10}],"usage":[{"used_usd_hour":12,"hours":720}]}"#,
        example_output: r#"{"metric_id":"cost.commit_coverage","score":4,"rationale":"Commitments cover about 83% of steady usage.","details":{"coverage_pct":0.83,"realized_savings_usd":2100,"waste_usd":0}}"#,
        details_format: r#"{"coverage_pct":<0..1>,"realized_savings_usd":<number>,"waste_usd":<number>}"#,
        key_meanings: &[
            ("commit_inventory[].commit_usd_hour", "committed spend per hour"),
            ("usage[].used_usd_hour", "on-demand equivalent usage per hour"),
            ("usage[].hours", "hours in the period"),
        ],
    },
    Rubric {
        key: "cost.allocation_quality",
        system: "Score how much spend is attributable through tags, labels or resource ids.\n\n\
RUBRIC (cost-weighted attribution):\n\
- 5: at least 95%\n\
- 4: 90-94%\n\
- 3: 75-89%\n\
- 2: 50-74%\n\
- 1: below 50%",
        example_input: r#"{"cost_rows":[{"cost":100,"tags":{"env":"prod"}},{"cost":100,"tags":{}}]}"#,
        example_output: r#"{"metric_id":"cost.allocation_quality","score":2,"rationale":"Half of spend is attributable.","details":{"attributable_pct":0.5}}"#,
        details_format: r#"{"attributable_pct":<0..1>}"#,
        key_meanings: &[
            ("cost_rows", "cost line items"),
            ("cost_rows[].cost", "cost amount"),
            ("cost_rows[].tags", "tags used for attribution"),
        ],
    },
    Rubric {
        key: "security.public_exposure",
        system: "Score exposure risk from open ingress and public storage.\n\n\
RUBRIC:\n\
- 5: no public buckets, no 0.0.0.0/0 on sensitive ports, minimal public IPs\n\
- 4: minor issues in non-production only\n\
- 3: some risky rules or public buckets\n\
- 2: multiple risky exposures\n\
- 1: systemic exposure in production",
        example_input: r#"{"network_policies":[{"rule":"0.0.0.0/0:22"}],"storage_acls":[{"public":true}],"inventory":[{"public_ip":true}]}"#,
        example_output: r#"{"metric_id":"security.public_exposure","score":2,"rationale":"Public SSH and a public bucket.","details":{"open_fw_rules":1,"public_buckets":1,"public_ips":1}}"#,
        details_format: r#"{"open_fw_rules":<int>,"public_buckets":<int>,"public_ips":<int>}"#,
        key_meanings: &[
            ("network_policies[].rule", "CIDR and port expression"),
            ("storage_acls[].public", "publicly readable or listable"),
            ("inventory[].public_ip", "has a public IP"),
        ],
    },
    Rubric {
        key: "security.encryption",
        system: "Score encryption at rest and modern TLS adoption.\n\n\
RUBRIC:\n\
- 5: at least 98% encrypted and every load balancer on TLS 1.2+\n\
- 4: at least 95% encrypted, minor TLS gaps\n\
- 3: 85-94% or some legacy TLS\n\
- 2: 70-84% or several legacy endpoints\n\
- 1: below 70% or widespread legacy TLS",
        example_input: r#"{"resources":[{"encrypted_at_rest":true},{"encrypted_at_rest":false},{"type":"load_balancer","tls_policy":"TLS1.0"}]}"#,
        example_output: r#"{"metric_id":"security.encryption","score":1,"rationale":"Half of storage unencrypted and TLS 1.0 still served.","details":{"at_rest_pct":0.5,"legacy_tls_endpoints":1}}"#,
        details_format: r#"{"at_rest_pct":<0..1>,"legacy_tls_endpoints":<int>}"#,
        key_meanings: &[
            ("resources[].encrypted_at_rest", "encrypted at rest"),
            ("resources[].type", "resource type, e.g. load_balancer"),
            ("resources[].tls_policy", "enforced TLS policy version"),
        ],
    },
    Rubric {
        key: "security.iam_risk",
        system: "Score IAM hygiene: MFA, key age and permissive policies.\n\n\
RUBRIC:\n\
- 5: every user has MFA, no keys older than 90 days, no wildcard admin\n\
- 4: minor exceptions in non-production\n\
- 3: some exceptions\n\
- 2: many exceptions\n\
- 1: systemic issues such as missing MFA and broad wildcards",
        example_input: r#"{"users":[{"mfa_enabled":false}],"keys":[{"age_days":120}],"policies":[{"actions":["*"],"resources":["*"]}]}"#,
        example_output: r#"{"metric_id":"security.iam_risk","score":2,"rationale":"A user without MFA and a wildcard admin policy.","details":{"users_without_mfa":1,"old_keys":1,"overly_permissive_principals":1}}"#,
        details_format: r#"{"users_without_mfa":<int>,"old_keys":<int>,"overly_permissive_principals":<int>}"#,
        key_meanings: &[
            ("users[].mfa_enabled", "MFA enabled"),
            ("keys[].age_days", "access key age in days"),
            ("policies[].actions", "allowed actions, may contain *"),
            ("policies[].resources", "covered resources, may contain *"),
        ],
    },
    Rubric {
        key: "security.vuln_patch",
        system: "Score vulnerability and patch hygiene.\n\n\
RUBRIC:\n\
- 5: no open criticals, agent coverage at least 95%, mean patch age under 14 days\n\
- 4: few highs, coverage at least 90%, patch age under 21 days\n\
- 3: some criticals or patch age 21-35 days\n\
- 2: multiple criticals, coverage below 85% or patch age 35-60 days\n\
- 1: chronic exposure, coverage below 70% or patch age over 60 days",
        example_input: r#"{"findings":[{"severity":"critical","resolved":false}],"patch_status":{"agent_coverage_pct":0.92,"avg_patch_age_days":25}}"#,
        example_output: r#"{"metric_id":"security.vuln_patch","score":3,"rationale":"One open critical and patches 25 days old on average.","details":{"critical_open":1,"agent_coverage_pct":0.92,"avg_patch_age_days":25}}"#,
        details_format: r#"{"critical_open":<int>,"agent_coverage_pct":<0..1>,"avg_patch_age_days":<int>}"#,
        key_meanings: &[
            ("findings[].severity", "finding severity"),
            ("findings[].resolved", "whether the finding is closed"),
            ("patch_status.agent_coverage_pct", "share of hosts with a patch agent"),
            ("patch_status.avg_patch_age_days", "mean days since last patch"),
        ],
    },
];

pub fn rubric_for(key: &str) -> Option<&'static Rubric> {
    RUBRICS.iter().find(|r| r.key == key)
}

/// Render the prompt for `key` over `task_input`.
pub fn build_prompt<T>(key: &str, task_input: &T) -> LlmResult<Prompt>
where
    T: Serialize + ?Sized,
{
    let rubric = rubric_for(key).ok_or_else(|| LlmError::UnknownRubric(key.to_string()))?;

    let meanings = rubric
        .key_meanings
        .iter()
        .map(|(k, v)| format!("- {k}: {v}"))
        .collect::<Vec<_>>()
        .join("\n");
    let task = serde_json::to_string_pretty(task_input)
        .map_err(|e| LlmError::Parse(format!("task input: {e}")))?;

    let user = format!(
        "EXAMPLE INPUT:\n{}\n\n\
EXAMPLE OUTPUT:\n{}\n\n\
INPUT JSON KEYS AND MEANINGS:\n{meanings}\n\n\
TASK INPUT:\n{task}\n\n\
RESPONSE FORMAT (JSON only):\n\
{{\"metric_id\":\"{key}\",\"score\":<1-5>,\"rationale\":\"...\",\"details\":{}}}",
        rubric.example_input, rubric.example_output, rubric.details_format,
    );

    Ok(Prompt {
        system: rubric.system.to_string(),
        user,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_every_builtin_metric_has_a_rubric() {
        let defs = infrascore_core::builtin_definitions().unwrap();
        for d in defs {
            assert!(
                rubric_for(&d.input.backbone_key).is_some(),
                "missing rubric for {}",
                d.input.backbone_key
            );
        }
    }

    #[test]
    fn test_examples_are_valid_json() {
        for r in RUBRICS {
            let input: Value = serde_json::from_str(r.example_input).unwrap();
            let output: Value = serde_json::from_str(r.example_output).unwrap();
            assert!(input.is_object(), "{}", r.key);
            assert_eq!(output["metric_id"], json!(r.key));
            infrascore_core::Evaluation::from_response(output).unwrap();
        }
    }

    #[test]
    fn test_prompt_sections_in_order() {
        let p = build_prompt("db.utilization", &json!({"databases": [{"id": "q"}]})).unwrap();
        assert!(p.system.contains("RUBRIC"));
        let order = [
            "EXAMPLE INPUT:",
            "EXAMPLE OUTPUT:",
            "INPUT JSON KEYS AND MEANINGS:",
            "TASK INPUT:",
            "RESPONSE FORMAT (JSON only):",
        ];
        let positions: Vec<usize> = order.iter().map(|s| p.user.find(s).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(p.user.contains("\"id\": \"q\""));
        assert!(p.user.contains(r#""metric_id":"db.utilization""#));
    }

    #[test]
    fn test_unknown_key() {
        assert!(matches!(
            build_prompt("nope.metric", &json!({})),
            Err(LlmError::UnknownRubric(_))
        ));
    }
}
