//! Weighted roll-up of per-metric scores.
//!
//! Only scored metrics contribute. Within any scope (one category, or the
//! whole run) the included weights are renormalised to sum to 1, so failed
//! metrics drop out without dragging the score toward zero.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::WeightingScheme;
use crate::metric::{Category, MetricId};
use crate::report::MetricResult;

/// One scored metric's contribution to its category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedScore {
    pub metric: MetricId,
    /// Weight after renormalisation within the category.
    pub weight: f64,
    pub score: u8,
}

/// Aggregate scores for a run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Summary {
    /// `null` when nothing scored.
    pub overall_score: Option<f64>,
    /// Categories with zero scored metrics are omitted.
    pub category_scores: BTreeMap<Category, f64>,
    pub scored_metrics: usize,
    pub total_metrics: usize,
    #[serde(default)]
    pub breakdown: BTreeMap<Category, Vec<WeightedScore>>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl Summary {
    /// SHA-256 over the canonical JSON encoding, hex encoded.
    ///
    /// Two runs over the same inputs with a deterministic evaluator produce
    /// the same digest.
    pub fn digest(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }
}

/// Folds a result mapping into a [`Summary`].
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    scheme: WeightingScheme,
}

impl Aggregator {
    pub fn new(scheme: WeightingScheme) -> Self {
        Self { scheme }
    }

    pub fn scheme(&self) -> &WeightingScheme {
        &self.scheme
    }

    pub fn aggregate(&self, results: &BTreeMap<MetricId, MetricResult>) -> Summary {
        let mut warnings = Vec::new();
        let mut by_category: BTreeMap<Category, Vec<(&MetricId, f64, u8)>> = BTreeMap::new();
        let mut present: BTreeSet<Category> = BTreeSet::new();

        for (id, result) in results {
            present.insert(result.category);
            if let (true, Some(score)) = (result.is_scored(), result.score) {
                by_category
                    .entry(result.category)
                    .or_default()
                    .push((id, result.weight, score));
            }
        }

        let mut category_scores = BTreeMap::new();
        let mut breakdown = BTreeMap::new();
        for (category, entries) in &by_category {
            let pairs: Vec<(f64, u8)> = entries.iter().map(|(_, w, s)| (*w, *s)).collect();
            if let Some(score) = weighted_mean(&pairs) {
                category_scores.insert(*category, score);
            }
            let total: f64 = pairs.iter().map(|(w, _)| w).sum();
            breakdown.insert(
                *category,
                entries
                    .iter()
                    .map(|(id, w, s)| WeightedScore {
                        metric: (*id).clone(),
                        weight: w / total,
                        score: *s,
                    })
                    .collect(),
            );
        }

        for category in &present {
            if !category_scores.contains_key(category) {
                warnings.push(format!("category {category} has no scored metrics"));
            }
        }

        let scored_metrics = by_category.values().map(Vec::len).sum();

        let overall_score = match &self.scheme {
            WeightingScheme::MetricWeighted => {
                let pairs: Vec<(f64, u8)> = by_category
                    .values()
                    .flatten()
                    .map(|(_, w, s)| (*w, *s))
                    .collect();
                weighted_mean(&pairs)
            }
            WeightingScheme::CategoryWeighted { category_weights } => {
                let (sum, total) = category_scores
                    .iter()
                    .filter_map(|(c, score)| category_weights.get(c).map(|w| (w * score, *w)))
                    .fold((0.0, 0.0), |(s, t), (ws, w)| (s + ws, t + w));
                (total > 0.0).then(|| sum / total)
            }
        };

        if overall_score.is_none() {
            warnings.push(if scored_metrics == 0 {
                "no metrics scored; overall score is undefined".to_string()
            } else {
                "no weighted category produced a score; overall score is undefined".to_string()
            });
        }

        Summary {
            overall_score,
            category_scores,
            scored_metrics,
            total_metrics: results.len(),
            breakdown,
            warnings,
        }
    }
}

/// Σ(w·s) / Σw, or `None` when nothing carries weight.
fn weighted_mean(pairs: &[(f64, u8)]) -> Option<f64> {
    let total: f64 = pairs.iter().map(|(w, _)| w).sum();
    if total <= 0.0 {
        return None;
    }
    let sum: f64 = pairs.iter().map(|(w, s)| w * f64::from(*s)).sum();
    Some(sum / total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvaluationError;
    use crate::evaluator::{Evaluation, Score};
    use crate::input::InputSource;
    use crate::metric::{InputDescriptor, MetricDefinition};

    fn def(id: &str, category: Category, weight: f64) -> MetricDefinition {
        MetricDefinition::new(id, category, weight, InputDescriptor::new(id, "x.json")).unwrap()
    }

    fn ok(id: &str, category: Category, weight: f64, score: i64) -> (MetricId, MetricResult) {
        let d = def(id, category, weight);
        let eval = Evaluation::new(Score::new(score).unwrap(), "ok");
        (d.id.clone(), MetricResult::scored(&d, weight, InputSource::Params, eval))
    }

    fn failed(id: &str, category: Category, weight: f64) -> (MetricId, MetricResult) {
        let d = def(id, category, weight);
        (
            d.id.clone(),
            MetricResult::failed(&d, weight, None, EvaluationError::Cancelled.into()),
        )
    }

    #[test]
    fn test_category_weighted_mean_is_exact() {
        let results = BTreeMap::from([
            ok("a", Category::Reliability, 0.6, 4),
            ok("b", Category::Reliability, 0.4, 2),
        ]);
        let summary = Aggregator::default().aggregate(&results);
        assert_eq!(summary.category_scores[&Category::Reliability], 3.2);
        assert_eq!(summary.overall_score, Some(3.2));
    }

    #[test]
    fn test_failed_metric_weight_is_renormalised_away() {
        let results = BTreeMap::from([
            ok("a", Category::Security, 0.25, 4),
            ok("b", Category::Security, 0.25, 2),
            failed("c", Category::Security, 0.5),
        ]);
        let summary = Aggregator::default().aggregate(&results);
        assert_eq!(summary.category_scores[&Category::Security], 3.0);
        assert_eq!(summary.scored_metrics, 2);
        assert_eq!(summary.total_metrics, 3);
        let weights: f64 = summary.breakdown[&Category::Security]
            .iter()
            .map(|w| w.weight)
            .sum();
        assert!((weights - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_category_with_no_successes_is_omitted_with_warning() {
        let results = BTreeMap::from([ok("a", Category::Cost, 1.0, 5), failed("b", Category::Security, 1.0)]);
        let summary = Aggregator::default().aggregate(&results);
        assert!(!summary.category_scores.contains_key(&Category::Security));
        assert_eq!(summary.overall_score, Some(5.0));
        assert!(summary.warnings.iter().any(|w| w.contains("security")));
    }

    #[test]
    fn test_nothing_scored_gives_null_overall() {
        let results = BTreeMap::from([failed("a", Category::Cost, 1.0)]);
        let summary = Aggregator::default().aggregate(&results);
        assert_eq!(summary.overall_score, None);
        assert!(summary.category_scores.is_empty());
        let v = serde_json::to_value(&summary).unwrap();
        assert!(v["overall_score"].is_null());
        assert!(summary.warnings.iter().any(|w| w.contains("undefined")));
    }

    #[test]
    fn test_category_weighted_scheme_ignores_unweighted_categories() {
        let results = BTreeMap::from([
            ok("a", Category::Cost, 1.0, 4),
            ok("b", Category::Security, 1.0, 2),
            ok("c", Category::Governance, 1.0, 1),
        ]);
        let scheme = WeightingScheme::CategoryWeighted {
            category_weights: BTreeMap::from([(Category::Cost, 0.5), (Category::Security, 0.5)]),
        };
        let summary = Aggregator::new(scheme).aggregate(&results);
        assert_eq!(summary.overall_score, Some(3.0));
        assert_eq!(summary.category_scores[&Category::Governance], 1.0);
    }

    #[test]
    fn test_digest_is_stable() {
        let results = BTreeMap::from([ok("a", Category::Cost, 1.0, 4), failed("b", Category::Cost, 1.0)]);
        let a = Aggregator::default().aggregate(&results);
        let b = Aggregator::default().aggregate(&results.clone());
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 64);
    }
}
