//! The evaluation capability seam.
//!
//! The engine treats scoring as an opaque, possibly slow and possibly
//! unreliable call. Implementations live elsewhere: [`crate::rules`] scores a
//! subset of metrics deterministically, `infrascore-llm` asks a model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::Document;
use crate::error::{EvaluationError, EvaluationResult};
use crate::metric::MetricDefinition;

/// Integer score in `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Score(u8);

impl Score {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: i64) -> EvaluationResult<Self> {
        if (Self::MIN as i64..=Self::MAX as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(EvaluationError::ScoreOutOfRange { score: value })
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Score {
    type Error = EvaluationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> Self {
        score.0
    }
}

/// A successful evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub score: Score,
    pub rationale: String,
    /// Backend-specific supporting data, carried through to the report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl Evaluation {
    pub fn new(score: Score, rationale: impl Into<String>) -> Self {
        Self {
            score,
            rationale: rationale.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Validate a backend's raw JSON output.
    ///
    /// Requires an integer `score` in range and a string `rationale`. A
    /// `details` value, when present, must be an object.
    pub fn from_response(value: Value) -> EvaluationResult<Self> {
        let Value::Object(mut obj) = value else {
            return Err(EvaluationError::MalformedResponse(
                "response is not a JSON object".to_string(),
            ));
        };

        let score = match obj.get("score") {
            Some(Value::Number(n)) => n.as_i64().ok_or_else(|| {
                EvaluationError::MalformedResponse(format!("score is not an integer: {n}"))
            })?,
            Some(other) => {
                return Err(EvaluationError::MalformedResponse(format!(
                    "score is not an integer: {other}"
                )))
            }
            None => {
                return Err(EvaluationError::MalformedResponse(
                    "missing field: score".to_string(),
                ))
            }
        };
        let score = Score::new(score)?;

        let rationale = match obj.remove("rationale") {
            Some(Value::String(s)) => s,
            Some(_) => {
                return Err(EvaluationError::MalformedResponse(
                    "rationale is not a string".to_string(),
                ))
            }
            None => {
                return Err(EvaluationError::MalformedResponse(
                    "missing field: rationale".to_string(),
                ))
            }
        };

        let details = match obj.remove("details") {
            None | Some(Value::Null) => None,
            Some(d @ Value::Object(_)) => Some(d),
            Some(_) => {
                return Err(EvaluationError::MalformedResponse(
                    "details is not an object".to_string(),
                ))
            }
        };

        Ok(Self {
            score,
            rationale,
            details,
        })
    }
}

/// Opaque scoring capability invoked once per metric.
#[async_trait]
pub trait Evaluator: Send + Sync {
    /// Score `metric` against its resolved input.
    async fn evaluate(
        &self,
        metric: &MetricDefinition,
        input: &Document,
    ) -> EvaluationResult<Evaluation>;

    /// Short backend name for logs and reports.
    fn name(&self) -> &str {
        "custom"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_score_bounds() {
        assert!(Score::new(0).is_err());
        assert_eq!(Score::new(1).unwrap().get(), 1);
        assert_eq!(Score::new(5).unwrap().get(), 5);
        assert_eq!(
            Score::new(6).unwrap_err(),
            EvaluationError::ScoreOutOfRange { score: 6 }
        );
    }

    #[test]
    fn test_score_serde_rejects_out_of_range() {
        assert!(serde_json::from_value::<Score>(json!(9)).is_err());
        assert_eq!(serde_json::to_value(Score::new(3).unwrap()).unwrap(), json!(3));
    }

    #[test]
    fn test_from_response_accepts_valid_object() {
        let eval = Evaluation::from_response(json!({
            "metric_id": "tagging.coverage",
            "score": 4,
            "rationale": "88% of resources carry every required tag",
            "details": {"coverage_pct": 88.0}
        }))
        .unwrap();
        assert_eq!(eval.score.get(), 4);
        assert_eq!(eval.details.unwrap()["coverage_pct"], json!(88.0));
    }

    #[test]
    fn test_from_response_rejects_bad_shapes() {
        let cases = [
            json!([1]),
            json!({"rationale": "x"}),
            json!({"score": "4", "rationale": "x"}),
            json!({"score": 3.5, "rationale": "x"}),
            json!({"score": 3}),
            json!({"score": 3, "rationale": "x", "details": [1]}),
        ];
        for case in cases {
            let err = Evaluation::from_response(case.clone()).unwrap_err();
            assert!(
                matches!(err, EvaluationError::MalformedResponse(_)),
                "{case}: {err:?}"
            );
        }
    }

    #[test]
    fn test_from_response_rejects_out_of_range_score() {
        let err = Evaluation::from_response(json!({"score": 7, "rationale": "x"})).unwrap_err();
        assert_eq!(err, EvaluationError::ScoreOutOfRange { score: 7 });
    }
}
