use std::sync::Arc;

use async_trait::async_trait;
use infrascore_core::{
    Document, Evaluation, EvaluationError, EvaluationResult, Evaluator, MetricDefinition,
};
use serde_json::Value;
use tracing::debug;

use crate::client::ChatBackend;
use crate::parse::extract_json;
use crate::prompt::{build_prompt, rubric_for};

/// Scores metrics by prompting a chat model with the metric's rubric.
#[derive(Clone)]
pub struct LlmEvaluator {
    backend: Arc<dyn ChatBackend>,
}

impl LlmEvaluator {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Evaluator for LlmEvaluator {
    async fn evaluate(
        &self,
        metric: &MetricDefinition,
        input: &Document,
    ) -> EvaluationResult<Evaluation> {
        let key = metric.input.backbone_key.as_str();
        if rubric_for(key).is_none() {
            return Err(EvaluationError::Unsupported {
                metric: metric.id.to_string(),
            });
        }

        let prompt = build_prompt(key, input)?;
        let reply = self.backend.complete(&prompt.system, &prompt.user).await?;
        debug!(metric = %metric.id, reply_len = reply.len(), "model replied");

        let value = extract_json(&reply)?;
        match value.get("metric_id") {
            None | Some(Value::Null) => {}
            Some(Value::String(id)) if id == key || id == metric.id.as_str() => {}
            Some(other) => {
                return Err(EvaluationError::MalformedResponse(format!(
                    "reply is for metric {other}, expected {key}"
                )))
            }
        }

        Evaluation::from_response(value)
    }

    fn name(&self) -> &str {
        "llm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LlmError, LlmResult};
    use infrascore_core::{Category, InputDescriptor};
    use serde_json::json;
    use std::sync::Mutex;

    struct Canned {
        reply: LlmResult<String>,
        seen: Mutex<Vec<String>>,
    }

    impl Canned {
        fn ok(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatBackend for Canned {
        async fn complete(&self, _system: &str, user: &str) -> LlmResult<String> {
            self.seen.lock().unwrap().push(user.to_string());
            match &self.reply {
                Ok(r) => Ok(r.clone()),
                Err(_) => Err(LlmError::Status {
                    status: 503,
                    body: "unavailable".into(),
                }),
            }
        }
    }

    fn metric(key: &str) -> MetricDefinition {
        MetricDefinition::new(
            "score_db_utilization",
            Category::Efficiency,
            0.18,
            InputDescriptor::new(key, "db_utilization.json"),
        )
        .unwrap()
    }

    fn doc() -> Document {
        Document::from_value("score_db_utilization", json!({"databases": []})).unwrap()
    }

    #[tokio::test]
    async fn test_fenced_reply_is_scored() {
        let backend = Canned::ok(
            "```json\n{\"metric_id\":\"db.utilization\",\"score\":4,\"rationale\":\"fine\",\"details\":{\"low_util_count\":0}}\n```",
        );
        let eval = LlmEvaluator::new(backend.clone())
            .evaluate(&metric("db.utilization"), &doc())
            .await
            .unwrap();

        assert_eq!(eval.score.get(), 4);
        assert_eq!(eval.rationale, "fine");
        assert!(backend.seen.lock().unwrap()[0].contains("\"databases\""));
    }

    #[tokio::test]
    async fn test_mismatched_metric_id_is_malformed() {
        let backend = Canned::ok(r#"{"metric_id":"k8s.utilization","score":4,"rationale":"x"}"#);
        let err = LlmEvaluator::new(backend)
            .evaluate(&metric("db.utilization"), &doc())
            .await
            .unwrap_err();
        assert!(matches!(err, EvaluationError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_out_of_range_score_is_rejected() {
        let backend = Canned::ok(r#"{"score":9,"rationale":"x"}"#);
        let err = LlmEvaluator::new(backend)
            .evaluate(&metric("db.utilization"), &doc())
            .await
            .unwrap_err();
        assert!(matches!(err, EvaluationError::ScoreOutOfRange { score: 9 }));
    }

    #[tokio::test]
    async fn test_unknown_rubric_is_unsupported() {
        let backend = Canned::ok("{}");
        let err = LlmEvaluator::new(backend.clone())
            .evaluate(&metric("custom.thing"), &doc())
            .await
            .unwrap_err();
        assert!(matches!(err, EvaluationError::Unsupported { .. }));
        assert!(backend.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_backend_failure_maps_to_backend_error() {
        let backend = Arc::new(Canned {
            reply: Err(LlmError::EmptyReply),
            seen: Mutex::new(Vec::new()),
        });
        let err = LlmEvaluator::new(backend)
            .evaluate(&metric("db.utilization"), &doc())
            .await
            .unwrap_err();
        assert!(matches!(err, EvaluationError::Backend(ref m) if m.contains("503")));
    }

    #[tokio::test]
    async fn test_prose_reply_is_malformed() {
        let backend = Canned::ok("I cannot score this.");
        let err = LlmEvaluator::new(backend)
            .evaluate(&metric("db.utilization"), &doc())
            .await
            .unwrap_err();
        assert!(matches!(err, EvaluationError::MalformedResponse(_)));
    }
}
