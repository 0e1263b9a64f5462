//! Input resolution: direct params > named sample set > default sample set.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::MetricOverride;
use crate::document::Document;
use crate::error::InputResult;
use crate::metric::{MetricDefinition, MetricId};
use crate::sample::SampleStore;

/// Which source produced a resolved input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "sample_set", rename_all = "snake_case")]
pub enum InputSource {
    Params,
    NamedSample(String),
    DefaultSample(String),
}

/// The concrete input document for one metric in one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInput {
    pub metric: MetricId,
    pub source: InputSource,
    pub document: Document,
}

/// Materialises metric inputs. The three sources are mutually exclusive per
/// metric; nothing is merged.
#[derive(Clone)]
pub struct InputResolver {
    store: Arc<dyn SampleStore>,
    default_sample_set: String,
}

impl InputResolver {
    pub fn new(store: Arc<dyn SampleStore>, default_sample_set: impl Into<String>) -> Self {
        Self {
            store,
            default_sample_set: default_sample_set.into(),
        }
    }

    pub fn default_sample_set(&self) -> &str {
        &self.default_sample_set
    }

    /// Resolve the input for `definition` given its run-context entry.
    ///
    /// Non-empty `params` win and the sample store is never consulted. An
    /// empty params object counts as not supplied. Whatever the source, the
    /// document must be a JSON object carrying the metric's required keys.
    pub async fn resolve(
        &self,
        definition: &MetricDefinition,
        entry: Option<&MetricOverride>,
    ) -> InputResult<ResolvedInput> {
        let metric = definition.id.as_str();

        let params = entry
            .and_then(|e| e.params.as_ref())
            .filter(|p| !is_empty_object(p));

        let (source, raw) = match (params, entry.and_then(|e| e.sample_name.as_deref())) {
            (Some(params), _) => (InputSource::Params, params.clone()),
            (None, Some(sample)) if !sample.is_empty() => {
                let raw = self.store.load_input(sample, definition).await?;
                (InputSource::NamedSample(sample.to_string()), raw)
            }
            _ => {
                let raw = self
                    .store
                    .load_input(&self.default_sample_set, definition)
                    .await?;
                (InputSource::DefaultSample(self.default_sample_set.clone()), raw)
            }
        };

        let document = Document::from_value(metric, raw)?;
        document.validate_for(definition)?;

        Ok(ResolvedInput {
            metric: definition.id.clone(),
            source,
            document,
        })
    }
}

fn is_empty_object(value: &Value) -> bool {
    matches!(value, Value::Object(map) if map.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InputError;
    use crate::metric::{Category, InputDescriptor};
    use crate::sample::MemorySampleStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn def() -> MetricDefinition {
        MetricDefinition::new(
            "score_db_utilization",
            Category::Efficiency,
            0.18,
            InputDescriptor::new("db.utilization", "db_utilization.json")
                .with_required_keys(["databases"]),
        )
        .unwrap()
    }

    /// Store that counts calls and never finds anything.
    #[derive(Default)]
    struct CountingStore {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SampleStore for CountingStore {
        async fn load_input(&self, sample_set: &str, metric: &MetricDefinition) -> InputResult<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(InputError::SampleNotFound {
                sample_set: sample_set.to_string(),
                metric: metric.id.to_string(),
            })
        }
    }

    fn resolver_with(store: MemorySampleStore) -> InputResolver {
        InputResolver::new(Arc::new(store), "Sample2")
    }

    #[tokio::test]
    async fn test_params_take_precedence_and_skip_the_store() {
        let store = Arc::new(CountingStore::default());
        let resolver = InputResolver::new(store.clone(), "Sample2");
        let entry = MetricOverride {
            params: Some(json!({"databases": [{"id": "a"}]})),
            sample_name: Some("Sample9".into()),
        };
        let resolved = resolver.resolve(&def(), Some(&entry)).await.unwrap();
        assert_eq!(resolved.source, InputSource::Params);
        assert_eq!(resolved.document.get("databases").unwrap()[0]["id"], json!("a"));
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_named_sample_used_when_no_params() {
        let store = MemorySampleStore::new()
            .with("Sample9", "score_db_utilization", json!({"databases": []}))
            .with("Sample2", "score_db_utilization", json!({"databases": [1]}));
        let resolved = resolver_with(store)
            .resolve(&def(), Some(&MetricOverride::sample("Sample9")))
            .await
            .unwrap();
        assert_eq!(resolved.source, InputSource::NamedSample("Sample9".into()));
        assert_eq!(resolved.document.get("databases"), Some(&json!([])));
    }

    #[tokio::test]
    async fn test_default_sample_used_without_entry() {
        let store = MemorySampleStore::new().with("Sample2", "score_db_utilization", json!({"databases": [1]}));
        let resolved = resolver_with(store).resolve(&def(), None).await.unwrap();
        assert_eq!(resolved.source, InputSource::DefaultSample("Sample2".into()));
    }

    #[tokio::test]
    async fn test_empty_params_fall_through_to_sample() {
        let store = MemorySampleStore::new().with("Sample2", "score_db_utilization", json!({"databases": [1]}));
        let entry = MetricOverride::params(json!({}));
        let resolved = resolver_with(store).resolve(&def(), Some(&entry)).await.unwrap();
        assert_eq!(resolved.source, InputSource::DefaultSample("Sample2".into()));
    }

    #[tokio::test]
    async fn test_named_sample_missing_does_not_fall_back_to_default() {
        let store = MemorySampleStore::new().with("Sample2", "score_db_utilization", json!({"databases": [1]}));
        let err = resolver_with(store)
            .resolve(&def(), Some(&MetricOverride::sample("Nope")))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            InputError::SampleNotFound {
                sample_set: "Nope".into(),
                metric: "score_db_utilization".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_non_object_params_are_malformed() {
        let entry = MetricOverride::params(json!("databases"));
        let err = resolver_with(MemorySampleStore::new())
            .resolve(&def(), Some(&entry))
            .await
            .unwrap_err();
        assert!(matches!(err, InputError::MalformedParams { .. }));
    }

    #[tokio::test]
    async fn test_params_missing_required_keys_violate_schema() {
        let entry = MetricOverride::params(json!({"instances": []}));
        let err = resolver_with(MemorySampleStore::new())
            .resolve(&def(), Some(&entry))
            .await
            .unwrap_err();
        assert!(matches!(err, InputError::SchemaViolation { .. }));
    }
}
