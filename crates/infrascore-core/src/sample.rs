//! Sample-set backed input stores.
//!
//! A sample set is a named bundle of canned input documents keyed by metric.
//! [`FsSampleStore`] reads them from `<root>/<sample_set>/inputs/<file>`;
//! [`MemorySampleStore`] holds them in memory for tests and embedding.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::{InputError, InputResult};
use crate::metric::MetricDefinition;

/// Injectable source of sample input documents.
#[async_trait]
pub trait SampleStore: Send + Sync {
    /// Load the raw input for `metric` from `sample_set`.
    ///
    /// Returns [`InputError::SampleNotFound`] when the set has no input for
    /// the metric.
    async fn load_input(&self, sample_set: &str, metric: &MetricDefinition) -> InputResult<Value>;
}

/// Name of the optional per-sample-set file map.
pub const SAMPLE_MAP_FILE: &str = "map.json";

/// True when `name` is a relative path made only of normal components, so
/// joining it cannot leave the directory it is joined to.
fn is_contained(name: &str) -> bool {
    let path = Path::new(name);
    !name.is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)))
}

/// Filesystem sample store rooted at a data directory.
///
/// Layout:
///
/// ```text
/// <root>/<sample_set>/map.json            optional {backbone_key | metric_id: file}
/// <root>/<sample_set>/inputs/<file>.json
/// ```
///
/// Without a `map.json` the metric's catalog file name is used.
#[derive(Debug, Clone)]
pub struct FsSampleStore {
    root: PathBuf,
}

impl FsSampleStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn file_name_for(
        &self,
        set_dir: &Path,
        sample_set: &str,
        metric: &MetricDefinition,
    ) -> InputResult<String> {
        let map_path = set_dir.join(SAMPLE_MAP_FILE);
        let raw = match tokio::fs::read_to_string(&map_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(metric.input.sample_file.clone());
            }
            Err(e) => {
                return Err(InputError::SampleStore(format!(
                    "read {}: {e}",
                    map_path.display()
                )))
            }
        };

        let map: HashMap<String, String> = serde_json::from_str(&raw).map_err(|e| {
            InputError::SampleStore(format!("parse {}: {e}", map_path.display()))
        })?;

        map.get(&metric.input.backbone_key)
            .or_else(|| map.get(metric.id.as_str()))
            .cloned()
            .ok_or_else(|| InputError::SampleNotFound {
                sample_set: sample_set.to_string(),
                metric: metric.id.to_string(),
            })
    }
}

#[async_trait]
impl SampleStore for FsSampleStore {
    async fn load_input(&self, sample_set: &str, metric: &MetricDefinition) -> InputResult<Value> {
        if !is_contained(sample_set) || sample_set.contains('/') || sample_set.contains('\\') {
            return Err(InputError::SampleStore(format!(
                "invalid sample set name: '{sample_set}'"
            )));
        }

        let set_dir = self.root.join(sample_set);
        let file = self.file_name_for(&set_dir, sample_set, metric).await?;
        if !is_contained(&file) {
            return Err(InputError::SampleStore(format!(
                "invalid input file for {} in sample set '{sample_set}': '{file}'",
                metric.id
            )));
        }
        let path = set_dir.join("inputs").join(&file);
        debug!(metric = %metric.id, path = %path.display(), "loading sample input");

        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(InputError::SampleNotFound {
                    sample_set: sample_set.to_string(),
                    metric: metric.id.to_string(),
                });
            }
            Err(e) => {
                return Err(InputError::SampleStore(format!(
                    "read {}: {e}",
                    path.display()
                )))
            }
        };

        serde_json::from_str(&raw)
            .map_err(|e| InputError::SampleStore(format!("parse {}: {e}", path.display())))
    }
}

/// In-memory sample store keyed by `(sample_set, metric_id)`.
#[derive(Debug, Clone, Default)]
pub struct MemorySampleStore {
    inputs: HashMap<(String, String), Value>,
}

impl MemorySampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sample_set: &str, metric_id: &str, input: Value) -> Self {
        self.insert(sample_set, metric_id, input);
        self
    }

    pub fn insert(&mut self, sample_set: &str, metric_id: &str, input: Value) {
        self.inputs
            .insert((sample_set.to_string(), metric_id.to_string()), input);
    }
}

#[async_trait]
impl SampleStore for MemorySampleStore {
    async fn load_input(&self, sample_set: &str, metric: &MetricDefinition) -> InputResult<Value> {
        self.inputs
            .get(&(sample_set.to_string(), metric.id.to_string()))
            .cloned()
            .ok_or_else(|| InputError::SampleNotFound {
                sample_set: sample_set.to_string(),
                metric: metric.id.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::{Category, InputDescriptor};
    use serde_json::json;

    fn tagging() -> MetricDefinition {
        MetricDefinition::new(
            "score_tagging_coverage",
            Category::Governance,
            0.5,
            InputDescriptor::new("tagging.coverage", "tagging_coverage.json"),
        )
        .unwrap()
    }

    fn write(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[tokio::test]
    async fn test_fs_store_reads_catalog_file_name() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("Sample2/inputs/tagging_coverage.json"),
            r#"{"resources": [], "required_tags": ["env"]}"#,
        );
        let store = FsSampleStore::new(dir.path());
        let doc = store.load_input("Sample2", &tagging()).await.unwrap();
        assert_eq!(doc["required_tags"], json!(["env"]));
    }

    #[tokio::test]
    async fn test_fs_store_honours_map_file() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("Custom/map.json"),
            r#"{"tagging.coverage": "tags_v2.json"}"#,
        );
        write(
            &dir.path().join("Custom/inputs/tags_v2.json"),
            r#"{"resources": [{"id": "x"}], "required_tags": []}"#,
        );
        let store = FsSampleStore::new(dir.path());
        let doc = store.load_input("Custom", &tagging()).await.unwrap();
        assert_eq!(doc["resources"][0]["id"], json!("x"));
    }

    #[tokio::test]
    async fn test_fs_store_missing_file_is_sample_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSampleStore::new(dir.path());
        let err = store.load_input("Sample2", &tagging()).await.unwrap_err();
        assert_eq!(
            err,
            InputError::SampleNotFound {
                sample_set: "Sample2".into(),
                metric: "score_tagging_coverage".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_fs_store_map_without_entry_is_sample_not_found() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("Custom/map.json"), r#"{"db.utilization": "db.json"}"#);
        let store = FsSampleStore::new(dir.path());
        let err = store.load_input("Custom", &tagging()).await.unwrap_err();
        assert!(matches!(err, InputError::SampleNotFound { .. }));
    }

    #[tokio::test]
    async fn test_fs_store_rejects_unparseable_json() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("Sample2/inputs/tagging_coverage.json"),
            "{not json",
        );
        let store = FsSampleStore::new(dir.path());
        let err = store.load_input("Sample2", &tagging()).await.unwrap_err();
        assert!(matches!(err, InputError::SampleStore(_)));
    }

    #[tokio::test]
    async fn test_fs_store_rejects_path_like_sample_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSampleStore::new(dir.path());
        for name in ["..", "a/b", ""] {
            let err = store.load_input(name, &tagging()).await.unwrap_err();
            assert!(matches!(err, InputError::SampleStore(_)), "{name}");
        }
    }

    #[tokio::test]
    async fn test_fs_store_rejects_mapped_files_outside_the_set() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("secret.json"), r#"{"leaked": true}"#);
        write(
            &dir.path().join("Custom/map.json"),
            r#"{"tagging.coverage": "../../secret.json"}"#,
        );
        let store = FsSampleStore::new(dir.path());
        let err = store.load_input("Custom", &tagging()).await.unwrap_err();
        assert!(matches!(err, InputError::SampleStore(ref m) if m.contains("invalid input file")));

        let abs = dir.path().join("secret.json");
        write(
            &dir.path().join("Abs/map.json"),
            &serde_json::to_string(&json!({"tagging.coverage": abs})).unwrap(),
        );
        let err = store.load_input("Abs", &tagging()).await.unwrap_err();
        assert!(matches!(err, InputError::SampleStore(_)));
    }

    #[tokio::test]
    async fn test_memory_store_lookup() {
        let store = MemorySampleStore::new().with("S", "score_tagging_coverage", json!({"a": 1}));
        assert_eq!(
            store.load_input("S", &tagging()).await.unwrap(),
            json!({"a": 1})
        );
        assert!(store.load_input("T", &tagging()).await.is_err());
    }
}
