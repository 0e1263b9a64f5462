//! Input documents fed to evaluation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{InputError, InputResult};
use crate::metric::MetricDefinition;

/// A JSON object used as a metric's input document.
///
/// Non-object JSON is rejected at construction, so a `Document` is always
/// safe to index by top-level key.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON value, failing unless it is an object.
    pub fn from_value(metric: &str, value: Value) -> InputResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(InputError::MalformedParams {
                metric: metric.to_string(),
                reason: format!("expected a JSON object, got {}", json_kind(&other)),
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Check the document carries every key the metric declares as required.
    pub fn validate_for(&self, definition: &MetricDefinition) -> InputResult<()> {
        let missing: Vec<String> = definition
            .input
            .required_keys
            .iter()
            .filter(|k| !self.0.contains_key(k.as_str()))
            .cloned()
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(InputError::SchemaViolation {
                metric: definition.id.to_string(),
                missing,
            })
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
