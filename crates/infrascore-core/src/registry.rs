//! Static catalog of metric definitions.
//!
//! Populated once at process start via typed [`MetricRegistry::register`]
//! calls, then shared read-only (`Arc<MetricRegistry>`) with the engine.

use std::collections::HashMap;

use crate::error::{ConfigError, ConfigResult};
use crate::metric::{MetricDefinition, MetricId};
use crate::resolver::{DependencyResolver, MetricSelection};

/// Registration-ordered set of [`MetricDefinition`]s.
#[derive(Debug, Clone, Default)]
pub struct MetricRegistry {
    definitions: Vec<MetricDefinition>,
    index: HashMap<MetricId, usize>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a definition. Fails with [`ConfigError::DuplicateMetric`] when the
    /// identifier is already present.
    pub fn register(&mut self, definition: MetricDefinition) -> ConfigResult<()> {
        if self.index.contains_key(&definition.id) {
            return Err(ConfigError::DuplicateMetric {
                metric: definition.id.to_string(),
            });
        }
        self.index
            .insert(definition.id.clone(), self.definitions.len());
        self.definitions.push(definition);
        Ok(())
    }

    /// Look up a definition. Fails with [`ConfigError::UnknownMetric`].
    pub fn get(&self, id: &MetricId) -> ConfigResult<&MetricDefinition> {
        self.index
            .get(id)
            .map(|&i| &self.definitions[i])
            .ok_or_else(|| ConfigError::UnknownMetric {
                metric: id.to_string(),
                referenced_by: None,
            })
    }

    pub fn contains(&self, id: &MetricId) -> bool {
        self.index.contains_key(id)
    }

    /// Registration position of `id`, used for deterministic tie-breaking.
    pub fn position(&self, id: &MetricId) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// All identifiers in registration order.
    pub fn all(&self) -> Vec<MetricId> {
        self.definitions.iter().map(|d| d.id.clone()).collect()
    }

    pub fn definitions(&self) -> impl Iterator<Item = &MetricDefinition> {
        self.definitions.iter()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Check that every dependency reference resolves and the graph is acyclic.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.is_empty() {
            return Ok(());
        }
        DependencyResolver::new(self)
            .resolve(&MetricSelection::All)
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::{Category, InputDescriptor};

    fn def(id: &str, deps: &[&str]) -> MetricDefinition {
        MetricDefinition::new(
            id,
            Category::Efficiency,
            1.0,
            InputDescriptor::new(id, format!("{id}.json")),
        )
        .unwrap()
        .depends_on(deps.iter().copied())
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut reg = MetricRegistry::new();
        reg.register(def("a", &[])).unwrap();
        let err = reg.register(def("a", &[])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::DuplicateMetric {
                metric: "a".to_string()
            }
        );
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_get_unknown_metric_fails() {
        let reg = MetricRegistry::new();
        let err = reg.get(&MetricId::from("nope")).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownMetric { .. }));
    }

    #[test]
    fn test_all_preserves_registration_order() {
        let mut reg = MetricRegistry::new();
        for id in ["c", "a", "b"] {
            reg.register(def(id, &[])).unwrap();
        }
        let ids: Vec<String> = reg.all().into_iter().map(|m| m.to_string()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert_eq!(reg.position(&MetricId::from("b")), Some(2));
    }

    #[test]
    fn test_validate_flags_dangling_dependency() {
        let mut reg = MetricRegistry::new();
        reg.register(def("a", &["ghost"])).unwrap();
        let err = reg.validate().unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownMetric {
                metric: "ghost".to_string(),
                referenced_by: Some("a".to_string()),
            }
        );
    }
}
