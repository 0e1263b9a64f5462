//! Dependency closure and topological execution ordering.
//!
//! A depth-first traversal from each requested metric follows dependency
//! edges, marking nodes `InProgress` on entry and `Done` on exit. Reaching an
//! `InProgress` node means a cycle. Nodes are appended in post-order, so every
//! metric lands after all of its dependencies.
//!
//! Ordering is deterministic: roots are visited in requested order, and each
//! node's dependencies in registration order.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::metric::MetricId;
use crate::registry::MetricRegistry;

/// Which metrics a run asks for.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "SelectionRepr", into = "SelectionRepr")]
pub enum MetricSelection {
    /// Every registered metric, in registration order.
    #[default]
    All,
    /// An explicit list; dependencies are added automatically.
    Only(Vec<MetricId>),
}

impl MetricSelection {
    pub fn only<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<MetricId>,
    {
        Self::Only(ids.into_iter().map(Into::into).collect())
    }
}

/// Wire shape: `"all"`, a single identifier, or a list of identifiers.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum SelectionRepr {
    One(String),
    Many(Vec<MetricId>),
}

impl From<SelectionRepr> for MetricSelection {
    fn from(repr: SelectionRepr) -> Self {
        match repr {
            SelectionRepr::One(s) if s == "all" => MetricSelection::All,
            SelectionRepr::One(s) => MetricSelection::Only(vec![MetricId::new(s)]),
            SelectionRepr::Many(ids) => MetricSelection::Only(ids),
        }
    }
}

impl From<MetricSelection> for SelectionRepr {
    fn from(sel: MetricSelection) -> Self {
        match sel {
            MetricSelection::All => SelectionRepr::One("all".to_string()),
            MetricSelection::Only(ids) => SelectionRepr::Many(ids),
        }
    }
}

/// A validated, dependency-ordered execution plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    /// Every metric to run, each after all of its dependencies.
    pub order: Vec<MetricId>,
    /// Direct dependencies of each planned metric.
    pub dependencies: HashMap<MetricId, Vec<MetricId>>,
}

impl ExecutionPlan {
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &MetricId) -> bool {
        self.dependencies.contains_key(id)
    }

    pub fn dependencies_of(&self, id: &MetricId) -> &[MetricId] {
        self.dependencies
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Partition the order into dependency waves. Wave 0 holds metrics with
    /// no dependencies; wave `n` holds metrics whose deepest dependency sits
    /// in wave `n - 1`. Metrics within a wave are mutually independent.
    pub fn levels(&self) -> Vec<Vec<&MetricId>> {
        let mut level_of: HashMap<&MetricId, usize> = HashMap::new();
        let mut levels: Vec<Vec<&MetricId>> = Vec::new();

        for id in &self.order {
            let level = self
                .dependencies_of(id)
                .iter()
                .filter_map(|d| level_of.get(d))
                .map(|l| l + 1)
                .max()
                .unwrap_or(0);
            level_of.insert(id, level);
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(id);
        }
        levels
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    InProgress,
    Done,
}

/// Expands a [`MetricSelection`] into its dependency closure.
pub struct DependencyResolver<'a> {
    registry: &'a MetricRegistry,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(registry: &'a MetricRegistry) -> Self {
        Self { registry }
    }

    /// Compute the closure of `selection` in a valid execution order.
    ///
    /// Fails with [`ConfigError::UnknownMetric`] for unregistered identifiers,
    /// [`ConfigError::CyclicDependency`] on cycles, and
    /// [`ConfigError::EmptySelection`] for an empty explicit list.
    pub fn resolve(&self, selection: &MetricSelection) -> ConfigResult<ExecutionPlan> {
        let roots: Vec<MetricId> = match selection {
            MetricSelection::All => self.registry.all(),
            MetricSelection::Only(ids) => {
                if ids.is_empty() {
                    return Err(ConfigError::EmptySelection);
                }
                let mut seen = HashSet::new();
                ids.iter().filter(|id| seen.insert(*id)).cloned().collect()
            }
        };

        let mut state: HashMap<MetricId, VisitState> = HashMap::new();
        let mut stack: Vec<MetricId> = Vec::new();
        let mut order: Vec<MetricId> = Vec::new();

        for root in &roots {
            self.visit(root, None, &mut state, &mut stack, &mut order)?;
        }

        let mut dependencies = HashMap::with_capacity(order.len());
        for id in &order {
            let def = self.registry.get(id)?;
            dependencies.insert(id.clone(), def.depends_on.clone());
        }

        Ok(ExecutionPlan {
            order,
            dependencies,
        })
    }

    fn visit(
        &self,
        id: &MetricId,
        referenced_by: Option<&MetricId>,
        state: &mut HashMap<MetricId, VisitState>,
        stack: &mut Vec<MetricId>,
        order: &mut Vec<MetricId>,
    ) -> ConfigResult<()> {
        match state.get(id) {
            Some(VisitState::Done) => return Ok(()),
            Some(VisitState::InProgress) => {
                let start = stack.iter().position(|s| s == id).unwrap_or(0);
                let mut cycle: Vec<String> = stack[start..].iter().map(|m| m.to_string()).collect();
                cycle.push(id.to_string());
                return Err(ConfigError::CyclicDependency { cycle });
            }
            None => {}
        }

        let def = self
            .registry
            .get(id)
            .map_err(|_| ConfigError::UnknownMetric {
                metric: id.to_string(),
                referenced_by: referenced_by.map(|r| r.to_string()),
            })?;

        state.insert(id.clone(), VisitState::InProgress);
        stack.push(id.clone());

        let mut deps: Vec<&MetricId> = def.depends_on.iter().collect();
        deps.sort_by_key(|d| self.registry.position(d).unwrap_or(usize::MAX));
        for dep in deps {
            self.visit(dep, Some(id), state, stack, order)?;
        }

        stack.pop();
        state.insert(id.clone(), VisitState::Done);
        order.push(id.clone());
        Ok(())
    }
}
