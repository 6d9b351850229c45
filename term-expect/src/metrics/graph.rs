//! Arena-backed metric dependency graph.
//!
//! Nodes are stored in a `Vec` and referenced by [`NodeId`]. The graph is
//! built by a depth-first expansion that appends a node only after all of
//! its dependencies, so node ids are already a topological order and every
//! dependency id is smaller than its dependent's id.

use std::collections::HashMap;

use super::config::{MetricConfiguration, MetricId};
use super::registry::MetricRegistry;
use crate::error::{Result, TermError};

/// Index of a node in the graph arena.
pub type NodeId = usize;

/// One distinct metric computation.
#[derive(Debug, Clone)]
pub struct MetricNode {
    pub metric: MetricConfiguration,
    pub metric_id: MetricId,
    pub dependencies: Vec<NodeId>,
    /// Longest dependency chain below this node; leaves are level 0.
    pub level: usize,
}

enum VisitState {
    InProgress,
    Done(NodeId),
}

/// The deduplicated closure of a set of requested metrics.
#[derive(Debug, Clone, Default)]
pub struct MetricGraph {
    nodes: Vec<MetricNode>,
    index: HashMap<MetricId, NodeId>,
    roots: Vec<NodeId>,
}

impl MetricGraph {
    /// Expands the requested metrics and their declared dependencies.
    ///
    /// Fails with `CyclicMetricDependency` if a metric transitively depends
    /// on itself.
    pub fn build(registry: &MetricRegistry, requested: &[MetricConfiguration]) -> Result<Self> {
        let mut graph = Self::default();
        let mut state = HashMap::new();
        let mut path = Vec::new();
        for metric in requested {
            let node = graph.visit(registry, metric.clone(), &mut state, &mut path)?;
            if !graph.roots.contains(&node) {
                graph.roots.push(node);
            }
        }
        Ok(graph)
    }

    fn visit(
        &mut self,
        registry: &MetricRegistry,
        metric: MetricConfiguration,
        state: &mut HashMap<MetricId, VisitState>,
        path: &mut Vec<MetricId>,
    ) -> Result<NodeId> {
        let metric_id = metric.id();
        match state.get(&metric_id) {
            Some(VisitState::Done(node)) => return Ok(*node),
            Some(VisitState::InProgress) => {
                let start = path.iter().position(|id| id == &metric_id).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(ToString::to_string).collect();
                cycle.push(metric_id.to_string());
                return Err(TermError::CyclicMetricDependency { cycle });
            }
            None => {}
        }

        state.insert(metric_id.clone(), VisitState::InProgress);
        path.push(metric_id.clone());

        let mut dependencies = Vec::new();
        for dependency in registry.dependencies(&metric) {
            let node = self.visit(registry, dependency, state, path)?;
            if !dependencies.contains(&node) {
                dependencies.push(node);
            }
        }
        path.pop();

        let level = dependencies
            .iter()
            .map(|d| self.nodes[*d].level + 1)
            .max()
            .unwrap_or(0);
        let node = self.nodes.len();
        self.nodes.push(MetricNode {
            metric,
            metric_id: metric_id.clone(),
            dependencies,
            level,
        });
        self.index.insert(metric_id.clone(), node);
        state.insert(metric_id, VisitState::Done(node));
        Ok(node)
    }

    pub fn node(&self, id: NodeId) -> &MetricNode {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> &[MetricNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes for the originally requested metrics, deduplicated.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn lookup(&self, metric_id: &MetricId) -> Option<NodeId> {
        self.index.get(metric_id).copied()
    }

    /// Nodes grouped by level; every node's dependencies sit in earlier groups.
    pub fn levels(&self) -> Vec<Vec<NodeId>> {
        let depth = self.nodes.iter().map(|n| n.level + 1).max().unwrap_or(0);
        let mut levels = vec![Vec::new(); depth];
        for (id, node) in self.nodes.iter().enumerate() {
            levels[node.level].push(id);
        }
        levels
    }
}
