//! Recording of the dependencies observed while evaluating variables.
//!
//! Formulas are arbitrary code, so the dependency graph is only known by watching which values
//! each formula asks for. When tracing is enabled, the simulation records an edge from the variable
//! being computed to every value it requests.
use crate::id::VariableID;
use crate::period::Period;
use anyhow::{Result, anyhow};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use std::fmt;

/// A variable at a given period
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraceNode {
    /// The variable
    pub name: VariableID,
    /// The (normalised) period
    pub period: Period,
}

impl fmt::Display for TraceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.period)
    }
}

/// The graph of observed dependencies, with edges from dependants to their dependencies
#[derive(Debug, Default)]
pub struct DependencyTrace {
    graph: DiGraph<TraceNode, ()>,
    nodes: HashMap<TraceNode, NodeIndex>,
}

impl DependencyTrace {
    /// Create an empty trace
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&mut self, name: &VariableID, period: Period) -> NodeIndex {
        let node = TraceNode {
            name: name.clone(),
            period,
        };
        *self
            .nodes
            .entry(node.clone())
            .or_insert_with(|| self.graph.add_node(node))
    }

    /// Record that `from` requested the value of `to`
    pub fn record(&mut self, from: (&VariableID, Period), to: (&VariableID, Period)) {
        let from = self.node(from.0, from.1);
        let to = self.node(to.0, to.1);
        self.graph.update_edge(from, to, ());
    }

    /// The number of distinct (variable, period) nodes seen
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// The values directly requested by a variable's formula for a period, sorted
    pub fn dependencies(&self, name: &str, period: Period) -> Vec<TraceNode> {
        let key = TraceNode {
            name: name.into(),
            period,
        };
        let Some(&idx) = self.nodes.get(&key) else {
            return Vec::new();
        };

        let mut deps: Vec<_> = self
            .graph
            .neighbors(idx)
            .map(|dep| self.graph[dep].clone())
            .collect();
        deps.sort();
        deps
    }

    /// All recorded nodes ordered so that every node comes after its dependencies
    pub fn evaluation_order(&self) -> Result<Vec<TraceNode>> {
        let order = toposort(&self.graph, None).map_err(|cycle| {
            anyhow!(
                "Cycle detected in dependency graph for {}",
                self.graph[cycle.node_id()]
            )
        })?;

        // Leaves first
        Ok(order
            .into_iter()
            .rev()
            .map(|idx| self.graph[idx].clone())
            .collect())
    }

    /// Forget all recorded dependencies
    pub fn clear(&mut self) {
        self.graph.clear();
        self.nodes.clear();
    }
}
