//! Compiled, read-only flow graph.
//!
//! A `FlowGraph` is built once from an authored [`FlowModel`] and then shared behind an
//! `Arc` by every session of the tenant. Nothing mutates it after compilation; per-session
//! template overrides work on copies of individual nodes.

use std::collections::HashMap;

use petgraph::{algo::tarjan_scc, graph::DiGraph};
use tracing::warn;

use crate::{
    FlowError, Result,
    graph::{Node, NodeId, NodeKind, Transition},
    model::FlowModel,
};

/// Result of structural validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphReport {
    /// Problems that prevent the graph from being used.
    pub errors: Vec<String>,
    /// Problems the executor degrades around at runtime.
    pub warnings: Vec<String>,
}

impl GraphReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct FlowGraph {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub entry_node_id: NodeId,
    pub version: u64,
    nodes: HashMap<NodeId, Node>,
    /// Authored order, used wherever "the first node of kind X" is asked for.
    order: Vec<NodeId>,
}

impl FlowGraph {
    /// Build a graph from runtime nodes. Fails on duplicate ids or an unresolvable entry node.
    pub fn new(
        id: &str,
        tenant_id: &str,
        entry_node_id: Option<&str>,
        nodes: Vec<Node>,
        version: u64,
    ) -> Result<Self> {
        if nodes.is_empty() {
            return Err(FlowError::Configuration(format!("flow {} has no nodes", id)));
        }

        let mut map = HashMap::with_capacity(nodes.len());
        let mut order = Vec::with_capacity(nodes.len());
        for node in nodes {
            if map.contains_key(&node.id) {
                return Err(FlowError::Configuration(format!("duplicate node id {} in flow {}", node.id, id)));
            }
            order.push(node.id.clone());
            map.insert(node.id.clone(), node);
        }

        let entry = match entry_node_id.filter(|e| !e.is_empty()) {
            Some(entry) if map.contains_key(entry) => entry.to_string(),
            Some(entry) => return Err(FlowError::Configuration(format!("entry node {} not found in flow {}", entry, id))),
            None => order.iter().find(|nid| map[*nid].kind == NodeKind::Start).unwrap_or(&order[0]).clone(),
        };

        Ok(Self {
            id: id.to_string(),
            tenant_id: tenant_id.to_string(),
            name: String::new(),
            entry_node_id: entry,
            version,
            nodes: map,
            order,
        })
    }

    /// Compile an authored model, logging any warnings.
    pub fn from_model(
        model: &FlowModel,
        version: u64,
    ) -> Result<Self> {
        let nodes = model.nodes.iter().cloned().map(Node::from).collect();
        let mut graph = Self::new(&model.id, &model.tenant_id, model.entry_node_id.as_deref(), nodes, version)?;
        graph.name = model.name.clone();

        for warning in graph.validate().warnings {
            warn!(flow = %graph.id, tenant = %graph.tenant_id, "{}", warning);
        }
        Ok(graph)
    }

    /// Check a model without keeping the result.
    pub fn check(model: &FlowModel) -> GraphReport {
        let nodes = model.nodes.iter().cloned().map(Node::from).collect();
        match Self::new(&model.id, &model.tenant_id, model.entry_node_id.as_deref(), nodes, 0) {
            Ok(graph) => graph.validate(),
            Err(e) => GraphReport {
                errors: vec![e.to_string()],
                warnings: Vec::new(),
            },
        }
    }

    pub fn node(
        &self,
        id: &str,
    ) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(
        &self,
        id: &str,
    ) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn entry_node(&self) -> Option<&Node> {
        self.nodes.get(&self.entry_node_id)
    }

    /// First node of `kind` in authored order.
    pub fn first_of_kind(
        &self,
        kind: NodeKind,
    ) -> Option<&Node> {
        self.nodes().find(|n| n.kind == kind)
    }

    /// Nodes in authored order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Runtime-degradable problems: dangling targets, condition nodes without branches,
    /// content that violates the kind's schema, and cycles that never wait for the user.
    pub fn validate(&self) -> GraphReport {
        let mut report = GraphReport::default();

        for node in self.nodes() {
            if let Some(next) = &node.next {
                for target in next.targets() {
                    if !self.contains(target) {
                        report.warnings.push(format!("node {}: transition target {} does not exist", node.id, target));
                    }
                }
            }

            if node.kind == NodeKind::Condition && !matches!(&node.next, Some(Transition::Conditional(b)) if !b.is_empty()) {
                report.warnings.push(format!("condition node {} has no conditional transitions", node.id));
            }

            if node.kind == NodeKind::Unknown {
                report.warnings.push(format!("node {}: unrecognized type '{}'", node.id, node.raw_type));
            }

            match jsonschema::validator_for(&node.kind.content_schema()) {
                Ok(validator) => {
                    for error in validator.iter_errors(&node.content) {
                        report.warnings.push(format!("node {}: invalid content: {}", node.id, error));
                    }
                }
                Err(e) => report.errors.push(format!("node {}: invalid schema: {}", node.id, e)),
            }
        }

        for cycle in self.auto_advance_cycles() {
            report.warnings.push(format!("auto-advance cycle without user input: {}", cycle.join(" -> ")));
        }

        report
    }

    /// Strongly connected groups of auto-advancing nodes. Executing one of these loops
    /// relies on the hop ceiling to terminate.
    fn auto_advance_cycles(&self) -> Vec<Vec<NodeId>> {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let mut indices = HashMap::new();

        for node in self.nodes().filter(|n| n.kind.auto_advances()) {
            indices.insert(node.id.as_str(), graph.add_node(node.id.as_str()));
        }
        for node in self.nodes().filter(|n| n.kind.auto_advances()) {
            let Some(next) = &node.next else {
                continue;
            };
            for target in next.targets() {
                if let Some(dst) = indices.get(target.as_str()) {
                    graph.add_edge(indices[node.id.as_str()], *dst, ());
                }
            }
        }

        tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let mut ids: Vec<NodeId> = scc.iter().map(|idx| graph[*idx].to_string()).collect();
                ids.sort();
                ids
            })
            .collect()
    }

    /// Human-readable dump of the graph.
    pub fn schema(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("=== Flow {} (tenant {}, v{}) ===", self.id, self.tenant_id, self.version));
        lines.push(format!("Entry: {}, Nodes: {}", self.entry_node_id, self.len()));
        for node in self.nodes() {
            let next = match &node.next {
                None => "(end)".to_string(),
                Some(Transition::Direct(target)) => target.clone(),
                Some(Transition::Conditional(branches)) => branches
                    .iter()
                    .map(|b| format!("{}[{} {}]", b.target, b.condition.variable, b.condition.operator.as_ref()))
                    .collect::<Vec<_>>()
                    .join(", "),
            };
            lines.push(format!("[{}] {} -> {}", node.id, node.kind.as_ref(), next));
        }

        lines.join("\n")
    }
}
