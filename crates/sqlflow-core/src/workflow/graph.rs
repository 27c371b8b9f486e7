//! Static workflow graph: nodes, edges, interrupt flags and write contracts.
//!
//! The graph is assembled once with [`GraphBuilder`] and validated at
//! construction time:
//! - every edge endpoint is a registered node
//! - every node is reachable from the start node (petgraph DFS)
//! - at least one node has no outbound edges (the sink)
//! - targets of the same fan-out declare disjoint write sets
//!
//! Joins are declared explicitly with [`GraphBuilder::join`]. A node that is
//! merely the target of several alternative edges (the validators are fed by
//! both generation and retry) runs whenever any of them fires.
//!
//! Runtime writes are checked against the declared sets by the engine.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;

use sqlflow_types::node::NodeId;
use sqlflow_types::run::RunField;

use super::nodes::declared_writes;
use super::routing::{Router, route_accuracy_gate, route_feedback_collector, route_human_feedback};

// ---------------------------------------------------------------------------
// Edges and node specs
// ---------------------------------------------------------------------------

/// Outbound edge of a node.
#[derive(Clone)]
pub enum Edge {
    /// All targets are scheduled; two or more targets is a fan-out.
    Unconditional(Vec<NodeId>),
    /// The router picks exactly one of `targets`.
    Conditional { router: Router, targets: Vec<NodeId> },
}

impl Edge {
    pub fn targets(&self) -> &[NodeId] {
        match self {
            Edge::Unconditional(targets) => targets,
            Edge::Conditional { targets, .. } => targets,
        }
    }
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Edge::Unconditional(targets) => f.debug_tuple("Unconditional").field(targets).finish(),
            Edge::Conditional { targets, .. } => f
                .debug_struct("Conditional")
                .field("targets", targets)
                .finish_non_exhaustive(),
        }
    }
}

/// Registration data for one node.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub id: NodeId,
    /// The engine suspends before entering this node.
    pub interrupt_before: bool,
    pub writes: BTreeSet<RunField>,
}

// ---------------------------------------------------------------------------
// GraphError
// ---------------------------------------------------------------------------

/// Errors detected while building a graph.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("start node not set")]
    MissingStart,

    #[error("node '{0}' registered twice")]
    DuplicateNode(NodeId),

    #[error("node '{0}' has more than one outbound edge")]
    DuplicateEdge(NodeId),

    #[error("edge references unregistered node '{0}'")]
    UnknownNode(NodeId),

    #[error("conditional edge from '{0}' has no targets")]
    EmptyConditional(NodeId),

    #[error("node '{0}' is unreachable from the start node")]
    Unreachable(NodeId),

    #[error("graph has no terminal node")]
    NoTerminal,

    #[error("join into '{0}' needs at least two predecessors")]
    DegenerateJoin(NodeId),

    #[error("fan-out from '{from}' schedules '{a}' and '{b}' which both write '{field}'")]
    OverlappingWrites {
        from: NodeId,
        a: NodeId,
        b: NodeId,
        field: RunField,
    },
}

// ---------------------------------------------------------------------------
// GraphBuilder
// ---------------------------------------------------------------------------

/// Assembles a [`WorkflowGraph`].
#[derive(Default)]
pub struct GraphBuilder {
    start: Option<NodeId>,
    nodes: BTreeMap<NodeId, NodeSpec>,
    edges: BTreeMap<NodeId, Edge>,
    joins: BTreeMap<NodeId, Vec<NodeId>>,
    error: Option<GraphError>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node with its declared write set.
    pub fn node(mut self, id: NodeId, writes: &[RunField]) -> Self {
        let spec = NodeSpec {
            id,
            interrupt_before: false,
            writes: writes.iter().copied().collect(),
        };
        if self.nodes.insert(id, spec).is_some() {
            self.error.get_or_insert(GraphError::DuplicateNode(id));
        }
        self
    }

    /// Register a node the engine never auto-enters.
    pub fn interrupt_node(self, id: NodeId, writes: &[RunField]) -> Self {
        let mut builder = self.node(id, writes);
        if let Some(spec) = builder.nodes.get_mut(&id) {
            spec.interrupt_before = true;
        }
        builder
    }

    pub fn start(mut self, id: NodeId) -> Self {
        self.start = Some(id);
        self
    }

    pub fn edge(self, from: NodeId, to: NodeId) -> Self {
        self.fan_out(from, &[to])
    }

    pub fn fan_out(self, from: NodeId, targets: &[NodeId]) -> Self {
        self.set_edge(from, Edge::Unconditional(targets.to_vec()))
    }

    pub fn conditional(self, from: NodeId, router: Router, targets: &[NodeId]) -> Self {
        self.set_edge(
            from,
            Edge::Conditional {
                router,
                targets: targets.to_vec(),
            },
        )
    }

    /// Route every `sources` node to `target`, which waits until all of them
    /// have completed before it becomes ready.
    pub fn join(mut self, sources: &[NodeId], target: NodeId) -> Self {
        if sources.len() < 2 {
            self.error.get_or_insert(GraphError::DegenerateJoin(target));
        }
        self.joins.insert(target, sources.to_vec());
        sources
            .iter()
            .fold(self, |builder, source| builder.edge(*source, target))
    }

    fn set_edge(mut self, from: NodeId, edge: Edge) -> Self {
        if self.edges.insert(from, edge).is_some() {
            self.error.get_or_insert(GraphError::DuplicateEdge(from));
        }
        self
    }

    pub fn build(self) -> Result<WorkflowGraph, GraphError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let start = self.start.ok_or(GraphError::MissingStart)?;
        if !self.nodes.contains_key(&start) {
            return Err(GraphError::UnknownNode(start));
        }

        for (from, edge) in &self.edges {
            if !self.nodes.contains_key(from) {
                return Err(GraphError::UnknownNode(*from));
            }
            if let Edge::Conditional { targets, .. } = edge {
                if targets.is_empty() {
                    return Err(GraphError::EmptyConditional(*from));
                }
            }
            for target in edge.targets() {
                if !self.nodes.contains_key(target) {
                    return Err(GraphError::UnknownNode(*target));
                }
            }
        }

        check_reachability(start, &self.nodes, &self.edges)?;

        if !self.nodes.keys().any(|id| !self.edges.contains_key(id)) {
            return Err(GraphError::NoTerminal);
        }

        check_fan_out_writes(&self.nodes, &self.edges)?;

        Ok(WorkflowGraph {
            start,
            nodes: self.nodes,
            edges: self.edges,
            join_predecessors: self.joins,
        })
    }
}

fn check_reachability(
    start: NodeId,
    nodes: &BTreeMap<NodeId, NodeSpec>,
    edges: &BTreeMap<NodeId, Edge>,
) -> Result<(), GraphError> {
    let mut graph = DiGraph::<NodeId, ()>::new();
    let indices: HashMap<NodeId, NodeIndex> =
        nodes.keys().map(|id| (*id, graph.add_node(*id))).collect();
    for (from, edge) in edges {
        for to in edge.targets() {
            graph.add_edge(indices[from], indices[to], ());
        }
    }

    let mut reached = BTreeSet::new();
    let mut dfs = Dfs::new(&graph, indices[&start]);
    while let Some(ix) = dfs.next(&graph) {
        reached.insert(graph[ix]);
    }

    match nodes.keys().find(|id| !reached.contains(*id)) {
        Some(id) => Err(GraphError::Unreachable(*id)),
        None => Ok(()),
    }
}

fn check_fan_out_writes(
    nodes: &BTreeMap<NodeId, NodeSpec>,
    edges: &BTreeMap<NodeId, Edge>,
) -> Result<(), GraphError> {
    for (source, edge) in edges {
        let Edge::Unconditional(targets) = edge else {
            continue;
        };
        for (i, a) in targets.iter().enumerate() {
            for b in &targets[i + 1..] {
                if let Some(field) = nodes[a].writes.intersection(&nodes[b].writes).next() {
                    return Err(GraphError::OverlappingWrites {
                        from: *source,
                        a: *a,
                        b: *b,
                        field: *field,
                    });
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// WorkflowGraph
// ---------------------------------------------------------------------------

/// A validated, immutable workflow graph.
#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    start: NodeId,
    nodes: BTreeMap<NodeId, NodeSpec>,
    edges: BTreeMap<NodeId, Edge>,
    /// Join nodes and the predecessors each waits for.
    join_predecessors: BTreeMap<NodeId, Vec<NodeId>>,
}

impl WorkflowGraph {
    /// The question-to-SQL workflow:
    ///
    /// ```text
    /// generate_sql -> {validate_schema, validate_execution} -> accuracy_gate
    /// accuracy_gate ?-> retry_generator | feedback_collector
    /// retry_generator -> {validate_schema, validate_execution}
    /// feedback_collector ?-> human_feedback | finalize
    /// human_feedback (interrupt) ?-> feedback_collector | finalize
    /// ```
    pub fn sql_workflow() -> Result<Self, GraphError> {
        use NodeId::*;

        let validators = [ValidateSchema, ValidateExecution];
        let mut builder = GraphBuilder::new().start(GenerateSql);
        for node in NodeId::ALL {
            builder = if node == HumanFeedback {
                builder.interrupt_node(node, declared_writes(node))
            } else {
                builder.node(node, declared_writes(node))
            };
        }

        builder
            .fan_out(GenerateSql, &validators)
            .join(&validators, AccuracyGate)
            .conditional(
                AccuracyGate,
                route_accuracy_gate,
                &[FeedbackCollector, RetryGenerator],
            )
            .fan_out(RetryGenerator, &validators)
            .conditional(
                FeedbackCollector,
                route_feedback_collector,
                &[HumanFeedback, Finalize],
            )
            .conditional(
                HumanFeedback,
                route_human_feedback,
                &[FeedbackCollector, Finalize],
            )
            .build()
    }

    pub fn start(&self) -> NodeId {
        self.start
    }

    pub fn spec(&self, node: NodeId) -> Option<&NodeSpec> {
        self.nodes.get(&node)
    }

    pub fn is_interrupt(&self, node: NodeId) -> bool {
        self.nodes.get(&node).is_some_and(|s| s.interrupt_before)
    }

    pub fn writes(&self, node: NodeId) -> Option<&BTreeSet<RunField>> {
        self.nodes.get(&node).map(|s| &s.writes)
    }

    /// `None` for terminal nodes.
    pub fn edge(&self, node: NodeId) -> Option<&Edge> {
        self.edges.get(&node)
    }

    /// Predecessors a join node waits for; `None` if `node` is not a join.
    pub fn join_predecessors(&self, node: NodeId) -> Option<&[NodeId]> {
        self.join_predecessors.get(&node).map(Vec::as_slice)
    }

    pub fn is_terminal(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node) && !self.edges.contains_key(&node)
    }
}
