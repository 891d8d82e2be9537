//! Sentinel errors the engine surfaces to callers.
//!
//! Every failure the scheduler, the graph builder, or the step controller
//! can produce is a variant of [`PetalError`]. Callers match by variant,
//! never by rendered message — the `Display` text is for humans, not
//! control flow.

use miette::Diagnostic;
use thiserror::Error;

use crate::node::NodeId;

/// The unified error sentinel surface for graph construction and execution.
#[derive(Debug, Error, Diagnostic)]
pub enum PetalError {
    /// A graph with no nodes was run or validated.
    #[error("graph is empty")]
    #[diagnostic(
        code(petalflow::graph::empty),
        help("add at least one node before validating or running the graph")
    )]
    EmptyGraph,

    /// No entry node has been designated, or the designated entry does not
    /// exist in the graph.
    #[error("no entry node set")]
    #[diagnostic(
        code(petalflow::graph::no_entry),
        help("call Graph::set_entry with the id of a node already added to the graph")
    )]
    NoEntryNode,

    /// A lookup referenced a node id that is not present in the graph.
    #[error("node not found: {id}")]
    #[diagnostic(
        code(petalflow::graph::node_not_found),
        help("check that `{id}` was added via Graph::add_node before it is referenced")
    )]
    NodeNotFound { id: NodeId },

    /// An edge referenced an endpoint that is not present in the graph.
    #[error("invalid edge {from} -> {to}: endpoint not registered")]
    #[diagnostic(
        code(petalflow::graph::invalid_edge),
        help("add both `{from}` and `{to}` as nodes before connecting them")
    )]
    InvalidEdge { from: NodeId, to: NodeId },

    /// A node id was registered more than once.
    #[error("duplicate node id: {id}")]
    #[diagnostic(
        code(petalflow::graph::duplicate_node),
        help("node ids must be unique within a graph; choose a different id for `{id}`")
    )]
    DuplicateNode { id: NodeId },

    /// Strict topological sort found a cycle.
    #[error("cycle detected in graph")]
    #[diagnostic(
        code(petalflow::graph::cycle_detected),
        help("use Graph::topological_sort_permissive to get the reachable acyclic subset")
    )]
    CycleDetected,

    /// A node's hop-count exceeded `RunOptions::max_hops`.
    #[error("max hops exceeded at node {node} (limit {limit})")]
    #[diagnostic(
        code(petalflow::scheduler::max_hops_exceeded),
        help("this usually indicates an unintended cycle; raise RunOptions::max_hops only if the cycle is deliberate")
    )]
    MaxHopsExceeded { node: NodeId, limit: u32 },

    /// The run was cancelled before completion.
    #[error("run canceled")]
    #[diagnostic(
        code(petalflow::scheduler::run_canceled),
        help("the envelope produced so far is returned alongside this error")
    )]
    RunCanceled,

    /// A node's `execute` returned a failure and `continue_on_error` was off.
    #[error("node execution failed: {node}")]
    #[diagnostic(
        code(petalflow::scheduler::node_execution),
        help("set RunOptions::continue_on_error to absorb node failures into the envelope's error list instead")
    )]
    NodeExecution {
        node: NodeId,
        #[source]
        source: crate::node::NodeError,
    },

    /// The step controller requested an abort, errored, or timed out.
    #[error("run aborted by step controller: {reason}")]
    #[diagnostic(
        code(petalflow::step::aborted),
        help("the step controller's `step` call returned Action::Abort, errored, or exceeded its timeout")
    )]
    StepAborted { reason: String },
}

pub type Result<T> = std::result::Result<T, PetalError>;
