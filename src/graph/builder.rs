use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::Graph;
use crate::error::{PetalError, Result};
use crate::node::{Node, NodeId};

/// Fallible, chainable graph construction.
///
/// Every method returns `Result<Self>` so callers chain with `?`:
///
/// ```
/// use petalflow::graph::GraphBuilder;
/// use petalflow::node::{Node, NodeContext, NodeError, NodeId, NodeKind};
/// use petalflow::envelope::Envelope;
/// use std::sync::Arc;
///
/// struct Noop(NodeId);
/// #[async_trait::async_trait]
/// impl Node for Noop {
///     fn id(&self) -> &NodeId { &self.0 }
///     fn kind(&self) -> NodeKind { NodeKind::Noop }
///     async fn execute(&self, _ctx: &NodeContext, envelope: Envelope) -> Result<Envelope, NodeError> {
///         Ok(envelope)
///     }
/// }
///
/// # fn build() -> petalflow::error::Result<()> {
/// let graph = GraphBuilder::new("demo")
///     .add_node(Arc::new(Noop(NodeId::new("a"))))?
///     .add_node(Arc::new(Noop(NodeId::new("b"))))?
///     .add_edge(NodeId::new("a"), NodeId::new("b"))?
///     .set_entry(NodeId::new("a"))?
///     .build()?;
/// assert_eq!(graph.node_count(), 2);
/// # Ok(())
/// # }
/// ```
pub struct GraphBuilder {
    name: String,
    nodes: FxHashMap<NodeId, Arc<dyn Node>>,
    order: Vec<NodeId>,
    successors: FxHashMap<NodeId, Vec<NodeId>>,
    predecessors: FxHashMap<NodeId, Vec<NodeId>>,
    entry: Option<NodeId>,
}

impl GraphBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: FxHashMap::default(),
            order: Vec::new(),
            successors: FxHashMap::default(),
            predecessors: FxHashMap::default(),
            entry: None,
        }
    }

    /// Registers a node. Fails on a duplicate identifier (§4.1).
    pub fn add_node(mut self, node: Arc<dyn Node>) -> Result<Self> {
        let id = node.id().clone();
        if self.nodes.contains_key(&id) {
            return Err(PetalError::DuplicateNode { id });
        }
        self.order.push(id.clone());
        self.nodes.insert(id, node);
        Ok(self)
    }

    /// Adds a directed edge. Fails if either endpoint is not a
    /// registered node. Re-adding an existing edge is a silent no-op
    /// (deduplicated, §4.1).
    pub fn add_edge(mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) -> Result<Self> {
        let from = from.into();
        let to = to.into();
        if !self.nodes.contains_key(&from) {
            return Err(PetalError::InvalidEdge { from, to });
        }
        if !self.nodes.contains_key(&to) {
            return Err(PetalError::InvalidEdge { from, to });
        }

        let succ = self.successors.entry(from.clone()).or_default();
        if !succ.contains(&to) {
            succ.push(to.clone());
        }
        let pred = self.predecessors.entry(to).or_default();
        if !pred.contains(&from) {
            pred.push(from);
        }
        Ok(self)
    }

    /// Designates the run's entry node. Fails if `id` is not registered.
    pub fn set_entry(mut self, id: impl Into<NodeId>) -> Result<Self> {
        let id = id.into();
        if !self.nodes.contains_key(&id) {
            return Err(PetalError::NodeNotFound { id });
        }
        self.entry = Some(id);
        Ok(self)
    }

    /// Validates and compiles the builder into an executable [`Graph`].
    pub fn build(self) -> Result<Graph> {
        if self.order.is_empty() {
            return Err(PetalError::EmptyGraph);
        }
        let entry = self.entry.ok_or(PetalError::NoEntryNode)?;
        if !self.nodes.contains_key(&entry) {
            return Err(PetalError::NoEntryNode);
        }

        Ok(Graph {
            name: self.name,
            nodes: self.nodes,
            order: self.order,
            successors: self.successors,
            predecessors: self.predecessors,
            entry,
        })
    }
}
