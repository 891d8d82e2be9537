//! The graph: an immutable-at-run view over nodes and directed edges.
//!
//! Construction (via [`GraphBuilder`]) is fallible and synchronous — every
//! mistake (duplicate id, dangling edge endpoint, unset entry) is caught
//! at build time, never during a run (§7: "surfaced to the builder/caller,
//! never at run time"). Once compiled into a [`Graph`], the structure is
//! read-only; the scheduler never mutates it (§4.1).

mod builder;
mod iteration;

pub use builder::GraphBuilder;

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::error::{PetalError, Result};
use crate::node::{Node, NodeId};

/// A named, validated collection of nodes and directed edges.
pub struct Graph {
    name: String,
    nodes: FxHashMap<NodeId, Arc<dyn Node>>,
    order: Vec<NodeId>,
    successors: FxHashMap<NodeId, Vec<NodeId>>,
    predecessors: FxHashMap<NodeId, Vec<NodeId>>,
    entry: NodeId,
}

impl Graph {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn entry(&self) -> &NodeId {
        &self.entry
    }

    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&Arc<dyn Node>> {
        self.nodes.get(id)
    }

    pub fn get_node(&self, id: &NodeId) -> Result<&Arc<dyn Node>> {
        self.nodes
            .get(id)
            .ok_or_else(|| PetalError::NodeNotFound { id: id.clone() })
    }

    /// Nodes in insertion order, for deterministic iteration.
    pub fn nodes(&self) -> impl Iterator<Item = (&NodeId, &Arc<dyn Node>)> {
        self.order.iter().map(move |id| (id, &self.nodes[id]))
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    /// Successors in edge-insertion order (duplicates already removed at
    /// build time).
    #[must_use]
    pub fn successors(&self, id: &NodeId) -> &[NodeId] {
        self.successors.get(id).map_or(&[], |v| v.as_slice())
    }

    #[must_use]
    pub fn predecessors(&self, id: &NodeId) -> &[NodeId] {
        self.predecessors.get(id).map_or(&[], |v| v.as_slice())
    }

    #[must_use]
    pub fn predecessor_count(&self, id: &NodeId) -> usize {
        self.predecessors(id).len()
    }

    /// Empty graph or missing entry both fail; a compiled `Graph` that
    /// passed `GraphBuilder::build` is always valid, so this mostly
    /// matters for graphs reconstructed by other means (deserialization,
    /// tests constructing a `Graph` directly).
    pub fn validate(&self) -> Result<()> {
        if self.order.is_empty() {
            return Err(PetalError::EmptyGraph);
        }
        if !self.nodes.contains_key(&self.entry) {
            return Err(PetalError::NoEntryNode);
        }
        Ok(())
    }

    /// Strict topological sort: fails with [`PetalError::CycleDetected`]
    /// if any node is unreachable from the ordering (i.e. participates in
    /// a cycle).
    pub fn topological_sort_strict(&self) -> Result<Vec<NodeId>> {
        let sorted = iteration::kahn(&self.order, &self.successors);
        if sorted.len() != self.order.len() {
            return Err(PetalError::CycleDetected);
        }
        Ok(sorted)
    }

    /// Permissive topological sort: returns the subset reachable by
    /// Kahn's algorithm, silently skipping nodes reachable only via
    /// back-edges (§4.1).
    #[must_use]
    pub fn topological_sort_permissive(&self) -> Vec<NodeId> {
        iteration::kahn(&self.order, &self.successors)
    }
}
