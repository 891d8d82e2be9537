//! Reserved envelope variable names the engine reads and writes.
//!
//! `<id>_decision` and `__gate_redirect__` couple the engine to node
//! outputs through string-typed variable names. That coupling is
//! acceptable but worth isolating in one small module so the rest of the
//! scheduler never builds these keys by hand (Design Notes, §9).

use serde::{Deserialize, Serialize};

use crate::node::NodeId;

/// The reserved variable a gate node sets to redirect execution to a
/// single successor, bypassing normal graph edges and router decisions.
/// The engine clears this key once it has been consumed.
pub const GATE_REDIRECT_KEY: &str = "__gate_redirect__";

/// Builds the well-known variable name a router node's decision is
/// expected under: `<routerID>_decision`.
#[must_use]
pub fn decision_key(router_id: &NodeId) -> String {
    format!("{router_id}_decision")
}

/// A router node's routing output, written into the envelope under
/// [`decision_key`] before the node returns.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RouteDecision {
    /// Target node identifiers, in the order the router wants them tried.
    pub targets: Vec<NodeId>,
    /// Human-readable justification, surfaced on `route_decision` events.
    pub reason: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
}

impl RouteDecision {
    #[must_use]
    pub fn new(targets: Vec<NodeId>, reason: impl Into<String>, confidence: f64) -> Self {
        Self {
            targets,
            reason: reason.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}
