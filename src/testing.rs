//! Shared node fixtures for the scheduler's own test suite.
//!
//! Kept internal (`pub(crate)`, `#[cfg(test)]`) so unit tests across
//! `graph`, `node`, and `scheduler` can build small graphs without each
//! repeating the same handful of `Node` impls. Integration tests under
//! `tests/` keep their own fixtures in `tests/common` instead, since they
//! only see the crate's public surface.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::envelope::{Envelope, RouteDecision, decision_key};
use crate::node::{Node, NodeContext, NodeError, NodeId, NodeKind};

/// Sets a single variable to a literal value and returns.
pub(crate) struct SetVar {
    pub id: NodeId,
    pub key: &'static str,
    pub value: Value,
}

impl SetVar {
    pub(crate) fn new(id: &str, key: &'static str, value: Value) -> Arc<dyn Node> {
        Arc::new(Self { id: NodeId::new(id), key, value })
    }

    pub(crate) fn processed(id: &str) -> Arc<dyn Node> {
        Self::new(id, "marker", json!("processed"))
    }
}

#[async_trait]
impl Node for SetVar {
    fn id(&self) -> &NodeId {
        &self.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Func
    }

    async fn execute(&self, _ctx: &NodeContext, mut envelope: Envelope) -> Result<Envelope, NodeError> {
        envelope.set_var(self.key, self.value.clone());
        envelope.set_var(self.id.as_str(), json!("processed"));
        Ok(envelope)
    }
}

/// Appends `self.id` to a shared call-order log before returning the
/// envelope unchanged. Lets tests assert dispatch ordering without racing
/// on envelope contents.
pub(crate) struct RecordOrder {
    pub id: NodeId,
    pub log: Arc<Mutex<Vec<NodeId>>>,
    pub delay: Duration,
}

#[async_trait]
impl Node for RecordOrder {
    fn id(&self) -> &NodeId {
        &self.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Func
    }

    async fn execute(&self, _ctx: &NodeContext, envelope: Envelope) -> Result<Envelope, NodeError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.log.lock().push(self.id.clone());
        Ok(envelope)
    }
}

/// Always fails with [`NodeError::ValidationFailed`].
pub(crate) struct AlwaysFails {
    pub id: NodeId,
}

#[async_trait]
impl Node for AlwaysFails {
    fn id(&self) -> &NodeId {
        &self.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Func
    }

    async fn execute(&self, _ctx: &NodeContext, _envelope: Envelope) -> Result<Envelope, NodeError> {
        Err(NodeError::ValidationFailed(format!("{} always fails", self.id)))
    }
}

/// Writes a [`RouteDecision`] restricted to `targets` under its own
/// decision key.
pub(crate) struct Router {
    pub id: NodeId,
    pub targets: Vec<NodeId>,
    pub reason: &'static str,
}

#[async_trait]
impl Node for Router {
    fn id(&self) -> &NodeId {
        &self.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Router
    }

    async fn execute(&self, _ctx: &NodeContext, mut envelope: Envelope) -> Result<Envelope, NodeError> {
        let decision = RouteDecision::new(self.targets.clone(), self.reason, 0.9);
        envelope.set_var(decision_key(&self.id), serde_json::to_value(&decision)?);
        Ok(envelope)
    }
}

/// Merges by taking the union of every input envelope's `vars`. Later
/// inputs win on key collision.
pub(crate) struct JsonMerge {
    pub id: NodeId,
}

#[async_trait]
impl Node for JsonMerge {
    fn id(&self) -> &NodeId {
        &self.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Merge
    }

    async fn execute(&self, _ctx: &NodeContext, envelope: Envelope) -> Result<Envelope, NodeError> {
        Ok(envelope)
    }

    async fn merge(&self, _ctx: &NodeContext, inputs: Vec<Envelope>) -> Result<Envelope, NodeError> {
        let mut merged = inputs.first().cloned().unwrap_or_default();
        for input in &inputs {
            for (key, value) in &input.vars {
                merged.set_var(key.clone(), value.clone());
            }
        }
        Ok(merged)
    }
}

/// Merges by keeping the input with the highest `score` variable.
pub(crate) struct BestScoreMerge {
    pub id: NodeId,
}

#[async_trait]
impl Node for BestScoreMerge {
    fn id(&self) -> &NodeId {
        &self.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Merge
    }

    async fn execute(&self, _ctx: &NodeContext, envelope: Envelope) -> Result<Envelope, NodeError> {
        Ok(envelope)
    }

    async fn merge(&self, _ctx: &NodeContext, inputs: Vec<Envelope>) -> Result<Envelope, NodeError> {
        inputs
            .into_iter()
            .max_by(|a, b| {
                let score = |e: &Envelope| e.get_var("score").and_then(Value::as_f64).unwrap_or(f64::MIN);
                score(a).partial_cmp(&score(b)).unwrap_or(std::cmp::Ordering::Equal)
            })
            .ok_or_else(|| NodeError::ValidationFailed("no inputs arrived at merge".to_string()))
    }
}
