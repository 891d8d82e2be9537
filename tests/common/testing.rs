//! Shared `Node` fixtures for integration tests. Duplicated from (rather
//! than shared with) the crate's own internal test fixtures in
//! `src/testing.rs`, since integration tests only ever see PetalFlow's
//! public surface.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use petalflow::envelope::{Envelope, GATE_REDIRECT_KEY, RouteDecision, decision_key};
use petalflow::node::{Node, NodeContext, NodeError, NodeId, NodeKind};
use serde_json::{Value, json};

/// Sets `vars[key] = value` and `vars[id] = "processed"`, then returns.
pub struct SetVar {
    pub id: NodeId,
    pub key: &'static str,
    pub value: Value,
}

impl SetVar {
    pub fn new(id: &str, key: &'static str, value: Value) -> Arc<dyn Node> {
        Arc::new(Self { id: NodeId::new(id), key, value })
    }

    pub fn processed(id: &str) -> Arc<dyn Node> {
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

/// Sleeps for `delay` then returns the envelope unchanged.
pub struct Sleep {
    pub id: NodeId,
    pub delay: Duration,
}

#[async_trait]
impl Node for Sleep {
    fn id(&self) -> &NodeId {
        &self.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Noop
    }

    async fn execute(&self, ctx: &NodeContext, envelope: Envelope) -> Result<Envelope, NodeError> {
        tokio::select! {
            () = tokio::time::sleep(self.delay) => Ok(envelope),
            () = ctx.clone().cancelled() => Ok(envelope),
        }
    }
}

/// Records every node id it sees, in arrival order, then returns the
/// envelope unchanged.
#[derive(Clone, Default)]
pub struct CallOrder(pub Arc<Mutex<Vec<NodeId>>>);

impl CallOrder {
    pub fn snapshot(&self) -> Vec<NodeId> {
        self.0.lock().clone()
    }
}

pub struct RecordOrder {
    pub id: NodeId,
    pub log: CallOrder,
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
        self.log.0.lock().push(self.id.clone());
        Ok(envelope)
    }
}

/// Sets both `score` and `source` variables, for best-score merge tests.
pub struct ScoreSource {
    pub id: NodeId,
    pub score: f64,
    pub source: &'static str,
}

#[async_trait]
impl Node for ScoreSource {
    fn id(&self) -> &NodeId {
        &self.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Func
    }

    async fn execute(&self, _ctx: &NodeContext, mut envelope: Envelope) -> Result<Envelope, NodeError> {
        envelope.set_var("score", json!(self.score));
        envelope.set_var("source", json!(self.source));
        Ok(envelope)
    }
}

/// Always fails.
pub struct AlwaysFails {
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

/// Reads `vars["route"]`; if it matches `rule`, routes to `match_target`,
/// otherwise to `default_target`.
pub struct RuleRouter {
    pub id: NodeId,
    pub rule: &'static str,
    pub match_target: NodeId,
    pub default_target: NodeId,
}

#[async_trait]
impl Node for RuleRouter {
    fn id(&self) -> &NodeId {
        &self.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Router
    }

    async fn execute(&self, _ctx: &NodeContext, mut envelope: Envelope) -> Result<Envelope, NodeError> {
        let route = envelope.get_var("route").and_then(Value::as_str).unwrap_or_default();
        let (targets, reason) = if route == self.rule {
            (vec![self.match_target.clone()], "rule matched")
        } else {
            (vec![self.default_target.clone()], "no rule matched")
        };
        let decision = RouteDecision::new(targets, reason, if reason == "rule matched" { 0.95 } else { 0.5 });
        envelope.set_var(decision_key(&self.id), serde_json::to_value(&decision).unwrap());
        Ok(envelope)
    }
}

/// Redirects unconditionally to `target` via the gate-redirect protocol.
pub struct Gate {
    pub id: NodeId,
    pub authorized_var: &'static str,
    pub redirect_if_unauthorized: NodeId,
}

#[async_trait]
impl Node for Gate {
    fn id(&self) -> &NodeId {
        &self.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Gate
    }

    async fn execute(&self, _ctx: &NodeContext, mut envelope: Envelope) -> Result<Envelope, NodeError> {
        let authorized = envelope.get_var(self.authorized_var).and_then(Value::as_bool).unwrap_or(false);
        if !authorized {
            envelope.set_var(GATE_REDIRECT_KEY, json!(self.redirect_if_unauthorized.as_str()));
        }
        Ok(envelope)
    }
}

/// Merges by unioning every input's `vars`; later inputs win on collision.
pub struct JsonMerge {
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

/// Merges by keeping the highest-`score` input.
pub struct BestScoreMerge {
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
