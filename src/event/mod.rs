//! The event stream: a closed set of lifecycle events, delivered first to
//! a synchronous push handler and then offered non-blockingly to a
//! bounded pull channel (§4.7).

mod bus;
mod sink;

pub use bus::{EventBus, EventStream, EmitterError};
pub use sink::{EventSink, JsonLinesSink, MemorySink, StdOutSink};

use std::time::Duration;

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::node::{NodeId, NodeKind};

/// The closed set of event kinds the engine emits. Nodes and the step
/// controller never emit events directly; only the scheduler does.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    RunStarted,
    RunFinished,
    NodeStarted,
    NodeFinished,
    NodeFailed,
    RouteDecision,
    StepPaused,
    StepResumed,
    StepSkipped,
    StepAborted,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::RunStarted => "run_started",
            Self::RunFinished => "run_finished",
            Self::NodeStarted => "node_started",
            Self::NodeFinished => "node_finished",
            Self::NodeFailed => "node_failed",
            Self::RouteDecision => "route_decision",
            Self::StepPaused => "step_paused",
            Self::StepResumed => "step_resumed",
            Self::StepSkipped => "step_skipped",
            Self::StepAborted => "step_aborted",
        };
        write!(f, "{s}")
    }
}

/// A single lifecycle event. Every field beyond `kind`/`run_id`/`timestamp`
/// is optional because the ten kinds don't all carry the same metadata
/// (§4.7).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub node_id: Option<NodeId>,
    pub node_kind: Option<NodeKind>,
    pub elapsed: Option<Duration>,
    pub attempt: Option<u32>,
    pub payload: FxHashMap<String, Value>,
}

impl Event {
    fn base(kind: EventKind, run_id: impl Into<String>) -> Self {
        Self {
            kind,
            run_id: run_id.into(),
            timestamp: Utc::now(),
            node_id: None,
            node_kind: None,
            elapsed: None,
            attempt: None,
            payload: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn run_started(run_id: impl Into<String>) -> Self {
        Self::base(EventKind::RunStarted, run_id)
    }

    #[must_use]
    pub fn run_finished(run_id: impl Into<String>) -> Self {
        Self::base(EventKind::RunFinished, run_id)
    }

    #[must_use]
    pub fn node_started(run_id: impl Into<String>, node_id: NodeId, node_kind: NodeKind) -> Self {
        let mut e = Self::base(EventKind::NodeStarted, run_id);
        e.node_id = Some(node_id);
        e.node_kind = Some(node_kind);
        e
    }

    #[must_use]
    pub fn node_finished(
        run_id: impl Into<String>,
        node_id: NodeId,
        node_kind: NodeKind,
        elapsed: Duration,
    ) -> Self {
        let mut e = Self::base(EventKind::NodeFinished, run_id);
        e.node_id = Some(node_id);
        e.node_kind = Some(node_kind);
        e.elapsed = Some(elapsed);
        e
    }

    #[must_use]
    pub fn node_failed(
        run_id: impl Into<String>,
        node_id: NodeId,
        node_kind: NodeKind,
        elapsed: Duration,
        message: impl Into<String>,
    ) -> Self {
        let mut e = Self::base(EventKind::NodeFailed, run_id);
        e.node_id = Some(node_id);
        e.node_kind = Some(node_kind);
        e.elapsed = Some(elapsed);
        e.payload.insert("error".to_string(), Value::String(message.into()));
        e
    }

    #[must_use]
    pub fn route_decision(
        run_id: impl Into<String>,
        node_id: NodeId,
        targets: &[NodeId],
        reason: impl Into<String>,
        confidence: Option<f64>,
    ) -> Self {
        let mut e = Self::base(EventKind::RouteDecision, run_id);
        e.node_id = Some(node_id);
        e.payload.insert(
            "targets".to_string(),
            Value::from(targets.iter().map(|t| t.as_str().to_string()).collect::<Vec<_>>()),
        );
        e.payload.insert("reason".to_string(), Value::String(reason.into()));
        if let Some(c) = confidence {
            e.payload.insert("confidence".to_string(), Value::from(c));
        }
        e
    }

    #[must_use]
    pub fn step_paused(run_id: impl Into<String>, node_id: Option<NodeId>, point: &'static str) -> Self {
        let mut e = Self::base(EventKind::StepPaused, run_id);
        e.node_id = node_id;
        e.payload.insert("point".to_string(), Value::String(point.to_string()));
        e
    }

    #[must_use]
    pub fn step_resumed(run_id: impl Into<String>, node_id: Option<NodeId>, point: &'static str) -> Self {
        let mut e = Self::base(EventKind::StepResumed, run_id);
        e.node_id = node_id;
        e.payload.insert("point".to_string(), Value::String(point.to_string()));
        e
    }

    #[must_use]
    pub fn step_skipped(run_id: impl Into<String>, node_id: NodeId) -> Self {
        let mut e = Self::base(EventKind::StepSkipped, run_id);
        e.node_id = Some(node_id);
        e
    }

    #[must_use]
    pub fn step_aborted(run_id: impl Into<String>, node_id: Option<NodeId>, reason: impl Into<String>) -> Self {
        let mut e = Self::base(EventKind::StepAborted, run_id);
        e.node_id = node_id;
        e.payload.insert("reason".to_string(), Value::String(reason.into()));
        e
    }

    /// Overrides the timestamp stamped at construction. The scheduler
    /// calls this with `RunOptions::clock`'s output so that two runs with
    /// an equal injected clock produce byte-equal event timestamps
    /// (testable property 7).
    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[must_use]
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = Some(attempt);
        self
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.node_id {
            Some(node) => write!(f, "[{}] {} @ {}", self.run_id, self.kind, node),
            None => write!(f, "[{}] {}", self.run_id, self.kind),
        }
    }
}
