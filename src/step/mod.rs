//! The step controller: an optional hook that lets a caller pause a run
//! before or after each node, inspect the in-flight envelope, and decide
//! whether to continue, skip the node, or abort the run (§4.6).
//!
//! A run with no [`StepController`] configured behaves exactly as if every
//! call to `should_pause` returned `false` — the scheduler never pays for
//! the indirection unless a caller asks for it.

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::envelope::Envelope;
use crate::node::NodeId;

/// Which side of a node's execution a pause point corresponds to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepPoint {
    BeforeNode,
    AfterNode,
}

impl StepPoint {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BeforeNode => "before_node",
            Self::AfterNode => "after_node",
        }
    }
}

/// What the scheduler hands the controller at a pause point.
#[derive(Debug)]
pub struct StepRequest {
    pub point: StepPoint,
    pub node: NodeId,
    pub hop_count: u32,
    pub envelope: Envelope,
}

/// What the controller decides.
#[derive(Debug)]
pub enum StepAction {
    /// Proceed normally.
    Continue,
    /// Skip this node entirely; the envelope passes through unchanged to
    /// successor selection as if the node had returned it verbatim.
    SkipNode,
    /// Stop the run. The envelope accumulated so far is still returned to
    /// the caller, wrapped alongside [`crate::error::PetalError::StepAborted`].
    Abort { reason: String },
}

/// The controller's full decision: an action plus any variable mutations
/// to apply to the envelope before the scheduler resumes.
#[derive(Debug)]
pub struct StepResponse {
    pub action: StepAction,
    pub set_vars: FxHashMap<String, Value>,
    pub delete_vars: Vec<String>,
}

impl StepResponse {
    #[must_use]
    pub fn continue_run() -> Self {
        Self {
            action: StepAction::Continue,
            set_vars: FxHashMap::default(),
            delete_vars: Vec::new(),
        }
    }

    #[must_use]
    pub fn skip_node() -> Self {
        Self {
            action: StepAction::SkipNode,
            set_vars: FxHashMap::default(),
            delete_vars: Vec::new(),
        }
    }

    #[must_use]
    pub fn abort(reason: impl Into<String>) -> Self {
        Self {
            action: StepAction::Abort { reason: reason.into() },
            set_vars: FxHashMap::default(),
            delete_vars: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_set_var(mut self, key: impl Into<String>, value: Value) -> Self {
        self.set_vars.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_delete_var(mut self, key: impl Into<String>) -> Self {
        self.delete_vars.push(key.into());
        self
    }

    /// Applies the accumulated variable mutations to `envelope`, deletes
    /// taking precedence over sets for the same key.
    pub(crate) fn apply_vars(&self, envelope: &mut Envelope) {
        for (key, value) in &self.set_vars {
            envelope.set_var(key.clone(), value.clone());
        }
        for key in &self.delete_vars {
            envelope.remove_var(key);
        }
    }
}

/// A caller-supplied debugger hook.
///
/// `should_pause` is consulted first, on the scheduler's hot path, for
/// every node at every [`StepPoint`]; it should be cheap. `step` is only
/// called when `should_pause` returns `true`, and may legitimately take as
/// long as a human needs to respond (e.g. awaiting a UI action).
#[async_trait]
pub trait StepController: Send + Sync {
    async fn should_pause(&self, request: &StepRequest) -> bool;

    async fn step(&self, request: StepRequest) -> StepResponse;
}
