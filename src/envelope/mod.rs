//! The envelope: the workflow's shared-nothing value container.
//!
//! An [`Envelope`] is owned by at most one executing node at a time.
//! Divergence onto parallel successors clones it; [`Envelope::clone`] is a
//! deep clone (`messages`, `artifacts`, and `vars` are all value types or
//! cloned collections, never shared behind an `Arc`) so that mutation in
//! one branch is invisible to any other, per the isolation invariant in
//! §3 and testable property 2.

mod route;

pub use route::{GATE_REDIRECT_KEY, RouteDecision, decision_key};

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::node::NodeId;

/// A chat-style message: role plus text content.
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub const USER: &'static str = "user";
    pub const ASSISTANT: &'static str = "assistant";
    pub const SYSTEM: &'static str = "system";

    #[must_use]
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Self::USER, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Self::ASSISTANT, content)
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Self::SYSTEM, content)
    }
}

/// An opaque, content-addressed blob attached to the envelope.
///
/// The engine never interprets `kind` or `text`; they exist purely so
/// nodes can pass larger payloads (documents, tool outputs, rendered
/// templates) alongside the envelope's structured `vars` without the
/// engine needing a storage backend (storage backends are out of scope).
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub kind: String,
    pub text: Option<String>,
}

impl Artifact {
    #[must_use]
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            text: None,
        }
    }

    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }
}

/// A single entry in the envelope's accumulated node-error list.
///
/// Appended when a node fails under `continue_on_error` (§7); the
/// pre-execution envelope otherwise continues forward unchanged.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeErrorRecord {
    pub node: NodeId,
    pub message: String,
    pub hop_count: u32,
}

/// Per-run metadata stamped onto every envelope created for a run.
///
/// `run_id` is set once by the engine and is immutable for the duration
/// of the run, per the invariant in §3.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Trace {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
}

/// The workflow's value container, threaded through a run and cloned at
/// every fan-out.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Envelope {
    pub input: Option<Value>,
    pub messages: Vec<Message>,
    pub artifacts: Vec<Artifact>,
    pub vars: FxHashMap<String, Value>,
    pub node_errors: Vec<NodeErrorRecord>,
    pub trace: Option<Trace>,
}

impl Envelope {
    /// A fresh envelope with no input, stamped with a new trace.
    #[must_use]
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            trace: Some(Trace {
                run_id: run_id.into(),
                started_at: Utc::now(),
            }),
            ..Default::default()
        }
    }

    /// An envelope carrying an initial input value, stamped with a new
    /// trace.
    #[must_use]
    pub fn with_input(run_id: impl Into<String>, input: Value) -> Self {
        let mut env = Self::new(run_id);
        env.input = Some(input);
        env
    }

    #[must_use]
    pub fn run_id(&self) -> Option<&str> {
        self.trace.as_ref().map(|t| t.run_id.as_str())
    }

    /// Set a variable. Overwrites any existing value for `key`.
    pub fn set_var(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.vars.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn get_var(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    pub fn remove_var(&mut self, key: &str) -> Option<Value> {
        self.vars.remove(key)
    }

    pub fn push_message(&mut self, message: Message) -> &mut Self {
        self.messages.push(message);
        self
    }

    pub fn push_artifact(&mut self, artifact: Artifact) -> &mut Self {
        self.artifacts.push(artifact);
        self
    }

    pub fn push_node_error(&mut self, record: NodeErrorRecord) -> &mut Self {
        self.node_errors.push(record);
        self
    }

    /// Stamp the run id onto this envelope, using `started_at` (normally
    /// the run's injected clock, for deterministic-replay testing — see
    /// testable property 7) rather than reading the wall clock directly.
    /// Only the engine should call this, and only once per run (§3's
    /// run-id immutability invariant); it is `pub(crate)` to keep that
    /// true.
    pub(crate) fn stamp_trace(&mut self, run_id: impl Into<String>, started_at: DateTime<Utc>) {
        if self.trace.is_none() {
            self.trace = Some(Trace {
                run_id: run_id.into(),
                started_at,
            });
        }
    }
}
