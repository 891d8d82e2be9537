//! The node protocol: identifiers, kind tags, and the `Node` trait every
//! unit of work implements.
//!
//! Capabilities are not separate marker traits. A node's *kind* tag and the
//! variables it writes into the returned envelope are what the scheduler
//! inspects at dispatch time (see [`crate::scheduler`]):
//!
//! - A node whose `kind()` is [`NodeKind::Merge`] is never sent through
//!   `execute`; the scheduler accumulates incoming envelopes at that node
//!   and calls [`Node::merge`] once enough have arrived.
//! - Any node may, as a side effect of `execute`, write a [`RouteDecision`]
//!   under `<id>_decision` or set the reserved `__gate_redirect__` variable.
//!   Both are read back out of the envelope, not probed on the trait object.

mod context;
mod id;
mod kind;

pub use context::NodeContext;
pub use id::NodeId;
pub use kind::NodeKind;

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

use crate::envelope::Envelope;

/// The uniform contract every unit of work satisfies.
///
/// Implementors only need `id`, `kind`, and `execute`. `merge` and
/// `expected_inputs` carry default implementations that fail loudly if
/// called on a node that was never meant to act as a barrier — a node
/// whose `kind()` returns anything other than [`NodeKind::Merge`] should
/// never have `merge` invoked by a correctly-behaving scheduler.
#[async_trait]
pub trait Node: Send + Sync {
    /// Stable identifier, unique within the owning graph.
    fn id(&self) -> &NodeId;

    /// The closed-set (plus domain-specific) kind tag for this node.
    fn kind(&self) -> NodeKind;

    /// Execute this node against the given envelope.
    ///
    /// Ordinary nodes implement only this method. The envelope passed in
    /// is owned by the caller for the duration of the call; nodes that
    /// need to branch internally must clone it themselves (the engine
    /// only clones at fan-out).
    async fn execute(&self, ctx: &NodeContext, envelope: Envelope) -> Result<Envelope, NodeError>;

    /// Merge-node barrier operation.
    ///
    /// Invoked by the scheduler once the expected number of incoming
    /// envelopes has arrived at a node whose `kind()` is
    /// [`NodeKind::Merge`]. The default implementation fails with
    /// [`NodeError::NotImplemented`]; real merge nodes must override it.
    async fn merge(&self, _ctx: &NodeContext, _inputs: Vec<Envelope>) -> Result<Envelope, NodeError> {
        Err(NodeError::not_implemented("merge"))
    }

    /// Expected number of incoming branches for a merge node.
    ///
    /// `0` means "use the graph's predecessor count for this node as the
    /// fallback", matching §4.5 of the design: `expected = S.expected_inputs()
    /// if non-zero, else |predecessors(S)|`.
    fn expected_inputs(&self) -> usize {
        0
    }
}

/// Failure surfaced by a node's `execute` or `merge` call.
#[derive(Debug, Error, Diagnostic)]
pub enum NodeError {
    /// A required envelope input (var, message, artifact) was absent.
    #[error("missing input: {what}")]
    #[diagnostic(
        code(petalflow::node::missing_input),
        help("ensure an upstream node populates `{what}` before this node runs")
    )]
    MissingInput { what: &'static str },

    /// A named external collaborator (cache, tool, LLM provider, etc.)
    /// reported failure.
    #[error("{provider} error: {message}")]
    #[diagnostic(code(petalflow::node::provider))]
    Provider { provider: &'static str, message: String },

    /// JSON (de)serialization of envelope content failed.
    #[error(transparent)]
    #[diagnostic(code(petalflow::node::serde))]
    Serde(#[from] serde_json::Error),

    /// The node rejected its input on semantic grounds.
    #[error("validation failed: {0}")]
    #[diagnostic(code(petalflow::node::validation_failed))]
    ValidationFailed(String),

    /// `merge` (or, in principle, `execute`) was called on a node that
    /// does not implement it.
    #[error("{operation} is not implemented for this node")]
    #[diagnostic(
        code(petalflow::node::not_implemented),
        help("only nodes with kind `Merge` should have `merge` invoked on them")
    )]
    NotImplemented { operation: &'static str },

    /// Catch-all for node-defined error types.
    #[error("{0}")]
    #[diagnostic(code(petalflow::node::other))]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl NodeError {
    pub fn not_implemented(operation: &'static str) -> Self {
        Self::NotImplemented { operation }
    }

    pub fn provider(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
        }
    }
}
