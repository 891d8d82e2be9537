//! # PetalFlow: a graph execution engine for typed workflow nodes
//!
//! PetalFlow runs directed graphs of [`Node`](node::Node) implementations
//! that carry a shared, cloneable [`Envelope`](envelope::Envelope) from an
//! entry node toward terminal nodes. It schedules parallel branches,
//! enforces barrier-style merges of unknown in-degree, supports dynamic
//! routing and one-shot gate redirects, and emits a lifecycle event stream
//! a caller can both subscribe to synchronously and drain as a channel.
//!
//! The crate is deliberately narrow: it owns the scheduler, the envelope's
//! clone-at-fan-out isolation discipline, the merge barrier protocol, and
//! the event stream. Concrete node implementations (LLM calls, tool
//! invocations, caches, human-approval steps, ...) are callers'
//! responsibility; PetalFlow only specifies the [`Node`](node::Node)
//! contract they implement.
//!
//! ## Core concepts
//!
//! - **Envelope** — the workflow's value container, cloned before every
//!   fan-out so that mutation in one branch is invisible to its siblings.
//! - **Graph** — an immutable-at-run collection of nodes and directed
//!   edges, built fallibly via [`GraphBuilder`](graph::GraphBuilder).
//! - **Node** — the uniform unit of work; `execute` for ordinary nodes,
//!   `merge` for barrier nodes reached via [`NodeKind::Merge`](node::NodeKind::Merge).
//! - **Scheduler** — [`scheduler::run`] picks sequential or bounded-parallel
//!   traversal from `RunOptions::concurrency` and drives the graph from its
//!   entry node to termination.
//! - **Event stream** — a closed ten-kind lifecycle log, delivered to a
//!   synchronous handler first and then offered, non-blockingly, to a
//!   bounded pull channel.
//! - **Step controller** — an optional hook that can pause a run before or
//!   after any node, inspect the in-flight envelope, and mutate it, skip
//!   the node, or abort the run.
//!
//! ## Quick start
//!
//! ```
//! use petalflow::envelope::Envelope;
//! use petalflow::graph::GraphBuilder;
//! use petalflow::node::{Node, NodeContext, NodeError, NodeId, NodeKind};
//! use petalflow::scheduler::{self, RunOptions};
//! use async_trait::async_trait;
//! use serde_json::json;
//! use std::sync::Arc;
//! use tokio::sync::watch;
//!
//! struct SetVar(NodeId, &'static str);
//!
//! #[async_trait]
//! impl Node for SetVar {
//!     fn id(&self) -> &NodeId {
//!         &self.0
//!     }
//!
//!     fn kind(&self) -> NodeKind {
//!         NodeKind::Func
//!     }
//!
//!     async fn execute(&self, _ctx: &NodeContext, mut envelope: Envelope) -> Result<Envelope, NodeError> {
//!         envelope.set_var(self.0.as_str(), json!(self.1));
//!         Ok(envelope)
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let graph = GraphBuilder::new("linear-chain")
//!     .add_node(Arc::new(SetVar(NodeId::new("a"), "processed")))?
//!     .add_node(Arc::new(SetVar(NodeId::new("b"), "processed")))?
//!     .add_edge("a", "b")?
//!     .set_entry("a")?
//!     .build()?;
//!
//! let (_tx, cancellation) = watch::channel(false);
//! let result = scheduler::run(&graph, Envelope::default(), RunOptions::default(), cancellation).await?;
//! assert_eq!(result.get_var("a"), Some(&json!("processed")));
//! assert_eq!(result.get_var("b"), Some(&json!("processed")));
//! # Ok(())
//! # }
//! ```
//!
//! ## Module guide
//!
//! - [`envelope`] - the shared-nothing value container, its `Message` and
//!   `Artifact` records, and the reserved routing variables.
//! - [`graph`] - graph construction, validation, and topological sort.
//! - [`node`] - the `Node` trait, identifiers, kind tags, and execution
//!   context.
//! - [`event`] - the closed event-kind enum, the bus that fans it out, and
//!   the sink implementations.
//! - [`step`] - the step-controller trait and its request/response types.
//! - [`scheduler`] - `RunOptions`, the sequential and parallel executors,
//!   and the run-level error type.
//! - [`error`] - the sentinel [`PetalError`](error::PetalError) enum
//!   callers match against by variant, never by message text.

pub mod envelope;
pub mod error;
pub mod event;
pub mod graph;
pub mod node;
pub mod scheduler;
pub mod step;

#[cfg(test)]
pub(crate) mod testing;

pub use envelope::Envelope;
pub use error::PetalError;
pub use graph::{Graph, GraphBuilder};
pub use node::{Node, NodeContext, NodeError, NodeId, NodeKind};
pub use scheduler::{RunOptions, run};
