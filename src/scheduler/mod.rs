//! The scheduler: decides which node runs next, enforces hop limits,
//! drives the step controller, and emits lifecycle events.
//!
//! Two modes share everything except their traversal strategy:
//! [`sequential`] for `concurrency == 1` (a single FIFO queue, §4.3) and
//! [`parallel`] for `concurrency >= 2` (a worker pool plus dispatcher,
//! §4.5). [`run`] picks between them based on [`RunOptions::concurrency`].

mod merge;
mod parallel;
mod sequential;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::instrument;

use crate::envelope::{Envelope, GATE_REDIRECT_KEY, RouteDecision, decision_key};
use crate::error::PetalError;
use crate::event::EventBus;
use crate::graph::Graph;
use crate::node::NodeId;
use crate::step::StepController;

/// A run that did not complete normally, carrying the envelope
/// accumulated up to the point of failure (§7: every abort path "returns
/// the envelope-so-far").
#[derive(Debug)]
pub struct RunFailure {
    pub error: PetalError,
    pub envelope: Envelope,
}

impl std::fmt::Display for RunFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.error.fmt(f)
    }
}

impl std::error::Error for RunFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl RunFailure {
    pub(super) fn new(error: PetalError, envelope: Envelope) -> Self {
        Self { error, envelope }
    }
}

/// The outcome of a [`run`] call: the final envelope, or the envelope
/// accumulated so far plus the error that stopped the run.
pub type RunResult = std::result::Result<Envelope, RunFailure>;

/// A source of timestamps. Defaults to the wall clock; tests inject a
/// fixed or counting clock for deterministic-replay assertions (testable
/// property 7).
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[must_use]
fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Gates whether, and with what timeout, the step controller is
/// consulted at each point (§4.6).
#[derive(Clone)]
pub struct StepConfig {
    pub controller: Arc<dyn StepController>,
    pub before_node: bool,
    pub after_node: bool,
    pub timeout: Option<Duration>,
}

impl StepConfig {
    #[must_use]
    pub fn new(controller: Arc<dyn StepController>) -> Self {
        Self {
            controller,
            before_node: true,
            after_node: true,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_before_node(mut self, enabled: bool) -> Self {
        self.before_node = enabled;
        self
    }

    #[must_use]
    pub fn with_after_node(mut self, enabled: bool) -> Self {
        self.after_node = enabled;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Tunables for a single [`run`] call (§3 "Run options").
#[derive(Clone)]
pub struct RunOptions {
    pub max_hops: u32,
    pub continue_on_error: bool,
    pub concurrency: usize,
    pub clock: Clock,
    pub event_bus: Option<Arc<EventBus>>,
    pub step: Option<StepConfig>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_hops: 100,
            continue_on_error: false,
            concurrency: 1,
            clock: system_clock(),
            event_bus: None,
            step: None,
        }
    }
}

impl RunOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_hops(mut self, max_hops: u32) -> Self {
        self.max_hops = max_hops;
        self
    }

    #[must_use]
    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    #[must_use]
    pub fn with_step(mut self, step: StepConfig) -> Self {
        self.step = Some(step);
        self
    }

    fn emit(&self, event: crate::event::Event) {
        if let Some(bus) = &self.event_bus {
            bus.emit(event.at((self.clock)()));
        }
    }
}

/// Runs `graph` starting from its entry node against `envelope`, selecting
/// sequential or parallel traversal from `options.concurrency`.
///
/// `cancellation` fires when the caller wants the run to stop; the engine
/// imposes no timeout of its own (§5 — "Timeouts are expressed as context
/// deadlines by the caller").
#[instrument(skip_all, fields(graph = %graph.name(), concurrency = options.concurrency), err)]
pub async fn run(
    graph: &Graph,
    envelope: Envelope,
    options: RunOptions,
    cancellation: watch::Receiver<bool>,
) -> RunResult {
    let run_id = uuid::Uuid::new_v4().to_string();
    let mut envelope = envelope;
    envelope.stamp_trace(run_id.clone(), (options.clock)());

    tracing::debug!(run_id = %run_id, graph = %graph.name(), "run started");
    options.emit(crate::event::Event::run_started(run_id.clone()));

    let result = if options.concurrency <= 1 {
        sequential::run(graph, envelope, &options, &run_id, cancellation).await
    } else {
        parallel::run(graph, envelope, &options, &run_id, cancellation).await
    };

    tracing::debug!(run_id = %run_id, ok = result.is_ok(), "run finished");
    options.emit(crate::event::Event::run_finished(run_id));
    result
}

/// Dynamic successor selection (§4.4): gate redirect takes priority over a
/// router's decision, which takes priority over the graph's static
/// successors. Returns the chosen targets and, if a route decision fired,
/// the event to emit for it.
fn select_successors(
    graph: &Graph,
    node_id: &NodeId,
    envelope: &mut Envelope,
) -> (Vec<NodeId>, Option<RouteEvent>) {
    let graph_succ = graph.successors(node_id).to_vec();

    if let Some(target) = envelope.get_var(GATE_REDIRECT_KEY).cloned() {
        envelope.remove_var(GATE_REDIRECT_KEY);
        if let Some(target_id) = target.as_str().map(NodeId::new) {
            if graph_succ.contains(&target_id) {
                return (
                    vec![target_id],
                    Some(RouteEvent {
                        reason: "gate redirect".to_string(),
                        confidence: None,
                    }),
                );
            }
        }
    }

    let decision_var = decision_key(node_id);
    if let Some(raw) = envelope.get_var(&decision_var).cloned() {
        if let Ok(decision) = serde_json::from_value::<RouteDecision>(raw) {
            let targets: Vec<NodeId> = graph_succ
                .iter()
                .filter(|s| decision.targets.contains(s))
                .cloned()
                .collect();
            return (
                targets,
                Some(RouteEvent {
                    reason: decision.reason,
                    confidence: Some(decision.confidence),
                }),
            );
        }
    }

    (graph_succ, None)
}

struct RouteEvent {
    reason: String,
    confidence: Option<f64>,
}

fn is_merge(graph: &Graph, id: &NodeId) -> bool {
    graph.node(id).is_some_and(|n| n.kind().is_merge())
}

/// A merge node's declared `expected_inputs()` if non-zero, else the
/// graph's predecessor count for that node (§4.5).
fn expected_inputs(graph: &Graph, id: &NodeId, declared: usize) -> usize {
    if declared != 0 {
        declared
    } else {
        graph.predecessor_count(id)
    }
}

fn emit_route_event(
    options: &RunOptions,
    run_id: &str,
    node_id: &NodeId,
    targets: &[NodeId],
    event: Option<RouteEvent>,
) {
    if let Some(event) = event {
        tracing::debug!(
            run_id = %run_id,
            node = %node_id,
            targets = ?targets,
            reason = %event.reason,
            confidence = ?event.confidence,
            "route decision"
        );
        options.emit(crate::event::Event::route_decision(
            run_id.to_string(),
            node_id.clone(),
            targets,
            event.reason,
            event.confidence,
        ));
    }
}

/// What a before/after-node step point resolved to: proceed with
/// (possibly mutated) `envelope`, or skip the node but still advance with
/// `envelope`.
enum StepOutcome {
    Continue(Envelope),
    Skip(Envelope),
}

/// Runs one step-point pause: emits `step_paused`, calls the controller
/// with a read-only snapshot of `envelope` (subject to its configured
/// timeout), applies any variable mutations from the response to the
/// caller's own (non-snapshot) copy, and emits `step_resumed`. Returns
/// `Err(reason)` on abort or timeout (§4.6).
///
/// `skip-node` is only meaningful at [`crate::step::StepPoint::BeforeNode`];
/// callers at `AfterNode` should treat a `Skip` outcome the same as
/// `Continue`.
#[instrument(skip_all, fields(run_id = %run_id, node = %node, point = point.as_str(), hop_count), err)]
async fn step_gate(
    options: &RunOptions,
    run_id: &str,
    step: &StepConfig,
    point: crate::step::StepPoint,
    node: NodeId,
    hop_count: u32,
    mut envelope: Envelope,
) -> std::result::Result<StepOutcome, String> {
    use crate::step::{StepAction, StepRequest};

    let snapshot_request = StepRequest {
        point,
        node: node.clone(),
        hop_count,
        envelope: envelope.clone(),
    };
    if !step.controller.should_pause(&snapshot_request).await {
        return Ok(StepOutcome::Continue(envelope));
    }

    tracing::debug!(run_id = %run_id, node = %node, point = point.as_str(), "step paused");
    options.emit(crate::event::Event::step_paused(run_id.to_string(), Some(node.clone()), point.as_str()));

    let step_call = step.controller.step(snapshot_request);
    let response = match step.timeout {
        Some(timeout) => match tokio::time::timeout(timeout, step_call).await {
            Ok(response) => response,
            Err(_) => {
                let reason = "step controller timed out".to_string();
                tracing::debug!(run_id = %run_id, node = %node, "step decision: abort (timeout)");
                options.emit(crate::event::Event::step_aborted(run_id.to_string(), Some(node), reason.clone()));
                return Err(reason);
            }
        },
        None => step_call.await,
    };

    options.emit(crate::event::Event::step_resumed(run_id.to_string(), Some(node.clone()), point.as_str()));
    response.apply_vars(&mut envelope);

    match response.action {
        StepAction::Continue => {
            tracing::debug!(run_id = %run_id, node = %node, "step decision: continue");
            Ok(StepOutcome::Continue(envelope))
        }
        StepAction::SkipNode => {
            tracing::debug!(run_id = %run_id, node = %node, "step decision: skip node");
            Ok(StepOutcome::Skip(envelope))
        }
        StepAction::Abort { reason } => {
            tracing::debug!(run_id = %run_id, node = %node, reason = %reason, "step decision: abort");
            options.emit(crate::event::Event::step_aborted(run_id.to_string(), Some(node), reason.clone()));
            Err(reason)
        }
    }
}
