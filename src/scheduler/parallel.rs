//! Parallel scheduler: up to `concurrency` node executions in flight at
//! once, with a single dispatcher making all routing decisions (§4.5).
//!
//! Workers here are cooperative futures polled via
//! [`FuturesUnordered`], not spawned tasks: the graph and scheduler
//! bookkeeping are borrowed for the duration of the call rather than
//! `Arc`-wrapped, which keeps the call signature symmetric with
//! [`super::sequential::run`] and avoids `'static`/`Send` plumbing a
//! channel-and-thread pool would need. Concurrency here means "up to N
//! node executions awaiting concurrently" (useful when `execute`
//! overlaps I/O), not N OS threads; nothing in the design calls for
//! the latter, and the dispatcher loop below is itself single-threaded
//! exactly as §4.5 describes ("a single dispatcher").

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Instant;

use futures_util::future::Future;
use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use rustc_hash::FxHashMap;
use tokio::sync::watch;
use tracing::instrument;

use super::merge::MergeBarrier;
use super::{RunFailure, RunOptions, RunResult, StepOutcome, emit_route_event, expected_inputs, is_merge, select_successors, step_gate};
use crate::envelope::{Envelope, NodeErrorRecord};
use crate::error::PetalError;
use crate::event::Event;
use crate::graph::Graph;
use crate::node::{NodeContext, NodeId};
use crate::step::StepPoint;

struct WorkerResult {
    node_id: NodeId,
    hop_count: u32,
    pre_execution: Envelope,
    outcome: std::result::Result<Envelope, crate::node::NodeError>,
}

type WorkerFuture<'a> = Pin<Box<dyn Future<Output = WorkerResult> + 'a>>;

#[instrument(skip_all, fields(run_id = %run_id, graph = %graph.name()), err)]
pub(super) async fn run(
    graph: &Graph,
    envelope: Envelope,
    options: &RunOptions,
    run_id: &str,
    cancellation: watch::Receiver<bool>,
) -> RunResult {
    let mut hop_counts: FxHashMap<NodeId, u32> = FxHashMap::default();
    let merge_barrier = MergeBarrier::new();
    let mut pending: VecDeque<(NodeId, Envelope)> = VecDeque::new();
    pending.push_back((graph.entry().clone(), envelope));
    let mut in_flight: FuturesUnordered<WorkerFuture<'_>> = FuturesUnordered::new();
    let mut last_envelope: Option<Envelope> = None;

    loop {
        if *cancellation.borrow() {
            tracing::debug!(run_id = %run_id, in_flight = in_flight.len(), "cancellation observed, draining in-flight workers");
            // §5: "Workers in flight are signalled via the same context;
            // their completion (with or without error) is awaited before
            // the engine returns." Drain rather than drop so partial
            // progress from already-dispatched nodes lands in the
            // returned envelope.
            while let Some(result) = in_flight.next().await {
                if let Ok(envelope) = result.outcome {
                    last_envelope = Some(envelope);
                }
            }
            return Err(RunFailure::new(PetalError::RunCanceled, last_envelope.unwrap_or_default()));
        }

        while in_flight.len() < options.concurrency.max(1) {
            let Some((node_id, arrival)) = pending.pop_front() else { break };

            if is_merge(graph, &node_id) {
                let node = match graph.get_node(&node_id) {
                    Ok(node) => node.clone(),
                    Err(err) => return Err(RunFailure::new(err, last_envelope.unwrap_or(arrival))),
                };
                let expected = expected_inputs(graph, &node_id, node.expected_inputs());
                let Some(inputs) = merge_barrier.arrive(&node_id, arrival, expected) else {
                    continue;
                };
                tracing::debug!(run_id = %run_id, node = %node_id, inputs = inputs.len(), "merge barrier fired");

                let previous_hops = hop_counts.get(&node_id).copied().unwrap_or(0);
                let hop_count = previous_hops + 1;
                hop_counts.insert(node_id.clone(), hop_count);

                let ctx = NodeContext::new(node_id.clone(), run_id.to_string(), hop_count, cancellation.clone());
                let started = Instant::now();
                options.emit(Event::node_started(run_id.to_string(), node_id.clone(), node.kind()).with_attempt(hop_count));
                let fallback = inputs.first().cloned().unwrap_or_default();
                let merged = match node.merge(&ctx, inputs).await {
                    Ok(merged) => {
                        options.emit(
                            Event::node_finished(run_id.to_string(), node_id.clone(), node.kind(), started.elapsed())
                                .with_attempt(hop_count),
                        );
                        merged
                    }
                    Err(source) => {
                        options.emit(
                            Event::node_failed(
                                run_id.to_string(),
                                node_id.clone(),
                                node.kind(),
                                started.elapsed(),
                                source.to_string(),
                            )
                            .with_attempt(hop_count),
                        );
                        if options.continue_on_error {
                            let mut fallback = fallback;
                            fallback.push_node_error(NodeErrorRecord {
                                node: node_id.clone(),
                                message: source.to_string(),
                                hop_count,
                            });
                            fallback
                        } else {
                            return Err(RunFailure::new(
                                PetalError::NodeExecution { node: node_id.clone(), source },
                                last_envelope.unwrap_or_default(),
                            ));
                        }
                    }
                };

                match route_and_enqueue(graph, options, run_id, &node_id, merged, &mut pending).await {
                    Ok(envelope) => last_envelope = Some(envelope),
                    Err(failure) => return Err(failure),
                }
                continue;
            }

            let previous_hops = hop_counts.get(&node_id).copied().unwrap_or(0);
            let hop_count = previous_hops + 1;
            if hop_count > options.max_hops {
                // Per §4.5: prune this branch rather than abort the run.
                continue;
            }
            hop_counts.insert(node_id.clone(), hop_count);

            let envelope = match &options.step {
                Some(step) if step.before_node => {
                    match step_gate(options, run_id, step, StepPoint::BeforeNode, node_id.clone(), hop_count, arrival).await {
                        Ok(StepOutcome::Continue(e)) => e,
                        Ok(StepOutcome::Skip(e)) => {
                            options.emit(Event::step_skipped(run_id.to_string(), node_id.clone()));
                            match route_and_enqueue(graph, options, run_id, &node_id, e, &mut pending).await {
                                Ok(envelope) => last_envelope = Some(envelope),
                                Err(failure) => return Err(failure),
                            }
                            continue;
                        }
                        Err(reason) => {
                            return Err(RunFailure::new(PetalError::StepAborted { reason }, last_envelope.unwrap_or_default()));
                        }
                    }
                }
                _ => arrival,
            };

            let node = match graph.get_node(&node_id) {
                Ok(node) => node.clone(),
                Err(err) => return Err(RunFailure::new(err, last_envelope.unwrap_or(envelope))),
            };
            let node_id_for_future = node_id.clone();
            let run_id_owned = run_id.to_string();
            let ctx_cancellation = cancellation.clone();
            let events = options;
            let future: WorkerFuture<'_> = Box::pin(async move {
                let ctx = NodeContext::new(node_id_for_future.clone(), run_id_owned.clone(), hop_count, ctx_cancellation);
                let started = Instant::now();
                events.emit(
                    Event::node_started(run_id_owned.clone(), node_id_for_future.clone(), node.kind())
                        .with_attempt(hop_count),
                );
                let outcome = node.execute(&ctx, envelope.clone()).await;
                match &outcome {
                    Ok(_) => events.emit(
                        Event::node_finished(run_id_owned.clone(), node_id_for_future.clone(), node.kind(), started.elapsed())
                            .with_attempt(hop_count),
                    ),
                    Err(source) => events.emit(
                        Event::node_failed(
                            run_id_owned,
                            node_id_for_future.clone(),
                            node.kind(),
                            started.elapsed(),
                            source.to_string(),
                        )
                        .with_attempt(hop_count),
                    ),
                }
                WorkerResult { node_id: node_id_for_future, hop_count, pre_execution: envelope, outcome }
            });
            in_flight.push(future);
        }

        let Some(result) = in_flight.next().await else {
            break;
        };

        let WorkerResult { node_id, hop_count, pre_execution, outcome } = result;
        let mut envelope = match outcome {
            Ok(result) => result,
            Err(source) => {
                if options.continue_on_error {
                    let mut envelope = pre_execution;
                    envelope.push_node_error(NodeErrorRecord { node: node_id.clone(), message: source.to_string(), hop_count });
                    envelope
                } else {
                    return Err(RunFailure::new(PetalError::NodeExecution { node: node_id, source }, last_envelope.unwrap_or_default()));
                }
            }
        };

        if let Some(step) = &options.step {
            if step.after_node {
                match step_gate(options, run_id, step, StepPoint::AfterNode, node_id.clone(), hop_count, envelope).await {
                    Ok(StepOutcome::Continue(e) | StepOutcome::Skip(e)) => envelope = e,
                    Err(reason) => {
                        return Err(RunFailure::new(PetalError::StepAborted { reason }, last_envelope.unwrap_or_default()));
                    }
                }
            }
        }

        match route_and_enqueue(graph, options, run_id, &node_id, envelope, &mut pending).await {
            Ok(envelope) => last_envelope = Some(envelope),
            Err(failure) => return Err(failure),
        }
    }

    Ok(last_envelope.unwrap_or_default())
}

/// Computes dynamic successors for `node_id`'s result envelope, emits the
/// route-decision event if one fired, and pushes `(successor, clone)`
/// pairs onto `pending`. Returns the envelope unchanged (ownership
/// passes back to the caller to track as `last_envelope`).
async fn route_and_enqueue(
    graph: &Graph,
    options: &RunOptions,
    run_id: &str,
    node_id: &NodeId,
    mut envelope: Envelope,
    pending: &mut VecDeque<(NodeId, Envelope)>,
) -> std::result::Result<Envelope, RunFailure> {
    let (successors, route_event) = select_successors(graph, node_id, &mut envelope);
    emit_route_event(options, run_id, node_id, &successors, route_event);
    for successor in successors {
        pending.push_back((successor, envelope.clone()));
    }
    Ok(envelope)
}
