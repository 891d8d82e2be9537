//! Sequential scheduler: one FIFO queue, one node in flight at a time
//! (§4.3).
//!
//! Each queue entry carries its own envelope rather than all nodes
//! sharing a single mutable "current" envelope. With only one worker
//! there is never more than one node executing at a time, so carrying a
//! per-entry envelope costs nothing and lets fan-out/merge share
//! identical isolation semantics with [`super::parallel`] (see
//! `DESIGN.md` for the reasoning behind this reading of §4.3).
//!
//! A merge node's queue entries are arrivals, not executions: each one is
//! handed to the barrier, and only the arrival that completes the
//! expected count actually runs `merge` and proceeds through the rest of
//! the pipeline (hop-count, step points, events, successor selection).

use std::collections::VecDeque;
use std::time::Instant;

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
    let mut queue: VecDeque<(NodeId, Envelope)> = VecDeque::new();
    queue.push_back((graph.entry().clone(), envelope));
    let mut last_envelope: Option<Envelope> = None;

    while let Some((node_id, arrival)) = queue.pop_front() {
        let previous_hops = hop_counts.get(&node_id).copied().unwrap_or(0);
        if previous_hops >= options.max_hops && previous_hops > 0 {
            // Already at the limit from an earlier execution: skip
            // silently rather than fail again (§9, "skip unless hop-count
            // below limit").
            last_envelope = Some(arrival);
            continue;
        }

        let node = match graph.get_node(&node_id) {
            Ok(node) => node.clone(),
            Err(err) => return Err(RunFailure::new(err, last_envelope.unwrap_or(arrival))),
        };

        let mut envelope = if is_merge(graph, &node_id) {
            let expected = expected_inputs(graph, &node_id, node.expected_inputs());
            match merge_barrier.arrive(&node_id, arrival, expected) {
                Some(inputs) => {
                    if *cancellation.borrow() {
                        return Err(RunFailure::new(PetalError::RunCanceled, last_envelope.unwrap_or_default()));
                    }
                    tracing::debug!(run_id = %run_id, node = %node_id, inputs = inputs.len(), "merge barrier fired");
                    let hop_count = previous_hops + 1;
                    hop_counts.insert(node_id.clone(), hop_count);
                    let ctx = NodeContext::new(node_id.clone(), run_id.to_string(), hop_count, cancellation.clone());
                    let started = Instant::now();
                    options.emit(Event::node_started(run_id.to_string(), node_id.clone(), node.kind()).with_attempt(hop_count));
                    match node.merge(&ctx, inputs.clone()).await {
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
                                let mut fallback = inputs.into_iter().next().unwrap_or_default();
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
                    }
                }
                None => {
                    // Still waiting on other branches.
                    continue;
                }
            }
        } else {
            if *cancellation.borrow() {
                return Err(RunFailure::new(PetalError::RunCanceled, last_envelope.unwrap_or(arrival)));
            }

            let hop_count = previous_hops + 1;
            hop_counts.insert(node_id.clone(), hop_count);
            if hop_count > options.max_hops {
                return Err(RunFailure::new(
                    PetalError::MaxHopsExceeded { node: node_id.clone(), limit: options.max_hops },
                    last_envelope.unwrap_or(arrival),
                ));
            }

            let mut envelope = arrival;
            if let Some(step) = &options.step {
                if step.before_node {
                    match step_gate(options, run_id, step, StepPoint::BeforeNode, node_id.clone(), hop_count, envelope).await {
                        Ok(StepOutcome::Continue(e)) => envelope = e,
                        Ok(StepOutcome::Skip(e)) => {
                            options.emit(Event::step_skipped(run_id.to_string(), node_id.clone()));
                            let mut e = e;
                            let (successors, route_event) = select_successors(graph, &node_id, &mut e);
                            emit_route_event(options, run_id, &node_id, &successors, route_event);
                            for successor in successors {
                                queue.push_back((successor, e.clone()));
                            }
                            last_envelope = Some(e);
                            continue;
                        }
                        Err(reason) => {
                            return Err(RunFailure::new(
                                PetalError::StepAborted { reason },
                                last_envelope.unwrap_or_default(),
                            ));
                        }
                    }
                }
            }

            let ctx = NodeContext::new(node_id.clone(), run_id.to_string(), hop_count, cancellation.clone());
            let started = Instant::now();
            options.emit(Event::node_started(run_id.to_string(), node_id.clone(), node.kind()).with_attempt(hop_count));
            match node.execute(&ctx, envelope.clone()).await {
                Ok(result) => {
                    options.emit(
                        Event::node_finished(run_id.to_string(), node_id.clone(), node.kind(), started.elapsed())
                            .with_attempt(hop_count),
                    );
                    result
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
                        envelope.push_node_error(NodeErrorRecord {
                            node: node_id.clone(),
                            message: source.to_string(),
                            hop_count,
                        });
                        envelope
                    } else {
                        return Err(RunFailure::new(
                            PetalError::NodeExecution { node: node_id.clone(), source },
                            envelope,
                        ));
                    }
                }
            }
        };

        if let Some(step) = &options.step {
            if step.after_node {
                let hop_count = hop_counts.get(&node_id).copied().unwrap_or(0);
                match step_gate(options, run_id, step, StepPoint::AfterNode, node_id.clone(), hop_count, envelope).await {
                    Ok(StepOutcome::Continue(e) | StepOutcome::Skip(e)) => envelope = e,
                    Err(reason) => {
                        return Err(RunFailure::new(PetalError::StepAborted { reason }, last_envelope.unwrap_or_default()));
                    }
                }
            }
        }

        let (successors, route_event) = select_successors(graph, &node_id, &mut envelope);
        emit_route_event(options, run_id, &node_id, &successors, route_event);
        for successor in successors {
            queue.push_back((successor, envelope.clone()));
        }
        last_envelope = Some(envelope);
    }

    Ok(last_envelope.unwrap_or_default())
}
