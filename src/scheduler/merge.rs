//! Barrier accumulation for merge-kind nodes, shared by both scheduler
//! modes (§4.2, §4.5).

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::envelope::Envelope;
use crate::node::NodeId;

/// Tracks envelopes arriving at each merge node until the expected count
/// is reached, then hands the accumulated batch to the caller.
#[derive(Default)]
pub(super) struct MergeBarrier {
    inputs: Mutex<FxHashMap<NodeId, Vec<Envelope>>>,
}

impl MergeBarrier {
    pub(super) fn new() -> Self {
        Self::default()
    }

    /// Records `envelope` as having arrived at merge node `id`. If this
    /// brings the accumulated count to `expected` or beyond, drains and
    /// returns the full batch — the caller should invoke `merge` on it
    /// exactly once. Returns `None` while still waiting on more branches.
    pub(super) fn arrive(&self, id: &NodeId, envelope: Envelope, expected: usize) -> Option<Vec<Envelope>> {
        let mut guard = self.inputs.lock();
        let batch = guard.entry(id.clone()).or_default();
        batch.push(envelope);
        let arrived = batch.len();
        if arrived >= expected.max(1) {
            tracing::trace!(node = %id, arrived, expected, "merge barrier satisfied");
            guard.remove(id)
        } else {
            tracing::trace!(node = %id, arrived, expected, "merge barrier waiting");
            None
        }
    }
}
