use tokio::sync::watch;

use super::NodeId;

/// Read-only execution context handed to a node's `execute`/`merge` call.
///
/// Nodes may read their own hop-count and check for cancellation but
/// cannot mutate either — both are scheduler-owned. A cancelled node is
/// expected to return promptly; the scheduler does not forcibly abort
/// in-flight node futures (see §5: "their completion ... is awaited
/// before the engine returns").
#[derive(Clone)]
pub struct NodeContext {
    node_id: NodeId,
    run_id: String,
    hop_count: u32,
    cancellation: watch::Receiver<bool>,
}

impl NodeContext {
    pub(crate) fn new(
        node_id: NodeId,
        run_id: String,
        hop_count: u32,
        cancellation: watch::Receiver<bool>,
    ) -> Self {
        Self {
            node_id,
            run_id,
            hop_count,
            cancellation,
        }
    }

    #[must_use]
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    #[must_use]
    pub fn hop_count(&self) -> u32 {
        self.hop_count
    }

    /// True once the run's cancellation signal has fired.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        *self.cancellation.borrow()
    }

    /// Resolves once cancellation fires, for nodes that want to race it
    /// against their own I/O rather than poll `is_canceled`.
    pub async fn cancelled(&mut self) {
        let _ = self.cancellation.wait_for(|v| *v).await;
    }
}
