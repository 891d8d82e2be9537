//! Delivery: synchronous push handlers first, then a best-effort offer to
//! a bounded pull channel.
//!
//! Push handlers ([`EventSink`]) run inline and cannot be backpressured —
//! they must keep up or drop events themselves. The pull channel is
//! bounded and non-blocking: a full channel means the event is dropped for
//! that consumer, never that the run stalls (§4.7). This is a deliberate
//! departure from a broadcast channel's per-receiver lag tracking: every
//! consumer here either gets the event or doesn't, with no "you missed N"
//! bookkeeping.

use std::sync::Arc;

use thiserror::Error;

use super::{Event, EventSink};

/// Failure talking to the event channel. Most callers never see this —
/// [`EventBus::emit`] swallows a full or closed channel itself. It exists
/// for the rare caller that emits directly and wants to know why delivery
/// failed.
#[derive(Debug, Error)]
pub enum EmitterError {
    #[error("event channel is closed")]
    Closed,
    #[error("{0}")]
    Other(String),
}

/// Fans a run's events out to zero or more synchronous sinks and one
/// bounded pull channel.
pub struct EventBus {
    sinks: Vec<Arc<dyn EventSink>>,
    sender: flume::Sender<Event>,
}

impl EventBus {
    /// Builds a bus and its paired stream. `capacity` bounds the pull
    /// channel; once full, further `emit` calls drop the new event rather
    /// than block (§4.7).
    #[must_use]
    pub fn new(capacity: usize) -> (Self, EventStream) {
        let (sender, receiver) = flume::bounded(capacity);
        (
            Self {
                sinks: Vec::new(),
                sender,
            },
            EventStream { receiver },
        )
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    #[must_use]
    pub fn with_sinks(mut self, sinks: impl IntoIterator<Item = Arc<dyn EventSink>>) -> Self {
        self.sinks.extend(sinks);
        self
    }

    /// Delivers `event` to every registered sink, in registration order,
    /// then offers it to the pull channel. Never blocks and never
    /// propagates a full or closed channel as an error — callers that care
    /// should watch [`EventStream`] directly.
    pub fn emit(&self, event: Event) {
        if let Err(err) = self.try_emit(event) {
            tracing::trace!(%err, "event channel full or closed, event dropped for pull consumers");
        }
    }

    /// Same delivery as [`EventBus::emit`], but surfaces whether the pull
    /// channel accepted the event instead of swallowing the outcome. The
    /// scheduler always uses `emit`; this is for callers outside the
    /// scheduler's hot path that want to notice backpressure.
    pub fn try_emit(&self, event: Event) -> Result<(), EmitterError> {
        for sink in &self.sinks {
            sink.handle(&event);
        }
        self.sender.try_send(event).map_err(|err| match err {
            flume::TrySendError::Full(_) => EmitterError::Other("pull channel full".to_string()),
            flume::TrySendError::Disconnected(_) => EmitterError::Closed,
        })
    }
}

/// The bounded pull side of an [`EventBus`].
pub struct EventStream {
    receiver: flume::Receiver<Event>,
}

impl EventStream {
    /// Awaits the next event. Resolves to `None` once the paired
    /// [`EventBus`] is dropped and the channel drains.
    pub async fn recv(&self) -> Option<Event> {
        self.receiver.recv_async().await.ok()
    }

    /// Non-blocking poll; `None` if the channel is empty (whether or not
    /// it is also closed).
    #[must_use]
    pub fn try_recv(&self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::MemorySink;

    #[tokio::test]
    async fn sinks_see_events_before_the_channel() {
        let memory = Arc::new(MemorySink::new());
        let (bus, stream) = EventBus::new(4).with_sink(memory.clone());
        bus.emit(Event::run_started("run-1"));

        assert_eq!(memory.snapshot().len(), 1);
        let received = stream.recv().await.expect("event delivered");
        assert_eq!(received.run_id, "run-1");
    }

    #[tokio::test]
    async fn full_channel_drops_new_events_without_blocking() {
        let (bus, stream) = EventBus::new(1);
        bus.emit(Event::run_started("run-1"));
        bus.emit(Event::run_finished("run-1"));

        let first = stream.recv().await.expect("first event delivered");
        assert_eq!(first.kind, super::super::EventKind::RunStarted);
        assert!(stream.try_recv().is_none());
    }
}
