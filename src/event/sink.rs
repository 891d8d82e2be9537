//! Push-handler implementations. A sink is handed every event
//! synchronously, in emission order, before the event is offered to the
//! bounded pull channel.

use std::fmt;
use std::fs::File;
use std::io::Write as _;
use std::sync::Arc;

use parking_lot::Mutex;

use super::Event;

/// A synchronous event handler. Implementations must not block for long —
/// they run inline on the scheduler's hot path.
pub trait EventSink: Send + Sync {
    fn handle(&self, event: &Event);

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Writes a one-line rendering of each event to stdout.
#[derive(Debug, Default)]
pub struct StdOutSink;

impl EventSink for StdOutSink {
    fn handle(&self, event: &Event) {
        println!("{event}");
    }
}

/// Buffers every event it sees in memory, for tests and inspection.
#[derive(Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl fmt::Debug for MemorySink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemorySink")
            .field("len", &self.events.lock().len())
            .finish()
    }
}

impl EventSink for MemorySink {
    fn handle(&self, event: &Event) {
        self.events.lock().push(event.clone());
    }
}

/// Writes one JSON object per line, either to a file or to stdout.
pub struct JsonLinesSink {
    target: Mutex<JsonLinesTarget>,
}

enum JsonLinesTarget {
    Stdout,
    File(File),
}

impl JsonLinesSink {
    #[must_use]
    pub fn to_stdout() -> Self {
        Self {
            target: Mutex::new(JsonLinesTarget::Stdout),
        }
    }

    pub fn to_file(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            target: Mutex::new(JsonLinesTarget::File(file)),
        })
    }

    fn write_line(&self, line: &str) {
        let mut target = self.target.lock();
        let result = match &mut *target {
            JsonLinesTarget::Stdout => {
                let mut out = std::io::stdout();
                writeln!(out, "{line}")
            }
            JsonLinesTarget::File(file) => writeln!(file, "{line}"),
        };
        if let Err(err) = result {
            tracing::warn!(%err, "json lines sink failed to write event");
        }
    }
}

impl fmt::Debug for JsonLinesSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonLinesSink").finish_non_exhaustive()
    }
}

impl EventSink for JsonLinesSink {
    fn handle(&self, event: &Event) {
        match serde_json::to_string(event) {
            Ok(line) => self.write_line(&line),
            Err(err) => tracing::warn!(%err, "failed to serialize event"),
        }
    }
}
