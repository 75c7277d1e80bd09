use crate::core::dispatch::Observer;
use crate::core::types::{LogEvent, get_current_thread_id};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

const DEFAULT_SHARDS: usize = 8;

/// Append-only recorder for emitted events
///
/// Writers are spread across several independently locked shards, picked by
/// the writing thread's ID, so concurrent appends from different threads do
/// not all queue on one lock. Reads merge every shard and are meant to run
/// after all writers are done.
///
/// # Example
///
/// ```rust
/// use oncelog::{EventSink, LogEvent};
///
/// let sink = EventSink::new();
/// sink.record(LogEvent::new("app.db", "connected"));
/// assert_eq!(sink.len(), 1);
/// assert_eq!(sink.read_all()[0].message, "connected");
/// ```
pub struct EventSink {
    shards: Box<[Mutex<Vec<LogEvent>>]>,
    len: AtomicUsize,
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink {
    /// Create an empty sink with the default shard count
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }

    /// Create an empty sink with `shards` append shards (at least one)
    pub fn with_shards(shards: usize) -> Self {
        EventSink {
            shards: (0..shards.max(1)).map(|_| Mutex::new(Vec::new())).collect(),
            len: AtomicUsize::new(0),
        }
    }

    /// Append an event
    pub fn record(&self, event: LogEvent) {
        let shard = get_current_thread_id() % self.shards.len();
        let mut events = self.shards[shard].lock();
        events.push(event);
        // Counted under the shard lock so `clear` never subtracts an
        // event it did not remove
        self.len.fetch_add(1, Ordering::AcqRel);
    }

    /// Snapshot of every recorded event, ordered by sequence marker
    pub fn read_all(&self) -> Vec<LogEvent> {
        let mut events: Vec<LogEvent> = self
            .shards
            .iter()
            .flat_map(|shard| shard.lock().clone())
            .collect();
        events.sort_by_key(|e| e.sequence);
        events
    }

    /// Number of recorded events
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of events recorded for the logger called `name`
    pub fn count_for(&self, name: &str) -> usize {
        self.shards
            .iter()
            .map(|shard| shard.lock().iter().filter(|e| e.logger == name).count())
            .sum()
    }

    /// Drop every recorded event
    pub fn clear(&self) {
        for shard in self.shards.iter() {
            let mut events = shard.lock();
            self.len.fetch_sub(events.len(), Ordering::AcqRel);
            events.clear();
        }
    }
}

impl Observer for EventSink {
    fn on_event(&self, event: &LogEvent) {
        self.record(event.clone());
    }
}
