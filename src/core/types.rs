use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Logger name type
///
/// Dot-separated by convention, but the registry treats it as an opaque key.
pub type LoggerName = Arc<str>;

/// Thread identifier type
///
/// Uniquely identifies a thread that emitted at least one event.
pub type ThreadId = usize;

// Global counter for assigning unique thread IDs
static THREAD_ID_COUNTER: AtomicUsize = AtomicUsize::new(1);

// Global counter for event order markers
static SEQUENCE_COUNTER: AtomicU64 = AtomicU64::new(1);

// Thread-local storage for each thread's assigned ID
thread_local! {
    static THREAD_ID: ThreadId = {
        // Each thread gets a unique ID once, when this is first accessed
        THREAD_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
    };
}

/// Get a unique identifier of the current thread
/// This will always return the same ID for the lifetime of the thread
pub fn get_current_thread_id() -> ThreadId {
    THREAD_ID.with(|&id| id)
}

/// Hand out the next process-wide event order marker
pub(crate) fn next_sequence() -> u64 {
    SEQUENCE_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// A single emitted log event
///
/// Events are immutable once built. The `sequence` marker is unique per
/// process and increases with emission order, but events emitted by different
/// threads at roughly the same time carry no meaningful relative order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogEvent {
    /// Name of the logger that emitted the event
    pub logger: String,
    /// The message passed to `emit`
    pub message: String,
    /// Thread that emitted the event
    pub thread_id: ThreadId,
    /// Process-wide order marker
    pub sequence: u64,
    /// Absolute timestamp of emission (seconds since Unix Epoch)
    pub timestamp: f64,
}

impl LogEvent {
    /// Build an event for `logger` stamped with the current thread, the next
    /// sequence number and the current time
    pub fn new(logger: &str, message: impl Into<String>) -> Self {
        let now = Utc::now();
        let timestamp = now.timestamp() as f64 + now.timestamp_subsec_micros() as f64 / 1_000_000.0;

        LogEvent {
            logger: logger.to_owned(),
            message: message.into(),
            thread_id: get_current_thread_id(),
            sequence: next_sequence(),
            timestamp,
        }
    }
}

/// Returns true if `name` falls inside the observation `scope`
///
/// A scope covers the logger with exactly its name and every logger below it
/// in the dot hierarchy. The empty scope covers everything.
pub fn scope_covers(scope: &str, name: &str) -> bool {
    if scope.is_empty() {
        return true;
    }
    match name.strip_prefix(scope) {
        Some(rest) => rest.is_empty() || rest.starts_with('.'),
        None => false,
    }
}
