use oncelog::{EventSink, LoggerRegistry, ObserverGuard};
use std::sync::Arc;
use std::time::Duration;

#[allow(dead_code)]
pub const SCENARIO_TIMEOUT: Duration = Duration::from_secs(30);
#[allow(dead_code)]
pub const SHORT_TIMEOUT: Duration = Duration::from_millis(500);

/// Attach a fresh recording sink to `scope` on `registry`
#[allow(dead_code)]
pub fn recording_sink(registry: &LoggerRegistry, scope: &str) -> (Arc<EventSink>, ObserverGuard) {
    let sink = Arc::new(EventSink::new());
    let guard = registry.attach(scope, sink.clone());
    (sink, guard)
}

/// Available hardware parallelism, at least one
#[allow(dead_code)]
pub fn parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
