//! Error types for the rendezvous barrier and the first-use harness.

use std::time::Duration;
use thiserror::Error;

/// Errors returned by [`RendezvousBarrier`](crate::RendezvousBarrier) waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BarrierError {
    /// Another party failed or gave up; the rendezvous can no longer happen.
    #[error("barrier is broken")]
    Broken,

    /// This party gave up waiting. The barrier is broken for everyone else.
    #[error("barrier wait timed out after {0:?}")]
    Timeout(Duration),
}

/// Failures detected by a first-use scenario run.
///
/// Any of these means the run cannot be interpreted; none is retried.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// A worker finished without obtaining a logger.
    #[error("logger for worker {worker} is not set")]
    NullLogger { worker: usize },

    /// The sink (or the emission counter) disagrees with the expected count.
    #[error("{what} mismatch: expected {expected} events, got {actual}")]
    CountMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Re-acquiring a name returned a different instance than the first lookup.
    #[error("registry returned two distinct loggers for {name}")]
    DuplicateLogger { name: String },

    /// The rendezvous could not happen.
    #[error("rendezvous failed: {0}")]
    BarrierBroken(#[from] BarrierError),

    /// A worker panicked; the panic payload is kept for diagnosis.
    #[error("worker {worker} panicked: {message}")]
    WorkerPanicked { worker: usize, message: String },

    /// Workers did not all report back before the deadline. Most likely the
    /// registry deadlocked.
    #[error("{pending} worker(s) still running after {waited:?}")]
    Timeout { waited: Duration, pending: usize },

    /// The OS refused to start a worker thread.
    #[error("failed to spawn worker {worker}: {source}")]
    Spawn {
        worker: usize,
        #[source]
        source: std::io::Error,
    },

    /// The thread-count rule produced zero workers.
    #[error("scenario needs at least one worker thread")]
    NoWorkers,

    /// The thread-count rule produced more workers than a run may start.
    #[error("{requested} worker threads requested, at most {max} allowed")]
    TooManyWorkers { requested: usize, max: usize },
}
