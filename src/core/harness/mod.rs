//! First-use stress harness
//!
//! A [`Scenario`] recreates the situation in which lazy-initialization races
//! show up: many threads asking a registry for loggers for the first time, in
//! the same narrow window.
//!
//! 1. `T` worker threads are started and park at a rendezvous barrier sized
//!    for `T + 1` parties.
//! 2. The controlling thread arrives last and releases them all at once.
//! 3. Each worker asks for a logger under a name unique to it, emits one
//!    event and reports the logger back.
//! 4. The controller collects every report (with a deadline, so a deadlocked
//!    registry is reported instead of hanging), then emits one more event
//!    through a fresh logger.
//! 5. The run passes only if every worker got a logger and the recording
//!    sink holds exactly `T + 1` events.

pub mod barrier;
pub mod worker;

use crate::core::error::HarnessError;
use crate::core::logger::Logger;
use crate::core::registry::{self, LoggerRegistry};
use crate::core::sink::EventSink;
use anyhow::{Context, Result};
use fxhash::FxHashMap;
use rand::{Rng, rng};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use worker::{WorkerFault, WorkerPlan, worker_logger_name};

const DEFAULT_PREFIX: &str = "oncelog.MultithreadedInitialization";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on worker threads in one run
pub const MAX_WORKERS: usize = 4096;

// Distinguishes runs that happen to draw the same random salt
static RUN_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Rule for the number of worker threads
///
/// Contention only shows up reliably with more threads than cores, so the
/// default scales with the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ThreadCount {
    /// Exactly this many workers
    Fixed(usize),
    /// `base + multiplier × available parallelism`
    Scaled { base: usize, multiplier: usize },
}

impl Default for ThreadCount {
    fn default() -> Self {
        ThreadCount::Scaled {
            base: 4,
            multiplier: 2,
        }
    }
}

impl ThreadCount {
    /// Number of workers on this machine
    pub fn resolve(&self) -> usize {
        let parallelism = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        self.resolve_with(parallelism)
    }

    /// Number of workers for a machine with `parallelism` hardware threads
    pub fn resolve_with(&self, parallelism: usize) -> usize {
        match *self {
            ThreadCount::Fixed(n) => n,
            ThreadCount::Scaled { base, multiplier } => {
                base.saturating_add(multiplier.saturating_mul(parallelism))
            }
        }
    }
}

/// Summary of one passing run
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    /// Logger-name scope the run used
    pub namespace: String,
    /// Number of worker threads
    pub threads: usize,
    /// Events the run should have produced
    pub expected: usize,
    /// Events the sink recorded
    pub recorded: usize,
    /// Emissions counted as they happened
    pub emitted: usize,
    /// Wall time of the run in milliseconds
    pub elapsed_ms: u64,
}

/// Builder and runner for the first-use scenario
///
/// # Example
///
/// ```rust
/// use oncelog::{LoggerRegistry, Scenario, ThreadCount};
///
/// let report = Scenario::new()
///     .threads(ThreadCount::Fixed(12))
///     .registry(LoggerRegistry::new())
///     .run()
///     .unwrap();
/// assert_eq!(report.recorded, 13);
/// ```
#[derive(Clone)]
pub struct Scenario {
    threads: ThreadCount,
    timeout: Duration,
    reuse_handles: bool,
    prefix: String,
    registry: Option<LoggerRegistry>,
    faults: FxHashMap<usize, WorkerFault>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::new()
    }
}

impl Scenario {
    /// Create a scenario with default settings
    ///
    /// By default:
    /// - `4 + 2 × available parallelism` workers
    /// - 30 second deadline for the rendezvous and for the workers to finish
    /// - the process-wide registry
    /// - no handle reuse phase
    pub fn new() -> Self {
        Scenario {
            threads: ThreadCount::default(),
            timeout: DEFAULT_TIMEOUT,
            reuse_handles: false,
            prefix: DEFAULT_PREFIX.to_owned(),
            registry: None,
            faults: FxHashMap::default(),
        }
    }

    /// Set the worker count rule
    pub fn threads(mut self, threads: ThreadCount) -> Self {
        self.threads = threads;
        self
    }

    /// Bound the rendezvous and the wait for workers
    ///
    /// Expiry is reported as [`HarnessError::Timeout`] or a broken barrier.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// After the workers finish, emit once more through every worker's
    /// logger from the controlling thread
    ///
    /// The expected count becomes `2T + 1`.
    pub fn reuse_handles(mut self, reuse: bool) -> Self {
        self.reuse_handles = reuse;
        self
    }

    /// Prefix for the per-run logger namespace
    pub fn prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_owned();
        self
    }

    /// Run against `registry` instead of the process-wide one
    pub fn registry(mut self, registry: LoggerRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Inject `fault` into worker `index`
    pub fn fault(mut self, index: usize, fault: WorkerFault) -> Self {
        self.faults.insert(index, fault);
        self
    }

    fn next_namespace(&self) -> String {
        let salt: u32 = rng().random_range(0..10_000);
        let run = RUN_COUNTER.fetch_add(1, Ordering::Relaxed);
        format!("{}{salt}_{run}", self.prefix)
    }

    /// Run the scenario once
    ///
    /// A fresh sink is attached to a fresh namespace for the duration of the
    /// run and detached afterwards, whatever the outcome.
    ///
    /// # Errors
    ///
    /// Returns a [`HarnessError`] describing the first failure observed.
    pub fn run(&self) -> Result<ScenarioReport, HarnessError> {
        let registry = match &self.registry {
            Some(registry) => registry.clone(),
            None => registry::global().clone(),
        };
        let threads = self.threads.resolve();
        if threads == 0 {
            return Err(HarnessError::NoWorkers);
        }
        if threads > MAX_WORKERS {
            return Err(HarnessError::TooManyWorkers {
                requested: threads,
                max: MAX_WORKERS,
            });
        }

        let namespace = self.next_namespace();
        tracing::info!(threads, %namespace, "starting first-use scenario");

        let sink = Arc::new(EventSink::new());
        let _observer = registry.attach(&namespace, sink.clone());
        let emitted = Arc::new(AtomicUsize::new(0));
        let started = Instant::now();

        let loggers = worker::run_workers(WorkerPlan {
            registry: &registry,
            namespace: &namespace,
            threads,
            timeout: self.timeout,
            emitted: &emitted,
            faults: &self.faults,
        })?;

        let mut expected = threads + 1;
        if self.reuse_handles {
            for logger in &loggers {
                logger.emit("post harness");
                emitted.fetch_add(1, Ordering::SeqCst);
            }
            expected += threads;
        }

        let logger = registry.get_logger(&format!("{namespace}.test"));
        logger.emit("hello");
        emitted.fetch_add(1, Ordering::SeqCst);

        let emitted = emitted.load(Ordering::SeqCst);
        if emitted != expected {
            return Err(HarnessError::CountMismatch {
                what: "emission",
                expected,
                actual: emitted,
            });
        }
        let recorded = sink.len();
        if recorded != expected {
            return Err(HarnessError::CountMismatch {
                what: "recorded event",
                expected,
                actual: recorded,
            });
        }

        check_singletons(&registry, &namespace, &loggers)?;

        let report = ScenarioReport {
            namespace,
            threads,
            expected,
            recorded,
            emitted,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        tracing::debug!(?report, "scenario passed");
        Ok(report)
    }

    /// Run the scenario `runs` times in sequence, stopping at the first failure
    ///
    /// Every run uses its own namespace and its own sink.
    ///
    /// # Errors
    ///
    /// Returns the first failing run's error, with the run number attached.
    pub fn repeat(&self, runs: usize) -> Result<Vec<ScenarioReport>> {
        (0..runs)
            .map(|i| {
                self.run()
                    .with_context(|| format!("run {} of {} failed", i + 1, runs))
            })
            .collect()
    }
}

/// Re-acquire every worker's logger and make sure the registry hands back
/// the very instance the worker got, and nothing else was registered
fn check_singletons(
    registry: &LoggerRegistry,
    namespace: &str,
    loggers: &[Logger],
) -> Result<(), HarnessError> {
    for (index, logger) in loggers.iter().enumerate() {
        let name = worker_logger_name(namespace, index);
        if !Logger::ptr_eq(logger, &registry.get_logger(&name)) {
            return Err(HarnessError::DuplicateLogger { name });
        }
    }

    let registered = registry.names_in(namespace).len();
    let expected = loggers.len() + 1;
    if registered != expected {
        return Err(HarnessError::CountMismatch {
            what: "registered logger",
            expected,
            actual: registered,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_count_rules() {
        assert_eq!(ThreadCount::default().resolve_with(8), 20);
        assert_eq!(ThreadCount::default().resolve_with(1), 6);
        assert_eq!(ThreadCount::Fixed(12).resolve_with(64), 12);
        assert_eq!(
            ThreadCount::Scaled {
                base: 0,
                multiplier: 3
            }
            .resolve_with(4),
            12
        );
        assert!(ThreadCount::default().resolve() >= 6);
    }

    #[test]
    fn test_namespaces_are_unique() {
        let scenario = Scenario::new().prefix("p");
        let a = scenario.next_namespace();
        let b = scenario.next_namespace();
        assert_ne!(a, b);
        assert!(a.starts_with('p'));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let result = Scenario::new()
            .threads(ThreadCount::Fixed(0))
            .registry(LoggerRegistry::new())
            .run();
        assert!(matches!(result, Err(HarnessError::NoWorkers)));
    }

    #[test]
    fn test_oversized_worker_counts_rejected() {
        let registry = LoggerRegistry::new();
        let huge = [
            ThreadCount::Fixed(usize::MAX),
            ThreadCount::Fixed(MAX_WORKERS + 1),
            ThreadCount::Scaled {
                base: 4,
                multiplier: usize::MAX,
            },
        ];

        for threads in huge {
            let result = Scenario::new()
                .threads(threads)
                .registry(registry.clone())
                .run();
            assert!(
                matches!(
                    result,
                    Err(HarnessError::TooManyWorkers { max: MAX_WORKERS, .. })
                ),
                "{threads:?} was not rejected: {result:?}"
            );
        }
        // Rejected before anything touched the registry
        assert!(!registry.is_initialized());
        assert_eq!(registry.observer_count(), 0);
    }

    #[test]
    fn test_small_run_on_private_registry() {
        let registry = LoggerRegistry::new();
        let report = Scenario::new()
            .threads(ThreadCount::Fixed(3))
            .registry(registry.clone())
            .run()
            .unwrap();

        assert_eq!(report.threads, 3);
        assert_eq!(report.recorded, 4);
        assert_eq!(report.emitted, 4);
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.created(), 4);
    }
}
