use crate::core::error::{BarrierError, HarnessError};
use crate::core::harness::barrier::RendezvousBarrier;
use crate::core::logger::Logger;
use crate::core::registry::LoggerRegistry;
use crossbeam_channel::RecvTimeoutError;
use fxhash::FxHashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Failure injected into one worker, to exercise the harness's own failure
/// reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerFault {
    /// Panic before reaching the barrier
    PanicBeforeRendezvous,
    /// Panic after release, before asking for a logger
    PanicBeforeLookup,
    /// Panic after obtaining a logger, before emitting
    PanicBeforeEmit,
    /// Sleep after emitting, before reporting back
    Stall(Duration),
}

/// Name of the logger worker `index` asks for
pub fn worker_logger_name(namespace: &str, index: usize) -> String {
    format!("{namespace}.LoggerAccessingThread{index}")
}

enum WorkerFailure {
    Barrier(BarrierError),
    Panicked(String),
}

struct WorkerOutcome {
    index: usize,
    logger: Option<Logger>,
    failure: Option<WorkerFailure>,
}

struct WorkerContext {
    index: usize,
    name: String,
    barrier: Arc<RendezvousBarrier>,
    registry: LoggerRegistry,
    emitted: Arc<AtomicUsize>,
    timeout: Duration,
    fault: Option<WorkerFault>,
}

/// Everything a first-use run needs to start its workers
pub(crate) struct WorkerPlan<'a> {
    pub registry: &'a LoggerRegistry,
    pub namespace: &'a str,
    pub threads: usize,
    pub timeout: Duration,
    pub emitted: &'a Arc<AtomicUsize>,
    pub faults: &'a FxHashMap<usize, WorkerFault>,
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

fn access_logger(ctx: &WorkerContext, obtained: &mut Option<Logger>) -> Result<(), WorkerFailure> {
    let arrival = ctx.barrier.arrival();
    if ctx.fault == Some(WorkerFault::PanicBeforeRendezvous) {
        panic!("injected fault in worker {} before rendezvous", ctx.index);
    }
    arrival
        .wait_timeout(ctx.timeout)
        .map_err(WorkerFailure::Barrier)?;

    if ctx.fault == Some(WorkerFault::PanicBeforeLookup) {
        panic!("injected fault in worker {} before lookup", ctx.index);
    }
    let logger = obtained.insert(ctx.registry.get_logger(&ctx.name));

    if ctx.fault == Some(WorkerFault::PanicBeforeEmit) {
        panic!("injected fault in worker {} before emit", ctx.index);
    }
    logger.emit("in run method");
    ctx.emitted.fetch_add(1, Ordering::SeqCst);

    if let Some(WorkerFault::Stall(delay)) = ctx.fault {
        thread::sleep(delay);
    }
    Ok(())
}

fn run_worker(ctx: WorkerContext) -> WorkerOutcome {
    let mut obtained = None;
    let result = panic::catch_unwind(AssertUnwindSafe(|| access_logger(&ctx, &mut obtained)));

    let failure = match result {
        Ok(Ok(())) => None,
        Ok(Err(failure)) => Some(failure),
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(worker = ctx.index, %message, "worker panicked");
            Some(WorkerFailure::Panicked(message))
        }
    };

    WorkerOutcome {
        index: ctx.index,
        logger: obtained,
        failure,
    }
}

fn join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        // Panics are caught inside the worker and reported as outcomes
        let _ = handle.join();
    }
}

/// Start the workers, release them together, and collect the logger each
/// one obtained, indexed by worker
///
/// # Errors
///
/// Returns the first failure found: a broken rendezvous, a worker that
/// reported no logger, a worker panic, or workers still running at the
/// deadline.
pub(crate) fn run_workers(plan: WorkerPlan<'_>) -> Result<Vec<Logger>, HarnessError> {
    let threads = plan.threads;
    let barrier = Arc::new(RendezvousBarrier::new(threads + 1));
    let (tx, rx) = crossbeam_channel::unbounded::<WorkerOutcome>();
    let mut handles = Vec::with_capacity(threads);

    for index in 0..threads {
        let ctx = WorkerContext {
            index,
            name: worker_logger_name(plan.namespace, index),
            barrier: Arc::clone(&barrier),
            registry: plan.registry.clone(),
            emitted: Arc::clone(plan.emitted),
            timeout: plan.timeout,
            fault: plan.faults.get(&index).copied(),
        };
        let tx = tx.clone();

        let spawned = thread::Builder::new()
            .name(format!("logger-accessor-{index}"))
            .spawn(move || {
                let _ = tx.send(run_worker(ctx));
            });

        match spawned {
            Ok(handle) => handles.push(handle),
            Err(source) => {
                barrier.break_barrier();
                join_all(handles);
                return Err(HarnessError::Spawn {
                    worker: index,
                    source,
                });
            }
        }
    }
    drop(tx);

    // Trigger the rendezvous
    if let Err(e) = barrier.wait_timeout(plan.timeout) {
        join_all(handles);
        return Err(e.into());
    }

    let deadline = Instant::now() + plan.timeout;
    let mut outcomes: Vec<Option<WorkerOutcome>> = (0..threads).map(|_| None).collect();
    let mut received = 0;
    while received < threads {
        match rx.recv_deadline(deadline) {
            Ok(outcome) => {
                let index = outcome.index;
                outcomes[index] = Some(outcome);
                received += 1;
            }
            Err(RecvTimeoutError::Timeout) => {
                // Stuck workers are left running; joining them would hang
                tracing::error!(pending = threads - received, "workers did not finish in time");
                return Err(HarnessError::Timeout {
                    waited: plan.timeout,
                    pending: threads - received,
                });
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    join_all(handles);

    let mut loggers = Vec::with_capacity(threads);
    for (worker, outcome) in outcomes.into_iter().enumerate() {
        let Some(outcome) = outcome else {
            return Err(HarnessError::NullLogger { worker });
        };
        match (outcome.logger, outcome.failure) {
            (_, Some(WorkerFailure::Barrier(e))) => return Err(e.into()),
            (None, _) => return Err(HarnessError::NullLogger { worker }),
            (Some(_), Some(WorkerFailure::Panicked(message))) => {
                return Err(HarnessError::WorkerPanicked { worker, message });
            }
            (Some(logger), None) => loggers.push(logger),
        }
    }
    Ok(loggers)
}
