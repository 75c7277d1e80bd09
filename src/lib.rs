//! # oncelog
//!
//! A logger registry that is safe to hit from many threads at once on first
//! use, and a harness that proves it.
//!
//! The registry maps logger names to logger instances, builds its internal
//! state lazily and exactly once, and never hands out two instances for one
//! name. The harness releases a crowd of threads through a rendezvous
//! barrier so they all request their first logger in the same instant, then
//! checks that every event they emitted was recorded exactly once.
//!
//! ## Features
//!
//! - Lazy, exactly-once registry initialization
//! - One logger instance per name under any interleaving
//! - Scoped observers with automatic detach
//! - Breakable rendezvous barrier with timeouts
//! - Optional preemption injection on the creation path (`stress-test`)
//!
//! ## Usage
//!
//! ```rust
//! use oncelog::{EventSink, get_logger, global};
//! use std::sync::Arc;
//!
//! let sink = Arc::new(EventSink::new());
//! let _guard = global().attach("app", sink.clone());
//!
//! get_logger("app.server").emit("ready");
//! assert_eq!(sink.len(), 1);
//! ```

mod core;
pub use crate::core::{
    Arrival, BarrierError, BarrierWaitResult, EventSink, HarnessError, LogEvent, Logger,
    LoggerName, LoggerRegistry, MAX_WORKERS, Observer, ObserverGuard, RegistryConfig, RendezvousBarrier,
    Scenario, ScenarioReport, ThreadCount, ThreadId, WorkerFault, get_current_thread_id,
    get_logger, global, scope_covers,
};

#[cfg(feature = "stress-test")]
pub use crate::core::registry::stress;
