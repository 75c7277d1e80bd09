//! Delivery of emitted events to scoped observers.
//!
//! Observers are attached to a logger-name scope and stay attached until the
//! returned [`ObserverGuard`] is dropped, so a test can install a recorder
//! before running a scenario and be sure it is gone afterwards, whether the
//! scenario passed, failed or panicked.

use crate::core::types::{LogEvent, scope_covers};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Receiver of log events
pub trait Observer: Send + Sync {
    /// Called once for every event emitted by a logger inside the observer's scope
    fn on_event(&self, event: &LogEvent);
}

struct Subscription {
    id: u64,
    scope: String,
    observer: Arc<dyn Observer>,
}

/// Observer table shared by a registry and every logger it creates
#[derive(Default)]
pub struct Dispatch {
    subscriptions: RwLock<Vec<Subscription>>,
    next_id: AtomicU64,
}

impl Dispatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `observer` to `scope`
    ///
    /// The observer is detached when the returned guard is dropped.
    pub fn attach(self: &Arc<Self>, scope: &str, observer: Arc<dyn Observer>) -> ObserverGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscriptions.write().push(Subscription {
            id,
            scope: scope.to_owned(),
            observer,
        });
        tracing::debug!(scope, id, "observer attached");

        ObserverGuard {
            dispatch: Arc::downgrade(self),
            id,
        }
    }

    fn detach(&self, id: u64) {
        self.subscriptions.write().retain(|s| s.id != id);
        tracing::debug!(id, "observer detached");
    }

    /// Hand `event` to every observer whose scope covers its logger
    ///
    /// Observers run without the table locked, so they may emit through
    /// other loggers while observers are being attached or detached.
    pub fn dispatch(&self, event: &LogEvent) {
        let observers: Vec<Arc<dyn Observer>> = self
            .subscriptions
            .read()
            .iter()
            .filter(|s| scope_covers(&s.scope, &event.logger))
            .map(|s| Arc::clone(&s.observer))
            .collect();

        for observer in observers {
            observer.on_event(event);
        }
    }

    /// Number of attached observers
    pub fn observer_count(&self) -> usize {
        self.subscriptions.read().len()
    }
}

/// Keeps an observer attached; detaches it on drop
#[must_use = "the observer is detached as soon as the guard is dropped"]
pub struct ObserverGuard {
    dispatch: Weak<Dispatch>,
    id: u64,
}

impl ObserverGuard {
    /// Detach now instead of at end of scope
    pub fn detach(self) {}
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        if let Some(dispatch) = self.dispatch.upgrade() {
            dispatch.detach(self.id);
        }
    }
}
