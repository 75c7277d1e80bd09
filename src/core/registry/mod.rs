//! Name → logger registry with lazy, exactly-once initialization
//!
//! The registry owns a table of shards, each a read/write-locked map from
//! logger name to logger. The table itself is not built until the first
//! lookup, and is published through a [`OnceLock`]: racing first callers
//! block until the single initializer has finished, so no caller can observe
//! a half-built table.
//!
//! Within a shard, creation is compute-if-absent under the shard's write
//! lock. A thread that loses the race to insert a name gets the winner's
//! instance back; a second instance is never constructed.

#[cfg(feature = "stress-test")]
pub mod stress;

use crate::core::dispatch::{Dispatch, Observer, ObserverGuard};
use crate::core::logger::Logger;
use crate::core::types::LoggerName;
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

#[cfg(feature = "stress-test")]
use stress::StressConfig;

type Shard = RwLock<FxHashMap<LoggerName, Logger>>;

const DEFAULT_SHARDS: usize = 16;

/// Configuration for a [`LoggerRegistry`]
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Number of independently locked shards (at least one is used)
    pub shards: usize,
    /// Preemption injected on the creation path
    #[cfg(feature = "stress-test")]
    pub stress: Option<StressConfig>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            shards: DEFAULT_SHARDS,
            #[cfg(feature = "stress-test")]
            stress: None,
        }
    }
}

struct RegistryInner {
    config: RegistryConfig,
    shards: OnceLock<Box<[Shard]>>,
    dispatch: Arc<Dispatch>,
    created: AtomicUsize,
}

/// Process-wide or explicitly owned logger registry
///
/// Cloning a registry yields another handle to the same registry.
///
/// # Example
///
/// ```rust
/// use oncelog::{EventSink, LoggerRegistry};
/// use std::sync::Arc;
///
/// let registry = LoggerRegistry::new();
/// let sink = Arc::new(EventSink::new());
/// let _guard = registry.attach("app", sink.clone());
///
/// registry.get_logger("app.worker").emit("started");
/// assert_eq!(sink.len(), 1);
/// ```
#[derive(Clone)]
pub struct LoggerRegistry {
    inner: Arc<RegistryInner>,
}

impl Default for LoggerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggerRegistry {
    /// Create an empty registry with default settings
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create an empty registry
    ///
    /// Nothing is allocated for the shard table until the first lookup.
    pub fn with_config(config: RegistryConfig) -> Self {
        LoggerRegistry {
            inner: Arc::new(RegistryInner {
                config,
                shards: OnceLock::new(),
                dispatch: Arc::new(Dispatch::new()),
                created: AtomicUsize::new(0),
            }),
        }
    }

    fn shards(&self) -> &[Shard] {
        self.inner.shards.get_or_init(|| {
            #[cfg(feature = "stress-test")]
            self.stress_point();

            let count = self.inner.config.shards.max(1);
            tracing::debug!(shards = count, "initializing logger registry");
            (0..count)
                .map(|_| RwLock::new(FxHashMap::default()))
                .collect()
        })
    }

    fn shard_for(&self, name: &str) -> &Shard {
        let shards = self.shards();
        let index = (fxhash::hash64(name) % shards.len() as u64) as usize;
        &shards[index]
    }

    #[cfg(feature = "stress-test")]
    fn stress_point(&self) {
        if let Some(config) = &self.inner.config.stress {
            stress::maybe_preempt(config);
        }
    }

    /// Return the logger registered under `name`, creating it if absent
    ///
    /// Safe to call from any number of threads at once, including the very
    /// first calls on a fresh registry. Every call with the same name returns
    /// a handle to the same instance.
    pub fn get_logger(&self, name: &str) -> Logger {
        let shard = self.shard_for(name);

        // Fast path
        if let Some(logger) = shard.read().get(name) {
            return logger.clone();
        }

        #[cfg(feature = "stress-test")]
        self.stress_point();

        let mut map = shard.write();
        map.entry(Arc::from(name))
            .or_insert_with_key(|key| {
                self.inner.created.fetch_add(1, Ordering::AcqRel);
                tracing::trace!(logger = %key, "logger created");
                Logger::new(Arc::clone(key), Arc::clone(&self.inner.dispatch))
            })
            .clone()
    }

    /// Returns true if a logger named `name` exists
    pub fn contains(&self, name: &str) -> bool {
        match self.inner.shards.get() {
            Some(_) => self.shard_for(name).read().contains_key(name),
            None => false,
        }
    }

    /// Number of distinct loggers in the registry
    pub fn len(&self) -> usize {
        match self.inner.shards.get() {
            Some(shards) => shards.iter().map(|s| s.read().len()).sum(),
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of logger constructions ever performed
    ///
    /// Always equal to [`len`](Self::len); a larger value would mean a name
    /// was constructed twice.
    pub fn created(&self) -> usize {
        self.inner.created.load(Ordering::Acquire)
    }

    /// Returns true once the first lookup has built the shard table
    pub fn is_initialized(&self) -> bool {
        self.inner.shards.get().is_some()
    }

    /// Names of all loggers whose name falls inside `scope`
    pub fn names_in(&self, scope: &str) -> Vec<String> {
        let Some(shards) = self.inner.shards.get() else {
            return Vec::new();
        };
        let mut names: Vec<String> = shards
            .iter()
            .flat_map(|s| {
                s.read()
                    .keys()
                    .filter(|k| crate::core::types::scope_covers(scope, k))
                    .map(|k| k.to_string())
                    .collect::<Vec<_>>()
            })
            .collect();
        names.sort();
        names
    }

    /// Attach `observer` to every logger inside `scope`
    ///
    /// Works for loggers created before and after the call. The observer
    /// stays attached until the guard is dropped.
    pub fn attach(&self, scope: &str, observer: Arc<dyn Observer>) -> ObserverGuard {
        self.inner.dispatch.attach(scope, observer)
    }

    /// Number of currently attached observers
    pub fn observer_count(&self) -> usize {
        self.inner.dispatch.observer_count()
    }

    /// Returns true if both handles refer to the same registry
    pub fn ptr_eq(a: &LoggerRegistry, b: &LoggerRegistry) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

// Global registry instance
lazy_static::lazy_static! {
    static ref GLOBAL_REGISTRY: LoggerRegistry = LoggerRegistry::new();
}

/// The process-wide registry
///
/// Created on first access and never dropped.
pub fn global() -> &'static LoggerRegistry {
    &*GLOBAL_REGISTRY
}

/// Return the logger named `name` from the process-wide registry
pub fn get_logger(name: &str) -> Logger {
    global().get_logger(name)
}
