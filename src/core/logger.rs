use crate::core::dispatch::Dispatch;
use crate::core::types::{LogEvent, LoggerName};
use std::fmt;
use std::sync::Arc;

struct LoggerCore {
    name: LoggerName,
    dispatch: Arc<Dispatch>,
}

/// Handle to a named logger
///
/// Loggers are only created by a [`LoggerRegistry`](crate::LoggerRegistry),
/// which guarantees one instance per name. Handles are cheap to clone and
/// every clone refers to the same instance; two handles compare equal only
/// if they point at the same instance.
///
/// # Example
///
/// ```rust
/// use oncelog::LoggerRegistry;
///
/// let registry = LoggerRegistry::new();
/// let a = registry.get_logger("app.net");
/// let b = registry.get_logger("app.net");
/// assert!(oncelog::Logger::ptr_eq(&a, &b));
/// a.emit("listening");
/// ```
#[derive(Clone)]
pub struct Logger {
    core: Arc<LoggerCore>,
}

impl Logger {
    pub(crate) fn new(name: LoggerName, dispatch: Arc<Dispatch>) -> Self {
        Logger {
            core: Arc::new(LoggerCore { name, dispatch }),
        }
    }

    /// Name this logger was registered under
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Emit one event through this logger
    ///
    /// Fire-and-forget: the event goes to every observer whose scope covers
    /// this logger, or nowhere if there is none.
    pub fn emit(&self, message: impl Into<String>) {
        let event = LogEvent::new(&self.core.name, message);
        self.core.dispatch.dispatch(&event);
    }

    /// Returns true if both handles refer to the same logger instance
    pub fn ptr_eq(a: &Logger, b: &Logger) -> bool {
        Arc::ptr_eq(&a.core, &b.core)
    }
}

impl PartialEq for Logger {
    fn eq(&self, other: &Self) -> bool {
        Logger::ptr_eq(self, other)
    }
}

impl Eq for Logger {}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name())
            .field("instance", &Arc::as_ptr(&self.core))
            .finish()
    }
}
