// Core types
pub mod types;
pub use types::*;

pub mod error;
pub use error::{BarrierError, HarnessError};

// Event recording and delivery
pub mod dispatch;
pub use dispatch::{Observer, ObserverGuard};
pub mod sink;
pub use sink::EventSink;

// Loggers and the registry that owns them
pub mod logger;
pub use logger::Logger;
pub mod registry;
pub use registry::{LoggerRegistry, RegistryConfig, get_logger, global};

// First-use stress harness
pub mod harness;
pub use harness::barrier::{Arrival, BarrierWaitResult, RendezvousBarrier};
pub use harness::worker::WorkerFault;
pub use harness::{MAX_WORKERS, Scenario, ScenarioReport, ThreadCount};
