// Random preemption on the registry's creation path.
// Only compiled when the "stress-test" feature is enabled.

use rand::{Rng, rng};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

/// Where preemption is injected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StressMode {
    /// No stress testing (default)
    #[default]
    None,
    /// Sleep for a random delay between the lookup miss and the insert,
    /// and inside lazy initialization
    RandomPreemption,
    /// Only yield the CPU at the same points
    YieldOnly,
}

/// Configuration options for stress testing
#[derive(Debug, Clone)]
pub struct StressConfig {
    pub mode: StressMode,
    /// Probability of preemption (0.0-1.0)
    pub preemption_probability: f64,
    /// Minimum delay in microseconds
    pub min_delay_us: u64,
    /// Maximum delay in microseconds
    pub max_delay_us: u64,
}

impl Default for StressConfig {
    fn default() -> Self {
        StressConfig {
            mode: StressMode::RandomPreemption,
            preemption_probability: 0.5,
            min_delay_us: 10,
            max_delay_us: 500,
        }
    }
}

static PREEMPTIONS: AtomicUsize = AtomicUsize::new(0);

/// Total number of injected preemptions in this process
pub fn preemption_count() -> usize {
    PREEMPTIONS.load(Ordering::Relaxed)
}

/// Apply a delay to the current thread
fn apply_delay(min_us: u64, max_us: u64) {
    let delay_us = if min_us >= max_us {
        min_us
    } else {
        rng().random_range(min_us..=max_us)
    };
    thread::sleep(Duration::from_micros(delay_us));
}

/// Possibly preempt the current thread according to `config`
pub fn maybe_preempt(config: &StressConfig) -> bool {
    match config.mode {
        StressMode::None => false,
        StressMode::YieldOnly => {
            thread::yield_now();
            PREEMPTIONS.fetch_add(1, Ordering::Relaxed);
            true
        }
        StressMode::RandomPreemption => {
            if rng().random::<f64>() < config.preemption_probability {
                PREEMPTIONS.fetch_add(1, Ordering::Relaxed);
                apply_delay(config.min_delay_us, config.max_delay_us);
                true
            } else {
                false
            }
        }
    }
}
