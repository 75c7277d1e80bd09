use crate::core::error::BarrierError;
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

struct State {
    /// Parties waiting in the current generation
    arrived: usize,
    /// Bumped every time the barrier trips or is reset
    generation: u64,
    /// Generation that was broken, if any
    broken_generation: Option<u64>,
}

impl State {
    fn is_broken(&self) -> bool {
        self.broken_generation == Some(self.generation)
    }
}

/// Counting rendezvous barrier that can break
///
/// All parties block in [`wait`](Self::wait) until the last one arrives, then
/// all are released together. The release happens under the barrier's lock,
/// so everything a party did before arriving is visible to every party after
/// it is released.
///
/// Unlike [`std::sync::Barrier`], a party can give up: if a
/// [`wait_timeout`](Self::wait_timeout) expires or [`break_barrier`](Self::break_barrier)
/// is called, every blocked and future waiter gets [`BarrierError::Broken`]
/// instead of hanging.
///
/// # Example
///
/// ```rust
/// use oncelog::RendezvousBarrier;
/// use std::sync::Arc;
/// use std::thread;
///
/// let barrier = Arc::new(RendezvousBarrier::new(2));
/// let b = Arc::clone(&barrier);
/// let handle = thread::spawn(move || b.wait().is_ok());
///
/// assert!(barrier.wait().is_ok());
/// assert!(handle.join().unwrap());
/// ```
pub struct RendezvousBarrier {
    parties: usize,
    state: Mutex<State>,
    cvar: Condvar,
}

/// Outcome of a successful wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierWaitResult {
    leader: bool,
}

impl BarrierWaitResult {
    /// Returns true for exactly one party per generation: the last to arrive
    pub fn is_leader(&self) -> bool {
        self.leader
    }
}

impl RendezvousBarrier {
    /// Create a barrier for `parties` participants (at least one)
    pub fn new(parties: usize) -> Self {
        RendezvousBarrier {
            parties: parties.max(1),
            state: Mutex::new(State {
                arrived: 0,
                generation: 0,
                broken_generation: None,
            }),
            cvar: Condvar::new(),
        }
    }

    /// Number of parties needed to trip the barrier
    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Number of parties currently blocked in a wait
    pub fn waiting(&self) -> usize {
        self.state.lock().arrived
    }

    pub fn is_broken(&self) -> bool {
        self.state.lock().is_broken()
    }

    /// Block until all parties have arrived
    ///
    /// # Errors
    ///
    /// Returns [`BarrierError::Broken`] if the barrier is or becomes broken
    /// before this generation trips.
    pub fn wait(&self) -> Result<BarrierWaitResult, BarrierError> {
        self.wait_inner(None)
    }

    /// Like [`wait`](Self::wait), but give up after `timeout`
    ///
    /// Giving up breaks the barrier for every other party.
    ///
    /// # Errors
    ///
    /// Returns [`BarrierError::Timeout`] if this party gave up, or
    /// [`BarrierError::Broken`] if another party broke the barrier.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<BarrierWaitResult, BarrierError> {
        self.wait_inner(Some(timeout))
    }

    fn wait_inner(&self, timeout: Option<Duration>) -> Result<BarrierWaitResult, BarrierError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();

        if state.is_broken() {
            return Err(BarrierError::Broken);
        }

        let generation = state.generation;
        state.arrived += 1;

        if state.arrived == self.parties {
            // Last arrival trips the barrier
            state.arrived = 0;
            state.generation = state.generation.wrapping_add(1);
            self.cvar.notify_all();
            return Ok(BarrierWaitResult { leader: true });
        }

        loop {
            let timed_out = match deadline {
                Some(deadline) => self.cvar.wait_until(&mut state, deadline).timed_out(),
                None => {
                    self.cvar.wait(&mut state);
                    false
                }
            };

            if state.broken_generation == Some(generation) {
                return Err(BarrierError::Broken);
            }
            if state.generation != generation {
                return Ok(BarrierWaitResult { leader: false });
            }
            if timed_out {
                Self::break_locked(&mut state);
                self.cvar.notify_all();
                tracing::warn!(
                    parties = self.parties,
                    "rendezvous timed out; barrier broken"
                );
                return Err(BarrierError::Timeout(timeout.unwrap_or_default()));
            }
        }
    }

    fn break_locked(state: &mut State) {
        state.broken_generation = Some(state.generation);
        state.arrived = 0;
    }

    /// Break the barrier, releasing every blocked party with an error
    pub fn break_barrier(&self) {
        let mut state = self.state.lock();
        if !state.is_broken() {
            Self::break_locked(&mut state);
            self.cvar.notify_all();
            tracing::warn!(parties = self.parties, "barrier broken");
        }
    }

    /// Return the barrier to its initial state
    ///
    /// Parties blocked in the current generation are released with
    /// [`BarrierError::Broken`].
    pub fn reset(&self) {
        let mut state = self.state.lock();
        if state.arrived > 0 {
            Self::break_locked(&mut state);
            self.cvar.notify_all();
        }
        state.arrived = 0;
        state.generation = state.generation.wrapping_add(1);
    }

    /// Reserve a place at the barrier
    ///
    /// If the token is dropped without waiting (for example because the
    /// owning thread panicked first), the barrier is broken so the other
    /// parties are not left waiting for an arrival that will never happen.
    pub fn arrival(&self) -> Arrival<'_> {
        Arrival {
            barrier: self,
            armed: true,
        }
    }
}

/// Pending arrival at a [`RendezvousBarrier`]; breaks the barrier if dropped unused
#[must_use = "dropping an arrival without waiting breaks the barrier"]
pub struct Arrival<'a> {
    barrier: &'a RendezvousBarrier,
    armed: bool,
}

impl Arrival<'_> {
    pub fn wait(mut self) -> Result<BarrierWaitResult, BarrierError> {
        self.armed = false;
        self.barrier.wait()
    }

    pub fn wait_timeout(mut self, timeout: Duration) -> Result<BarrierWaitResult, BarrierError> {
        self.armed = false;
        self.barrier.wait_timeout(timeout)
    }
}

impl Drop for Arrival<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.barrier.break_barrier();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_releases_all_parties_with_one_leader() {
        let parties = 8;
        let barrier = Arc::new(RendezvousBarrier::new(parties));
        let leaders = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..parties)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let leaders = Arc::clone(&leaders);
                thread::spawn(move || {
                    let result = barrier.wait().unwrap();
                    if result.is_leader() {
                        leaders.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(leaders.load(Ordering::SeqCst), 1);
        assert_eq!(barrier.waiting(), 0);
        assert!(!barrier.is_broken());
    }

    #[test]
    fn test_barrier_is_reusable() {
        let barrier = Arc::new(RendezvousBarrier::new(2));
        let b = Arc::clone(&barrier);
        let handle = thread::spawn(move || {
            b.wait().unwrap();
            b.wait().unwrap();
        });
        barrier.wait().unwrap();
        barrier.wait().unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn test_timeout_breaks_for_everyone() {
        let barrier = Arc::new(RendezvousBarrier::new(3));
        let b = Arc::clone(&barrier);
        let waiter = thread::spawn(move || b.wait());

        // Wait until the other party is blocked
        while barrier.waiting() < 1 {
            thread::yield_now();
        }

        let mine = barrier.wait_timeout(Duration::from_millis(50));
        assert_eq!(mine, Err(BarrierError::Timeout(Duration::from_millis(50))));
        assert_eq!(waiter.join().unwrap(), Err(BarrierError::Broken));

        assert!(barrier.is_broken());
        assert_eq!(barrier.wait(), Err(BarrierError::Broken));
    }

    #[test]
    fn test_explicit_break_releases_waiters() {
        let barrier = Arc::new(RendezvousBarrier::new(4));
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let b = Arc::clone(&barrier);
                thread::spawn(move || b.wait())
            })
            .collect();

        while barrier.waiting() < 3 {
            thread::yield_now();
        }
        barrier.break_barrier();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Err(BarrierError::Broken));
        }
    }

    #[test]
    fn test_dropped_arrival_breaks_barrier() {
        let barrier = Arc::new(RendezvousBarrier::new(2));
        let b = Arc::clone(&barrier);

        let result = thread::spawn(move || {
            let _arrival = b.arrival();
            panic!("worker failed before the rendezvous");
        })
        .join();
        assert!(result.is_err());

        assert_eq!(barrier.wait(), Err(BarrierError::Broken));
    }

    #[test]
    fn test_reset_clears_broken_state() {
        let barrier = Arc::new(RendezvousBarrier::new(2));
        barrier.break_barrier();
        assert!(barrier.is_broken());

        barrier.reset();
        assert!(!barrier.is_broken());

        let b = Arc::clone(&barrier);
        let handle = thread::spawn(move || b.wait().is_ok());
        assert!(barrier.wait().is_ok());
        assert!(handle.join().unwrap());
    }
}
