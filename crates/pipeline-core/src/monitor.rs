//! Sticky binary signal with broadcast wake, shared by every blocking edge of
//! [`crate::queue::BoundedQueue`].
//!
//! A `Monitor` is simpler than a general condition variable: once raised it stays
//! raised until explicitly reset, so a producer can signal before any consumer is
//! waiting without losing the wakeup.

use std::sync::{Condvar, Mutex};

/// A sticky, broadcast-wake binary signal.
///
/// `signal` sets the flag and wakes every waiter; `wait` blocks until the flag is
/// observed true, then returns without clearing it. The flag only clears on an
/// explicit `reset`. Spurious wakeups are tolerated: `wait` re-checks the flag
/// under the lock in a loop rather than trusting a single `notify`.
pub struct Monitor {
    signaled: Mutex<bool>,
    condition: Condvar,
}

impl Monitor {
    /// Creates a new monitor with the signal cleared.
    pub fn new() -> Self {
        Monitor {
            signaled: Mutex::new(false),
            condition: Condvar::new(),
        }
    }

    /// Raises the signal and wakes every thread currently blocked in [`Monitor::wait`].
    pub fn signal(&self) {
        let mut signaled = self.signaled.lock().unwrap();
        *signaled = true;
        self.condition.notify_all();
    }

    /// Clears the signal. A `wait` that is already past its flag check when a
    /// concurrent `reset` runs is unaffected; the mutex orders the two.
    pub fn reset(&self) {
        let mut signaled = self.signaled.lock().unwrap();
        *signaled = false;
    }

    /// Blocks until the signal has been raised at least once since the last
    /// `reset` (or construction). Returns immediately if it is already raised.
    pub fn wait(&self) {
        let mut signaled = self.signaled.lock().unwrap();
        while !*signaled {
            signaled = self.condition.wait(signaled).unwrap();
        }
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}
