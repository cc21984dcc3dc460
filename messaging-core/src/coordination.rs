//! Thread coordination primitives.
//!
//! Small, deliberately boring building blocks used throughout the crate to
//! make lifecycle transitions idempotent and to let producer threads wake a
//! single consumer thread without busy-waiting.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Atomic test-and-set boolean, used to make `disconnect()` idempotent.
#[derive(Debug, Default)]
pub struct InterlockedBoolean {
    flag: AtomicBool,
}

impl InterlockedBoolean {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
        }
    }

    /// Atomically set to `true`, returning the previous value. Callers use
    /// `!previous` to detect "this call performed the transition".
    pub fn test_and_set(&self) -> bool {
        self.flag.swap(true, Ordering::AcqRel)
    }

    #[must_use]
    pub fn get(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// A `(current, target)` signal that becomes set once `current >= target`.
///
/// Parks a thread until a condition driven by concurrent increments holds,
/// with a bounded wait.
#[derive(Debug)]
pub struct CounterSignal {
    state: Mutex<u64>,
    target: u64,
    cv: Condvar,
}

impl CounterSignal {
    #[must_use]
    pub fn new(target: u64) -> Self {
        Self {
            state: Mutex::new(0),
            target,
            cv: Condvar::new(),
        }
    }

    /// Increment `current` by one and wake any waiters.
    pub fn increment(&self) {
        let mut guard = self.state.lock();
        *guard += 1;
        self.cv.notify_all();
    }

    /// Reset `current` back to zero (e.g. after the condition is consumed).
    pub fn reset(&self) {
        let mut guard = self.state.lock();
        *guard = 0;
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        *self.state.lock() >= self.target
    }

    /// Block until set, or until `timeout` elapses if given.
    ///
    /// Returns `true` if the signal became set, `false` on timeout.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let mut guard = self.state.lock();
        if *guard >= self.target {
            return true;
        }
        match timeout {
            None => {
                self.cv.wait_while(&mut guard, |c| *c < self.target);
                true
            }
            Some(d) => {
                let deadline = Instant::now() + d;
                loop {
                    if *guard >= self.target {
                        return true;
                    }
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return *guard >= self.target;
                    }
                    let result = self.cv.wait_for(&mut guard, remaining);
                    if !result.timed_out() && *guard >= self.target {
                        return true;
                    }
                    if remaining.is_zero() {
                        return *guard >= self.target;
                    }
                }
            }
        }
    }
}

/// A cooperative cancellation signal.
///
/// Cheap to clone and share across threads. Long-running loops and
/// cancellable reads/writes poll [`CancellationToken::is_cancelled`] between
/// suspension points so a cancel is observed within one polling interval.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: std::sync::Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Error returned by a cancellable operation that was cancelled before
/// completion.
#[derive(Debug, thiserror::Error)]
#[error("operation cancelled")]
pub struct Cancelled;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn disconnect_is_idempotent() {
        let flag = InterlockedBoolean::new();
        assert!(!flag.test_and_set());
        assert!(flag.test_and_set());
        assert!(flag.test_and_set());
        assert!(flag.get());
    }

    #[test]
    fn counter_signal_wakes_waiter() {
        let signal = Arc::new(CounterSignal::new(3));
        let s2 = signal.clone();
        let handle = thread::spawn(move || {
            for _ in 0..3 {
                thread::sleep(Duration::from_millis(5));
                s2.increment();
            }
        });
        assert!(signal.wait(Some(Duration::from_secs(1))));
        handle.join().unwrap();
    }

    #[test]
    fn counter_signal_times_out() {
        let signal = CounterSignal::new(1);
        assert!(!signal.wait(Some(Duration::from_millis(20))));
    }

    #[test]
    fn cancellation_token_is_shared() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
