//! Blocking value monitor.
//!
//! A [`Monitor`] holds a value behind a mutex and wakes waiters whenever it
//! changes. [`FrameData`](crate::FrameData) uses one for its ready version,
//! and listeners are plain `Arc<Monitor<u32>>` counters that get bumped once
//! per version threshold.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// A monitored value with blocking `>=` waits.
#[derive(Debug, Default)]
pub struct Monitor<T> {
    value: Mutex<T>,
    changed: Condvar,
}

impl<T: Copy + PartialOrd> Monitor<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Mutex::new(value),
            changed: Condvar::new(),
        }
    }

    /// Current value.
    pub fn get(&self) -> T {
        *self.lock()
    }

    /// Replace the value and wake all waiters.
    pub fn set(&self, value: T) {
        self.update(|v| *v = value);
    }

    /// Mutate the value in place and wake all waiters.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut guard = self.lock();
        f(&mut guard);
        drop(guard);
        self.changed.notify_all();
    }

    /// Block until the value is at least `target`.
    pub fn wait_ge(&self, target: T) -> T {
        let guard = self.lock();
        let guard = self
            .changed
            .wait_while(guard, |v| *v < target)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }

    /// Block until the value is at least `target` or `timeout` elapses.
    ///
    /// Returns `true` if the target was reached.
    pub fn timed_wait_ge(&self, target: T, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.lock();
        while *guard < target {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (next, _) = self
                .changed
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            guard = next;
        }
        true
    }

    fn lock(&self) -> MutexGuard<'_, T> {
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Monitor<u32> {
    /// Add one and wake waiters.
    pub fn increment(&self) {
        self.update(|v| *v = v.wrapping_add(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn increment_and_get() {
        let m = Monitor::new(0u32);
        m.increment();
        m.increment();
        assert_eq!(m.get(), 2);
    }

    #[test]
    fn timed_wait_times_out() {
        let m = Monitor::new(1u64);
        assert!(!m.timed_wait_ge(2, Duration::from_millis(20)));
        assert!(m.timed_wait_ge(1, Duration::from_millis(20)));
    }

    #[test]
    fn wait_released_by_other_thread() {
        let m = Arc::new(Monitor::new(0u64));
        let setter = {
            let m = Arc::clone(&m);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                m.set(3);
            })
        };
        assert!(m.timed_wait_ge(3, Duration::from_secs(5)));
        assert_eq!(m.wait_ge(2), 3);
        setter.join().unwrap();
    }
}
