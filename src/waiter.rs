// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// In-process stand-in for cpp-ipc/src/libipc/waiter.h. The original wraps a
// named POSIX condvar + mutex pair so threads in different processes can
// block on a predicate backed by shared memory. There is only one process
// here, so a plain `Condvar`/`Mutex<()>` pair plays the same role: block a
// thread until some other thread changes a word it cares about, or until a
// bounded timeout elapses.

use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Blocks a thread until `still_waiting` goes false or the timeout elapses.
///
/// Every `Gate` (see `crate::lock`) keeps one `Waiter` for its reader count
/// and one for its writer flag, so a thread can sleep instead of spinning
/// while contended. Because the predicate is re-checked under the waiter's
/// own mutex after every wake, a notification that arrives between the
/// caller's lock-free read of the atomic word and the call to `wait_for` is
/// never lost outright — it just costs the caller one extra timeout slice
/// (bounded by the `futex_retry_ms` passed in by `crate::lock`).
pub(crate) struct Waiter {
    lock: Mutex<()>,
    cond: Condvar,
}

impl Waiter {
    pub(crate) fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            cond: Condvar::new(),
        }
    }

    /// Block for up to `timeout` while `still_waiting()` returns `true`.
    /// Returns once the predicate flips to `false` or the timeout expires —
    /// callers must re-check their own condition afterwards either way.
    pub(crate) fn wait_for<F>(&self, timeout: Duration, still_waiting: F)
    where
        F: Fn() -> bool,
    {
        if timeout.is_zero() {
            return;
        }
        let guard = self.lock.lock().unwrap();
        let _ = self
            .cond
            .wait_timeout_while(guard, timeout, |()| still_waiting());
    }

    /// Wake a single blocked waiter, if any.
    pub(crate) fn notify_one(&self) {
        let _guard = self.lock.lock().unwrap();
        self.cond.notify_one();
    }

    /// Wake every blocked waiter.
    pub(crate) fn notify_all(&self) {
        let _guard = self.lock.lock().unwrap();
        self.cond.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn wakes_on_notify() {
        let waiter = Arc::new(Waiter::new());
        let flag = Arc::new(AtomicBool::new(true));

        let w2 = waiter.clone();
        let f2 = flag.clone();
        let handle = thread::spawn(move || {
            w2.wait_for(Duration::from_secs(5), || f2.load(Ordering::Acquire));
        });

        thread::sleep(Duration::from_millis(20));
        flag.store(false, Ordering::Release);
        waiter.notify_all();
        handle.join().unwrap();
    }

    #[test]
    fn times_out_when_nobody_notifies() {
        let waiter = Waiter::new();
        let started = std::time::Instant::now();
        waiter.wait_for(Duration::from_millis(20), || true);
        assert!(started.elapsed() >= Duration::from_millis(15));
    }
}
