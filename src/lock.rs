// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// `Gate` generalises cpp-ipc's single-word `rw_lock` (see the now-removed
// shared-memory original this module is ported from) into a two-word
// futex-style reader/writer lock: one atomic for the live reader count, one
// for the writer flag, each paired with a `Waiter` so a blocked thread
// parks instead of spinning. Every key's `MetaHeader` and every store's
// `StoreLockRegion` embed one `Gate`.

use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::time::{Duration, Instant};

use crate::waiter::Waiter;

/// A futex-style reader/writer lock.
///
/// `readers` counts threads currently holding the shared lock. `writer` is
/// 0 when free and 1 while a writer holds (or is draining into) the lock.
/// Unlike cpp-ipc's single-word `rw_lock`, the two words are split so a
/// waiting reader only has to watch the writer word and a waiting writer
/// only has to watch the reader count — no bit-packing, no CAS retry loop
/// shared between unrelated state transitions.
pub(crate) struct Gate {
    readers: AtomicI32,
    writer: AtomicU32,
    writer_waiter: Waiter,
    readers_waiter: Waiter,
}

impl Gate {
    pub(crate) fn new() -> Self {
        Self {
            readers: AtomicI32::new(0),
            writer: AtomicU32::new(0),
            writer_waiter: Waiter::new(),
            readers_waiter: Waiter::new(),
        }
    }

    pub(crate) fn reader_count(&self) -> i32 {
        self.readers.load(Ordering::Acquire)
    }

    pub(crate) fn writer_held(&self) -> bool {
        self.writer.load(Ordering::Acquire) != 0
    }
}

/// How long each `Waiter::wait_for` slice is capped to, so a lock holder
/// that releases just after we gave up checking still wakes us promptly
/// rather than after the full remaining timeout.
const RETRY_SLICE: Duration = Duration::from_millis(10);

fn deadline_from(timeout_ms: u64) -> Instant {
    Instant::now() + Duration::from_millis(timeout_ms)
}

fn slice_until(deadline: Instant) -> Duration {
    deadline.saturating_duration_since(Instant::now()).min(RETRY_SLICE)
}

/// Acquire the shared (read) lock. Retries until a writer is not present,
/// backing off onto the writer waiter between attempts. Returns `false`
/// once `timeout_ms` has elapsed without success.
pub(crate) fn acquire_shared(gate: &Gate, timeout_ms: u64) -> bool {
    let deadline = deadline_from(timeout_ms);
    loop {
        gate.readers.fetch_add(1, Ordering::AcqRel);
        if gate.writer.load(Ordering::Acquire) == 0 {
            return true;
        }
        // A writer holds (or is draining into) the lock; back off.
        gate.readers.fetch_sub(1, Ordering::AcqRel);
        if Instant::now() >= deadline {
            return false;
        }
        gate.writer_waiter
            .wait_for(slice_until(deadline), || gate.writer.load(Ordering::Acquire) != 0);
        if Instant::now() >= deadline {
            return false;
        }
    }
}

/// Release a previously-acquired shared lock, waking a draining writer if
/// this was the last reader.
pub(crate) fn release_shared(gate: &Gate) {
    let prev = gate.readers.fetch_sub(1, Ordering::AcqRel);
    if prev == 1 {
        gate.readers_waiter.notify_one();
    }
}

/// Acquire the exclusive (write) lock: first claim the writer word, then
/// drain any in-flight readers. Returns `false` once `timeout_ms` has
/// elapsed without success, releasing the writer word again if it had
/// already been claimed.
pub(crate) fn acquire_exclusive(gate: &Gate, timeout_ms: u64) -> bool {
    let deadline = deadline_from(timeout_ms);
    loop {
        if gate
            .writer
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            break;
        }
        if Instant::now() >= deadline {
            return false;
        }
        gate.writer_waiter
            .wait_for(slice_until(deadline), || gate.writer.load(Ordering::Acquire) != 0);
        if Instant::now() >= deadline {
            return false;
        }
    }
    loop {
        if gate.readers.load(Ordering::Acquire) == 0 {
            return true;
        }
        if Instant::now() >= deadline {
            gate.writer.store(0, Ordering::Release);
            gate.writer_waiter.notify_all();
            return false;
        }
        gate.readers_waiter
            .wait_for(slice_until(deadline), || gate.readers.load(Ordering::Acquire) != 0);
    }
}

/// Non-blocking exclusive acquire: succeeds only if the writer word is free
/// and no readers are currently in. Used by pattern deletes, which must not
/// stall the caller behind contended keys.
pub(crate) fn try_acquire_exclusive(gate: &Gate) -> bool {
    if gate
        .writer
        .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return false;
    }
    if gate.readers.load(Ordering::Acquire) != 0 {
        gate.writer.store(0, Ordering::Release);
        gate.writer_waiter.notify_all();
        return false;
    }
    true
}

/// Release a previously-acquired exclusive lock.
pub(crate) fn release_exclusive(gate: &Gate) {
    gate.writer.store(0, Ordering::Release);
    gate.writer_waiter.notify_all();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn shared_locks_are_concurrent() {
        let gate = Gate::new();
        assert!(acquire_shared(&gate, 100));
        assert!(acquire_shared(&gate, 100));
        assert_eq!(gate.reader_count(), 2);
        release_shared(&gate);
        release_shared(&gate);
        assert_eq!(gate.reader_count(), 0);
    }

    #[test]
    fn exclusive_excludes_shared() {
        let gate = Arc::new(Gate::new());
        assert!(acquire_exclusive(&gate, 100));
        assert!(!acquire_shared(&gate, 30));
        release_exclusive(&gate);
        assert!(acquire_shared(&gate, 100));
    }

    #[test]
    fn exclusive_waits_for_readers_to_drain() {
        let gate = Arc::new(Gate::new());
        assert!(acquire_shared(&gate, 100));

        let g2 = gate.clone();
        let writer = thread::spawn(move || acquire_exclusive(&g2, 500));

        thread::sleep(Duration::from_millis(30));
        release_shared(&gate);
        assert!(writer.join().unwrap());
        release_exclusive(&gate);
    }

    #[test]
    fn try_acquire_exclusive_fails_under_contention() {
        let gate = Gate::new();
        assert!(acquire_shared(&gate, 100));
        assert!(!try_acquire_exclusive(&gate));
        release_shared(&gate);
        assert!(try_acquire_exclusive(&gate));
    }

    #[test]
    fn acquire_exclusive_times_out() {
        let gate = Gate::new();
        assert!(acquire_exclusive(&gate, 100));
        assert!(!acquire_exclusive(&gate, 30));
    }
}
