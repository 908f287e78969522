// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors

//! Background TTL reaper: one thread per `Store` handle, parked on a
//! condvar so `close()` can wake it immediately instead of waiting out the
//! tick interval. Each tick sweeps at most `reaper_batch` candidate keys,
//! resuming from where the previous tick left off so a large store with a
//! short tick interval amortizes the scan instead of walking every key
//! every second.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::store::SharedState;

pub(crate) struct ReaperHandle {
    stop: Arc<(Mutex<bool>, Condvar)>,
    handle: Option<JoinHandle<()>>,
}

impl ReaperHandle {
    pub(crate) fn spawn(shared: Arc<SharedState>, interval_ms: u64, batch: usize) -> Self {
        let stop = Arc::new((Mutex::new(false), Condvar::new()));
        let stop2 = stop.clone();
        let interval = Duration::from_millis(interval_ms);

        let handle = thread::spawn(move || {
            let mut cursor = 0usize;
            loop {
                let (lock, cond) = &*stop2;
                let guard = lock.lock().unwrap();
                let (guard, _timeout) = cond
                    .wait_timeout_while(guard, interval, |stopped| !*stopped)
                    .unwrap();
                if *guard {
                    return;
                }
                drop(guard);
                cursor = shared.reap_batch(cursor, batch);
            }
        });

        Self {
            stop,
            handle: Some(handle),
        }
    }

    pub(crate) fn stop_and_join(&mut self) {
        {
            let (lock, cond) = &*self.stop;
            let mut guard = lock.lock().unwrap();
            *guard = true;
            cond.notify_all();
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ReaperHandle {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}
