// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors

//! Per-thread handle cache: repeated `Store::open` calls for the same name
//! from the same OS thread return the same `Arc<SharedState>` instead of
//! paying for a fresh membership handshake and a fresh listener/reaper
//! thread pair every time. Handles opened from different threads still
//! converge on the same keys — that convergence happens over the
//! broadcast bus in `crate::channel`, not by sharing this cache.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::store::{SharedState, Store};

thread_local! {
    static HANDLES: RefCell<HashMap<String, Arc<SharedState>>> = RefCell::new(HashMap::new());
}

pub(crate) fn open_handle(name: &str, config: StoreConfig) -> Store {
    HANDLES.with(|cell| {
        let mut map = cell.borrow_mut();
        if let Some(shared) = map.get(name) {
            return Store::from_shared(shared.clone());
        }
        let shared = SharedState::new(name, config);
        map.insert(name.to_string(), shared.clone());
        Store::from_shared(shared)
    })
}

pub(crate) fn close_handle(name: &str) {
    HANDLES.with(|cell| {
        cell.borrow_mut().remove(name);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::store::SetOptions;

    #[test]
    fn same_thread_reopen_returns_cached_handle() {
        let name = "registry-test-cache";
        let a = open_handle(name, StoreConfig::default());
        let b = open_handle(name, StoreConfig::default());
        a.set("k", json!(1), SetOptions::default());
        // Same cached Arc<SharedState>, so this is visible without going
        // through the broadcast bus at all.
        assert_eq!(b.get("k", false), Some(json!(1)));
        a.close();
    }

    #[test]
    fn close_evicts_the_cache_entry_so_reopen_rebuilds_state() {
        let name = "registry-test-close";
        let a = open_handle(name, StoreConfig::default());
        a.set("k", json!(1), SetOptions::default());
        a.close();
        let b = open_handle(name, StoreConfig::default());
        assert_eq!(b.get("k", false), None);
        b.close();
    }
}
