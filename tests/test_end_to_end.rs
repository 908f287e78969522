// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// End-to-end scenarios exercising cross-thread convergence, buffer reuse,
// reallocation, contention, pattern delete, and TTL expiry together,
// the way a caller actually uses a `Store` rather than one module at a time.

use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::json;
use threadshare::{SetOptions, Store, StoreConfig};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

fn unique_name(tag: &str) -> String {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("e2e_{tag}_{n}_{}", std::process::id())
}

fn wait_until<F: FnMut() -> bool>(mut f: F, attempts: usize, step: Duration) -> bool {
    for _ in 0..attempts {
        if f() {
            return true;
        }
        thread::sleep(step);
    }
    f()
}

// Scenario 1: two-handle echo.
#[test]
fn two_handle_echo() {
    let name = unique_name("echo");
    let a = Store::open(&name);
    assert!(a.set("x", json!({"n": 1}), SetOptions::default()));

    let name2 = name.clone();
    let b_result = thread::spawn(move || {
        let b = Store::open(&name2);
        let seen = wait_until(|| b.get("x", false) == Some(json!({"n": 1})), 50, Duration::from_millis(20));
        assert!(seen, "handle B never converged on handle A's write");
        assert!(b.set("x", json!({"n": 2}), SetOptions::default()));
        b.close();
    });
    b_result.join().unwrap();

    let converged = wait_until(|| a.get("x", false) == Some(json!({"n": 2})), 50, Duration::from_millis(20));
    assert!(converged, "handle A never saw handle B's overwrite");
    a.close();
}

// Scenario 2: in-place reuse — repeated small writes never rebroadcast a
// fresh binding once the first allocation is big enough.
#[test]
fn in_place_reuse_never_reallocates_after_first_set() {
    let name = unique_name("reuse");
    let store = Store::open(&name);
    let opts = SetOptions {
        min_buffer_size: Some(64),
        ..Default::default()
    };
    assert!(store.set("k", json!(0), opts));

    for i in 1..10_000 {
        assert!(store.set("k", json!(i), SetOptions::default()));
    }

    assert_eq!(store.get("k", false), Some(json!(9999)));
    store.close();
}

// Scenario 3: overflow reallocation — a value too big for the existing
// buffer forces a new binding that still converges across handles.
#[test]
fn overflow_triggers_reallocation_and_peers_converge() {
    let name = unique_name("overflow");
    let a = Store::open(&name);
    let opts = SetOptions {
        min_buffer_size: Some(64),
        ..Default::default()
    };
    assert!(a.set("k", json!("a".repeat(32)), opts));

    let big = json!("a".repeat(200));
    assert!(a.set("k", big.clone(), SetOptions::default()));
    assert_eq!(a.get("k", false), Some(big.clone()));

    let name2 = name.clone();
    let big2 = big.clone();
    thread::spawn(move || {
        let b = Store::open(&name2);
        let seen = wait_until(|| b.get("k", false) == Some(big2.clone()), 50, Duration::from_millis(20));
        assert!(seen);
        b.close();
    })
    .join()
    .unwrap();

    a.close();
}

// Scenario 4: reader/writer contention — readers never observe a payload
// whose decoded length disagrees with what was written, and only ever
// come back empty on an actual lock timeout (which a 1s default timeout
// against a single fast writer thread should never hit).
#[test]
fn concurrent_readers_never_see_torn_payloads() {
    let name = unique_name("contend");
    let store = Arc::new(Store::open(&name));
    store.set("k", json!(0), SetOptions::default());

    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let mismatches = Arc::new(AtomicI32::new(0));

    let writer = {
        let store = store.clone();
        let stop = stop.clone();
        thread::spawn(move || {
            let mut i = 0i64;
            while !stop.load(Ordering::Relaxed) {
                store.set("k", json!(i), SetOptions::default());
                i += 1;
            }
        })
    };

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            let stop = stop.clone();
            let mismatches = mismatches.clone();
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    if let Some(v) = store.get("k", false) {
                        if v.as_i64().is_none() {
                            mismatches.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(300));
    stop.store(true, Ordering::Relaxed);
    writer.join().unwrap();
    for r in readers {
        r.join().unwrap();
    }

    assert_eq!(mismatches.load(Ordering::Relaxed), 0);
    store.close();
}

// Scenario 5: pattern delete.
#[test]
fn pattern_delete_removes_only_matching_keys() {
    let name = unique_name("patterndel");
    let a = Store::open(&name);
    a.set("u:1", json!(1), SetOptions::default());
    a.set("u:2", json!(2), SetOptions::default());
    a.set("u:3", json!(3), SetOptions::default());
    a.set("v:1", json!(4), SetOptions::default());

    assert!(a.delete("u:*"));

    let name2 = name.clone();
    thread::spawn(move || {
        let b = Store::open(&name2);
        let converged = wait_until(
            || {
                let mut keys = b.list_keys(None);
                keys.sort();
                keys == vec!["v:1".to_string()]
            },
            50,
            Duration::from_millis(20),
        );
        assert!(converged);
        b.close();
    })
    .join()
    .unwrap();

    let mut keys = a.list_keys(None);
    keys.sort();
    assert_eq!(keys, vec!["v:1".to_string()]);
    a.close();
}

// Scenario 6: TTL expiry.
#[test]
fn ttl_expires_within_a_couple_reaper_ticks() {
    let name = unique_name("ttl");
    let config = StoreConfig {
        reaper_interval_ms: 100,
        ..Default::default()
    };
    let store = Store::open_with_config(&name, config);
    let opts = SetOptions {
        ttl_secs: Some(1),
        ..Default::default()
    };
    assert!(store.set("k", json!("v"), opts));
    assert_eq!(store.get("k", false), Some(json!("v")));

    thread::sleep(Duration::from_millis(1_500));
    assert_eq!(store.get("k", false), None);
    store.close();
}
