// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors

//! Tunables for a `Store`. Mirrors the handful of constants the cpp-ipc
//! channel left hard-coded (poll intervals, ring capacity) but exposes them
//! as a configuration struct instead, since this crate has more of them and
//! they are meaningful to tune per deployment.

/// Configuration for a [`crate::Store`] handle.
///
/// Pass to [`crate::Store::open_with_config`]; [`crate::Store::open`] uses
/// [`StoreConfig::default`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Default timeout, in milliseconds, for per-key and store-wide lock
    /// acquisition when an operation does not specify its own.
    pub lock_timeout_ms: u64,

    /// Upper bound, in milliseconds, on each retry slice a blocked lock
    /// waiter sleeps for before re-checking its predicate.
    pub futex_retry_ms: u64,

    /// How often the TTL reaper thread wakes to sweep a batch of expired
    /// keys, in milliseconds.
    pub reaper_interval_ms: u64,

    /// Maximum number of keys the TTL reaper inspects per tick.
    pub reaper_batch: usize,

    /// Bounded capacity of each subscriber's broadcast channel queue.
    pub channel_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 1_000,
            futex_retry_ms: 10,
            reaper_interval_ms: 1_000,
            reaper_batch: 250,
            channel_capacity: 256,
        }
    }
}
