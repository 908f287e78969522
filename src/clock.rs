// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors

//! A process-wide monotonic millisecond clock, used for TTL deadlines and
//! membership init timestamps. Built on `Instant` rather than wall-clock
//! time so expiry and election ordering are immune to clock adjustments.

use once_cell::sync::Lazy;
use std::time::Instant;

static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Milliseconds elapsed since the first call into this module in the
/// process's lifetime. Monotonic, never wraps in practice, comparable
/// across every thread and every `Store` handle.
pub(crate) fn now_ms() -> u64 {
    EPOCH.elapsed().as_millis() as u64
}
