// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors

//! Internal error type. Every public `Store` method collapses this down to
//! a sentinel (`bool`, `Option<_>`, or an empty `Vec`) before it crosses
//! the API boundary — callers never see a `Result` or catch a panic. The
//! enum exists so internal plumbing can propagate a specific reason with
//! `?`, and so `log::warn!` has something concrete to print.

use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum CacheError {
    #[error("key must be a nonempty string of at most 512 bytes")]
    InvalidKey,

    #[error("value could not be serialized: {0}")]
    InvalidValue(String),

    #[error("per-key lock not acquired within timeout")]
    LockTimeout,

    #[error("store-wide lock not acquired within timeout")]
    StoreLockTimeout,

    #[error("stored payload ({len} bytes) exceeds buffer capacity ({capacity} bytes)")]
    BadPayload { len: u32, capacity: usize },

    #[error("stored payload could not be decoded: {0}")]
    DecodeFailure(String),

    #[error("invalid key pattern: {0}")]
    PatternCompile(String),
}
