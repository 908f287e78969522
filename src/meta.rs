// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors

//! `MetaHeader` is the per-key control block: the `Gate` that arbitrates
//! reader/writer access to the key's `DataRegion`, plus the current
//! payload length (the region's capacity may be larger than what's
//! actually written, to absorb future in-place grows).

use std::sync::atomic::{AtomicU32, Ordering};

use crate::lock::Gate;

pub(crate) struct MetaHeader {
    pub(crate) gate: Gate,
    payload_len: AtomicU32,
}

impl MetaHeader {
    pub(crate) fn new() -> Self {
        Self {
            gate: Gate::new(),
            payload_len: AtomicU32::new(0),
        }
    }

    pub(crate) fn payload_len(&self) -> u32 {
        self.payload_len.load(Ordering::Acquire)
    }

    pub(crate) fn set_payload_len(&self, len: u32) {
        self.payload_len.store(len, Ordering::Release);
    }
}
