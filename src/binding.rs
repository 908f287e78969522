// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors

//! A `Binding` pairs a key's `MetaHeader` (lock + length) with its
//! `DataRegion` (bytes). Cloning a `Binding` clones two `Arc`s — cheap,
//! and what lets the same underlying buffers be installed into multiple
//! threads' local maps by a broadcast `Msg::Set`.

use std::sync::Arc;

use crate::meta::MetaHeader;
use crate::region::DataRegion;

#[derive(Clone)]
pub(crate) struct Binding {
    pub(crate) meta: Arc<MetaHeader>,
    pub(crate) data: Arc<DataRegion>,
}
