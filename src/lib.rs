// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors

//! An in-process, cross-thread shared key-value cache.
//!
//! Every [`Store`] handle opened under the same name — from any thread in
//! the process — converges onto the same set of keys. Each key has its own
//! futex-style reader/writer lock (`Gate`), so readers never block on an
//! unrelated key's writer and a writer never blocks readers of a different
//! key. Overwriting a key reuses its existing buffer in place when the new
//! value fits, and only reallocates (under the store-wide lock) when it
//! doesn't. A background reaper evicts expired keys in small batches.
//!
//! ```
//! use threadshare::{Store, SetOptions};
//! use serde_json::json;
//!
//! let store = Store::open("sessions");
//! store.set("user:1", json!({"name": "ada"}), SetOptions::default());
//! assert_eq!(store.get("user:1", false), Some(json!({"name": "ada"})));
//! store.close();
//! ```

mod binding;
mod channel;
mod clock;
mod codec;
mod config;
mod error;
mod lock;
mod membership;
mod meta;
mod pattern;
mod reaper;
mod region;
mod registry;
mod spin_lock;
mod store;
mod store_lock;
mod waiter;

pub use codec::Value;
pub use config::StoreConfig;
pub use store::{SetOptions, Store};
