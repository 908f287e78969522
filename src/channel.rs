// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Replaces the cpp-ipc epoch-based shared-memory ring buffer this crate's
// channel module used to wrap. That design existed to move bytes between
// processes through a fixed-size slot array with an epoch counter guarding
// against torn reads; none of that applies when every subscriber lives in
// the same process. A named bus of bounded `crossbeam-channel` senders, one
// per subscribed handle, gives the same "broadcast to every live peer"
// semantics the old ring buffer's connection bitmask provided, without the
// slot-reclamation bookkeeping.

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use once_cell::sync::Lazy;

use crate::binding::Binding;
use crate::store_lock::StoreLockRegion;

/// Everything broadcast over a store's bus. Each variant carries the
/// originating handle's `origin` id so a listener can skip messages it
/// published itself.
#[derive(Clone)]
pub(crate) enum Msg {
    Set {
        origin: u64,
        key: String,
        binding: Binding,
        ttl: Option<u64>,
    },
    TtlSet {
        origin: u64,
        key: String,
        ttl: Option<u64>,
    },
    Delete {
        origin: u64,
        key: Option<String>,
        pattern: Option<String>,
    },
    Clear {
        origin: u64,
    },
    InitializeRequest {
        origin: u64,
        timestamp: u64,
    },
    InitializeResponse {
        origin: u64,
        timestamp: u64,
        store_lock: Arc<StoreLockRegion>,
        keys: Vec<(String, Binding, Option<u64>)>,
    },
}

impl Msg {
    pub(crate) fn origin(&self) -> u64 {
        match self {
            Msg::Set { origin, .. }
            | Msg::TtlSet { origin, .. }
            | Msg::Delete { origin, .. }
            | Msg::Clear { origin }
            | Msg::InitializeRequest { origin, .. }
            | Msg::InitializeResponse { origin, .. } => *origin,
        }
    }
}

/// A named, process-wide broadcast bus. Every `Store` handle opened under
/// the same name subscribes to the same `Bus`, discovered through the
/// global registry below.
pub(crate) struct Bus {
    subscribers: std::sync::Mutex<Vec<(u64, Sender<Msg>)>>,
}

impl Bus {
    fn new() -> Self {
        Self {
            subscribers: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn subscribe(&self, id: u64, capacity: usize) -> Receiver<Msg> {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        self.subscribers.lock().unwrap().push((id, tx));
        rx
    }

    /// Drop this handle's sender, which disconnects its receiver and lets
    /// that handle's listener thread exit its `recv()` loop.
    pub(crate) fn unsubscribe(&self, id: u64) {
        self.subscribers.lock().unwrap().retain(|(hid, _)| *hid != id);
    }

    /// Best-effort broadcast: a subscriber whose queue is full or whose
    /// receiver is gone is dropped from the registry rather than blocking
    /// the publisher, so one stalled listener can never stall every other
    /// handle's `set`/`delete`/`clear`.
    pub(crate) fn publish(&self, msg: Msg) {
        let mut subs = self.subscribers.lock().unwrap();
        subs.retain(|(_, tx)| tx.try_send(msg.clone()).is_ok());
    }

    pub(crate) fn peer_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }
}

static BUSES: Lazy<std::sync::Mutex<HashMap<String, Arc<Bus>>>> =
    Lazy::new(|| std::sync::Mutex::new(HashMap::new()));

/// Fetch (creating if necessary) the process-wide bus for a store name.
pub(crate) fn bus_for(name: &str) -> Arc<Bus> {
    let mut guard = BUSES.lock().unwrap();
    guard
        .entry(name.to_string())
        .or_insert_with(|| Arc::new(Bus::new()))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_reaches_every_subscriber() {
        let bus = Bus::new();
        let rx1 = bus.subscribe(1, 8);
        let rx2 = bus.subscribe(2, 8);

        bus.publish(Msg::Clear { origin: 1 });

        assert!(matches!(rx1.try_recv().unwrap(), Msg::Clear { origin: 1 }));
        assert!(matches!(rx2.try_recv().unwrap(), Msg::Clear { origin: 1 }));
    }

    #[test]
    fn unsubscribe_disconnects_receiver() {
        let bus = Bus::new();
        let rx = bus.subscribe(7, 8);
        bus.unsubscribe(7);
        bus.publish(Msg::Clear { origin: 1 });
        assert!(rx.recv().is_err());
    }

    #[test]
    fn bus_for_returns_same_instance_for_same_name() {
        let a = bus_for("shared-test-bus");
        let b = bus_for("shared-test-bus");
        assert!(Arc::ptr_eq(&a, &b));
    }
}
