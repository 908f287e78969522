// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors

//! `Store` is the public handle onto a named, process-wide shared cache.
//! Every thread that calls [`Store::open`] with the same name converges
//! onto the same set of keys via the membership handshake in
//! `crate::membership` and the broadcast bus in `crate::channel`, while
//! keeping its own local `bindings`/`ttl` maps so reads never cross a
//! lock boundary that isn't the key's own `Gate`.

use std::cell::UnsafeCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::Receiver;

use crate::binding::Binding;
use crate::channel::{self, Bus, Msg};
use crate::clock;
use crate::codec::{self, Value};
use crate::config::StoreConfig;
use crate::error::CacheError;
use crate::lock;
use crate::membership;
use crate::meta::MetaHeader;
use crate::pattern;
use crate::reaper::ReaperHandle;
use crate::region::DataRegion;
use crate::spin_lock::SpinLock;
use crate::store_lock::StoreLockRegion;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Maximum key length in bytes.
const MAX_KEY_LEN: usize = 512;

/// Options for [`Store::set`].
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    /// Ensure the key's buffer has at least this many bytes of capacity,
    /// even if the packed value is smaller — lets a caller pre-size a slot
    /// it expects to grow into later without forcing a reallocation then.
    pub min_buffer_size: Option<usize>,
    /// Never shrink or reuse this key's buffer in place; always allocate a
    /// fresh one on every `set`.
    pub immutable: bool,
    /// Time-to-live in seconds. `None` clears any previously set TTL.
    pub ttl_secs: Option<u64>,
    /// Skip acquiring the key's exclusive lock — the caller must already
    /// hold it via a prior [`Store::lock`] call.
    pub skip_lock: bool,
}

struct Inner {
    bindings: HashMap<String, Binding>,
    ttl: HashMap<String, u64>,
}

pub(crate) struct SharedState {
    name: String,
    id: u64,
    config: StoreConfig,
    inner: Mutex<Inner>,
    // Guarded entirely by `store_lock_guard`; never read or written without
    // it held. A spin lock rather than a `Mutex` since the critical section
    // is a single pointer clone or swap (see `current_store_lock` and
    // `adopt_store_lock`), mirroring cpp-ipc's `service_registry.rs` use of
    // a spinlock around a small fixed-size registry.
    store_lock_region: UnsafeCell<Arc<StoreLockRegion>>,
    store_lock_guard: SpinLock,
    init_timestamp: AtomicU64,
    bus: Arc<Bus>,
    closed: AtomicBool,
    listener: Mutex<Option<JoinHandle<()>>>,
    reaper: Mutex<Option<ReaperHandle>>,
}

// Safety: `store_lock_region` is the only non-Sync-by-default field, and
// every access to it is mediated by `store_lock_guard`.
unsafe impl Sync for SharedState {}

impl SharedState {
    pub(crate) fn new(name: &str, config: StoreConfig) -> Arc<Self> {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let bus = channel::bus_for(name);
        let rx = bus.subscribe(id, config.channel_capacity);
        let init_timestamp = clock::now_ms();

        let shared = Arc::new(Self {
            name: name.to_string(),
            id,
            config: config.clone(),
            inner: Mutex::new(Inner {
                bindings: HashMap::new(),
                ttl: HashMap::new(),
            }),
            store_lock_region: UnsafeCell::new(Arc::new(StoreLockRegion::new())),
            store_lock_guard: SpinLock::new(),
            init_timestamp: AtomicU64::new(init_timestamp),
            bus: bus.clone(),
            closed: AtomicBool::new(false),
            listener: Mutex::new(None),
            reaper: Mutex::new(None),
        });

        let listener_shared = shared.clone();
        let listener_handle = std::thread::spawn(move || listen(listener_shared, rx));
        *shared.listener.lock().unwrap() = Some(listener_handle);

        let reaper = ReaperHandle::spawn(shared.clone(), config.reaper_interval_ms, config.reaper_batch);
        *shared.reaper.lock().unwrap() = Some(reaper);

        bus.publish(Msg::InitializeRequest {
            origin: id,
            timestamp: init_timestamp,
        });

        log::debug!("store '{}' handle {} opened", name, id);
        shared
    }

    fn current_store_lock(&self) -> Arc<StoreLockRegion> {
        self.store_lock_guard.lock();
        // Safety: guarded by store_lock_guard.
        let current = unsafe { (*self.store_lock_region.get()).clone() };
        self.store_lock_guard.unlock();
        current
    }

    fn adopt_store_lock(&self, region: Arc<StoreLockRegion>) {
        self.store_lock_guard.lock();
        // Safety: guarded by store_lock_guard.
        unsafe {
            *self.store_lock_region.get() = region;
        }
        self.store_lock_guard.unlock();
    }

    // -- public operations, called through `Store` -------------------------

    fn set_internal(&self, key: &str, value: Value, opts: SetOptions) -> Result<bool, CacheError> {
        validate_key(key)?;
        if value.is_null() {
            return Err(CacheError::InvalidValue("value is absent (null)".to_string()));
        }
        let payload = codec::pack(&value)?;
        let required = opts.min_buffer_size.unwrap_or(0).max(payload.len());

        let existing = {
            let inner = self.inner.lock().unwrap();
            inner.bindings.get(key).cloned()
        };

        if let Some(binding) = &existing {
            if !opts.skip_lock && !lock::acquire_exclusive(&binding.meta.gate, self.config.lock_timeout_ms) {
                return Err(CacheError::LockTimeout);
            }
        }

        let absolute_ttl = opts.ttl_secs.map(|secs| clock::now_ms() + secs * 1000);

        let reuse_in_place = existing
            .as_ref()
            .map(|b| !opts.immutable && b.data.byte_length() >= required)
            .unwrap_or(false);

        let result = if reuse_in_place {
            let binding = existing.as_ref().unwrap();
            unsafe {
                binding.data.write(&payload);
            }
            binding.meta.set_payload_len(payload.len() as u32);

            let mut inner = self.inner.lock().unwrap();
            match absolute_ttl {
                Some(exp) => {
                    inner.ttl.insert(key.to_string(), exp);
                }
                None => {
                    inner.ttl.remove(key);
                }
            }
            drop(inner);

            self.bus.publish(Msg::TtlSet {
                origin: self.id,
                key: key.to_string(),
                ttl: absolute_ttl,
            });
            Ok(true)
        } else {
            let new_meta = Arc::new(MetaHeader::new());
            new_meta.set_payload_len(payload.len() as u32);
            let new_data = Arc::new(DataRegion::new(required));
            unsafe {
                new_data.write(&payload);
            }
            let new_binding = Binding {
                meta: new_meta,
                data: new_data,
            };

            let store_lock = self.current_store_lock();
            if !lock::acquire_exclusive(&store_lock.gate, self.config.lock_timeout_ms) {
                Err(CacheError::StoreLockTimeout)
            } else {
                {
                    let mut inner = self.inner.lock().unwrap();
                    inner.bindings.insert(key.to_string(), new_binding.clone());
                    match absolute_ttl {
                        Some(exp) => {
                            inner.ttl.insert(key.to_string(), exp);
                        }
                        None => {
                            inner.ttl.remove(key);
                        }
                    }
                }
                self.bus.publish(Msg::Set {
                    origin: self.id,
                    key: key.to_string(),
                    binding: new_binding,
                    ttl: absolute_ttl,
                });
                lock::release_exclusive(&store_lock.gate);
                Ok(true)
            }
        };

        if let (Some(binding), false) = (&existing, opts.skip_lock) {
            lock::release_exclusive(&binding.meta.gate);
        }

        result
    }

    fn get_internal(&self, key: &str, skip_lock: bool) -> Result<Option<Value>, CacheError> {
        validate_key(key)?;
        let binding = {
            let inner = self.inner.lock().unwrap();
            inner.bindings.get(key).cloned()
        };
        let binding = match binding {
            Some(b) => b,
            None => return Ok(None),
        };

        if !skip_lock && !lock::acquire_shared(&binding.meta.gate, self.config.lock_timeout_ms) {
            return Err(CacheError::LockTimeout);
        }

        let len = binding.meta.payload_len() as usize;
        let cap = binding.data.byte_length();
        let bytes = if len == 0 || len > cap {
            if len > cap {
                log::warn!(
                    "store '{}' key '{}': {}",
                    self.name,
                    key,
                    CacheError::BadPayload {
                        len: len as u32,
                        capacity: cap
                    }
                );
            }
            None
        } else {
            Some(unsafe { binding.data.read_copy(len) })
        };

        if !skip_lock {
            lock::release_shared(&binding.meta.gate);
        }

        match bytes {
            None => Ok(None),
            Some(raw) => match codec::unpack(&raw) {
                Ok(v) => Ok(Some(v)),
                Err(e) => {
                    log::warn!("store '{}' key '{}': {}", self.name, key, e);
                    Ok(None)
                }
            },
        }
    }

    fn delete_internal(&self, key: &str) -> Result<bool, CacheError> {
        validate_key(key)?;
        if pattern::is_pattern(key) {
            return self.delete_pattern_internal(key);
        }
        let binding = {
            let inner = self.inner.lock().unwrap();
            inner.bindings.get(key).cloned()
        };
        let binding = match binding {
            Some(b) => b,
            None => return Ok(false),
        };

        if !lock::acquire_exclusive(&binding.meta.gate, self.config.lock_timeout_ms) {
            return Err(CacheError::LockTimeout);
        }

        let store_lock = self.current_store_lock();
        if !lock::acquire_exclusive(&store_lock.gate, self.config.lock_timeout_ms) {
            lock::release_exclusive(&binding.meta.gate);
            return Err(CacheError::StoreLockTimeout);
        }

        {
            let mut inner = self.inner.lock().unwrap();
            inner.bindings.remove(key);
            inner.ttl.remove(key);
        }
        self.bus.publish(Msg::Delete {
            origin: self.id,
            key: Some(key.to_string()),
            pattern: None,
        });

        lock::release_exclusive(&store_lock.gate);
        lock::release_exclusive(&binding.meta.gate);
        Ok(true)
    }

    fn delete_pattern_internal(&self, pattern_str: &str) -> Result<bool, CacheError> {
        let re = pattern::compile(pattern_str)?;

        let store_lock = self.current_store_lock();
        if !lock::acquire_exclusive(&store_lock.gate, self.config.lock_timeout_ms) {
            return Err(CacheError::StoreLockTimeout);
        }

        let removed = {
            let mut inner = self.inner.lock().unwrap();
            let matching: Vec<String> = inner
                .bindings
                .keys()
                .filter(|k| re.is_match(k))
                .cloned()
                .collect();

            let mut removed = Vec::new();
            for key in matching {
                let binding = inner.bindings.get(&key).unwrap().clone();
                if lock::try_acquire_exclusive(&binding.meta.gate) {
                    inner.bindings.remove(&key);
                    inner.ttl.remove(&key);
                    removed.push(key);
                }
            }
            removed
        };

        if !removed.is_empty() {
            self.bus.publish(Msg::Delete {
                origin: self.id,
                key: None,
                pattern: Some(pattern_str.to_string()),
            });
        }

        lock::release_exclusive(&store_lock.gate);
        Ok(!removed.is_empty())
    }

    fn list_keys_internal(&self, pattern_str: Option<&str>) -> Result<Vec<String>, CacheError> {
        let re = match pattern_str {
            Some(p) => Some(pattern::compile(p)?),
            None => None,
        };
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .bindings
            .keys()
            .filter(|k| re.as_ref().map(|r| r.is_match(k)).unwrap_or(true))
            .cloned()
            .collect())
    }

    fn lock_internal(&self, key: &str, timeout_ms: u64) -> Result<bool, CacheError> {
        validate_key(key)?;
        let binding = {
            let mut inner = self.inner.lock().unwrap();
            inner
                .bindings
                .entry(key.to_string())
                .or_insert_with(|| Binding {
                    meta: Arc::new(MetaHeader::new()),
                    data: Arc::new(DataRegion::new(0)),
                })
                .clone()
        };
        Ok(lock::acquire_exclusive(&binding.meta.gate, timeout_ms))
    }

    fn release_internal(&self, key: &str) -> Result<bool, CacheError> {
        validate_key(key)?;
        let binding = {
            let inner = self.inner.lock().unwrap();
            inner.bindings.get(key).cloned()
        };
        match binding {
            Some(b) => {
                lock::release_exclusive(&b.meta.gate);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn clear_internal(&self) {
        let store_lock = self.current_store_lock();
        let acquired = lock::acquire_exclusive(&store_lock.gate, self.config.lock_timeout_ms);

        {
            let mut inner = self.inner.lock().unwrap();
            inner.bindings.clear();
            inner.ttl.clear();
        }
        self.bus.publish(Msg::Clear { origin: self.id });

        if acquired {
            lock::release_exclusive(&store_lock.gate);
        }
    }

    fn close_internal(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.bus.unsubscribe(self.id);
        if let Some(handle) = self.listener.lock().unwrap().take() {
            let _ = handle.join();
        }
        if let Some(mut reaper) = self.reaper.lock().unwrap().take() {
            reaper.stop_and_join();
        }
        let mut inner = self.inner.lock().unwrap();
        inner.bindings.clear();
        inner.ttl.clear();
        log::debug!("store '{}' handle {} closed", self.name, self.id);
    }

    /// Sweep up to `batch` TTL candidates starting at `cursor`, evicting
    /// any that have expired. Returns the cursor to resume from on the
    /// next tick.
    pub(crate) fn reap_batch(&self, cursor: usize, batch: usize) -> usize {
        let now = clock::now_ms();
        let expired: Vec<String> = {
            let inner = self.inner.lock().unwrap();
            if inner.ttl.is_empty() {
                return 0;
            }
            let mut keys: Vec<&String> = inner.ttl.keys().collect();
            keys.sort();
            let len = keys.len();
            let start = cursor % len;
            (0..batch.min(len))
                .map(|i| keys[(start + i) % len])
                .filter(|k| inner.ttl.get(*k).copied().unwrap_or(u64::MAX) <= now)
                .cloned()
                .collect()
        };

        for key in &expired {
            if let Some(binding) = {
                let inner = self.inner.lock().unwrap();
                inner.bindings.get(key).cloned()
            } {
                if lock::try_acquire_exclusive(&binding.meta.gate) {
                    let mut inner = self.inner.lock().unwrap();
                    inner.bindings.remove(key);
                    inner.ttl.remove(key);
                    drop(inner);
                    self.bus.publish(Msg::Delete {
                        origin: self.id,
                        key: Some(key.clone()),
                        pattern: None,
                    });
                }
            }
        }

        if !expired.is_empty() {
            log::trace!("store '{}' reaper evicted {} key(s)", self.name, expired.len());
        }

        let inner = self.inner.lock().unwrap();
        let len = inner.ttl.len().max(1);
        (cursor + batch) % len
    }

    fn apply_message(&self, msg: Msg) {
        if msg.origin() == self.id {
            return;
        }
        match msg {
            Msg::Set { key, binding, ttl, .. } => {
                let mut inner = self.inner.lock().unwrap();
                inner.bindings.insert(key.clone(), binding);
                match ttl {
                    Some(exp) => {
                        inner.ttl.insert(key, exp);
                    }
                    None => {
                        inner.ttl.remove(&key);
                    }
                }
            }
            Msg::TtlSet { key, ttl, .. } => {
                let mut inner = self.inner.lock().unwrap();
                if inner.bindings.contains_key(&key) {
                    match ttl {
                        Some(exp) => {
                            inner.ttl.insert(key, exp);
                        }
                        None => {
                            inner.ttl.remove(&key);
                        }
                    }
                }
            }
            Msg::Delete { key, pattern: pat, .. } => {
                let mut inner = self.inner.lock().unwrap();
                if let Some(k) = key {
                    inner.bindings.remove(&k);
                    inner.ttl.remove(&k);
                } else if let Some(p) = pat {
                    if let Ok(re) = pattern::compile(&p) {
                        let matching: Vec<String> =
                            inner.bindings.keys().filter(|k| re.is_match(k)).cloned().collect();
                        for k in matching {
                            inner.bindings.remove(&k);
                            inner.ttl.remove(&k);
                        }
                    }
                }
            }
            Msg::Clear { .. } => {
                let mut inner = self.inner.lock().unwrap();
                inner.bindings.clear();
                inner.ttl.clear();
            }
            Msg::InitializeRequest { timestamp, .. } => {
                let own = self.init_timestamp.load(Ordering::Acquire);
                if membership::should_respond(own, timestamp) {
                    let (keys, store_lock) = {
                        let inner = self.inner.lock().unwrap();
                        let keys = inner
                            .bindings
                            .iter()
                            .map(|(k, b)| (k.clone(), b.clone(), inner.ttl.get(k).copied()))
                            .collect();
                        (keys, self.current_store_lock())
                    };
                    self.bus.publish(Msg::InitializeResponse {
                        origin: self.id,
                        timestamp: own,
                        store_lock,
                        keys,
                    });
                }
            }
            Msg::InitializeResponse {
                timestamp,
                store_lock,
                keys,
                ..
            } => {
                let local = self.init_timestamp.load(Ordering::Acquire);
                if membership::should_apply(local, timestamp) {
                    {
                        let mut inner = self.inner.lock().unwrap();
                        for (key, binding, ttl) in keys {
                            inner.bindings.insert(key.clone(), binding);
                            match ttl {
                                Some(exp) => {
                                    inner.ttl.insert(key, exp);
                                }
                                None => {
                                    inner.ttl.remove(&key);
                                }
                            }
                        }
                    }
                    self.adopt_store_lock(store_lock);
                    self.init_timestamp.store(timestamp, Ordering::Release);
                    log::debug!(
                        "store '{}' handle {} adopted snapshot from an older peer",
                        self.name,
                        self.id
                    );
                }
            }
        }
    }
}

fn listen(shared: Arc<SharedState>, rx: Receiver<Msg>) {
    loop {
        match rx.recv() {
            Ok(msg) => shared.apply_message(msg),
            Err(_) => break,
        }
    }
}

fn validate_key(key: &str) -> Result<(), CacheError> {
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return Err(CacheError::InvalidKey);
    }
    Ok(())
}

/// A handle onto a named, process-wide shared cache.
///
/// Obtain one with [`Store::open`] or [`Store::open_with_config`]. Every
/// call from the same OS thread with the same name returns a handle backed
/// by the same underlying state; calls from other threads converge onto
/// the same keys via the membership protocol rather than sharing the Rust
/// value itself.
pub struct Store {
    shared: Arc<SharedState>,
}

impl Store {
    /// Open (or create) the named store with default configuration.
    pub fn open(name: &str) -> Store {
        Self::open_with_config(name, StoreConfig::default())
    }

    /// Open (or create) the named store with an explicit configuration.
    /// Configuration is only honored the first time a given thread opens
    /// a given name; subsequent calls from the same thread return the
    /// cached handle as-is.
    pub fn open_with_config(name: &str, config: StoreConfig) -> Store {
        crate::registry::open_handle(name, config)
    }

    pub(crate) fn from_shared(shared: Arc<SharedState>) -> Self {
        Store { shared }
    }

    /// Store `value` under `key`. Returns `false` if the key is invalid,
    /// the value cannot be serialized, or a required lock was not
    /// acquired within its timeout.
    pub fn set(&self, key: &str, value: Value, options: SetOptions) -> bool {
        match self.shared.set_internal(key, value, options) {
            Ok(ok) => ok,
            Err(e) => {
                log::warn!("store '{}' set('{}') failed: {}", self.shared.name, key, e);
                false
            }
        }
    }

    /// Fetch the value stored under `key`, or `None` if absent, expired,
    /// corrupt, or the lock could not be acquired.
    pub fn get(&self, key: &str, skip_lock: bool) -> Option<Value> {
        match self.shared.get_internal(key, skip_lock) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("store '{}' get('{}') failed: {}", self.shared.name, key, e);
                None
            }
        }
    }

    /// Remove `key`. If `key` is a pattern (glob or `/regex/`), removes
    /// every matching key instead. Returns `true` if at least one binding
    /// was actually removed.
    pub fn delete(&self, key: &str) -> bool {
        match self.shared.delete_internal(key) {
            Ok(ok) => ok,
            Err(e) => {
                log::warn!("store '{}' delete('{}') failed: {}", self.shared.name, key, e);
                false
            }
        }
    }

    /// List keys, optionally filtered by a glob or `/regex/` pattern.
    pub fn list_keys(&self, pattern: Option<&str>) -> Vec<String> {
        match self.shared.list_keys_internal(pattern) {
            Ok(keys) => keys,
            Err(e) => {
                log::warn!("store '{}' list_keys failed: {}", self.shared.name, e);
                Vec::new()
            }
        }
    }

    /// Acquire `key`'s exclusive lock explicitly, creating the key (with
    /// an empty buffer) if it does not already exist. Pair with
    /// [`Store::release`] and `SetOptions { skip_lock: true, .. }`.
    pub fn lock(&self, key: &str, timeout_ms: Option<u64>) -> bool {
        let timeout = timeout_ms.unwrap_or(self.shared.config.lock_timeout_ms);
        match self.shared.lock_internal(key, timeout) {
            Ok(ok) => ok,
            Err(e) => {
                log::warn!("store '{}' lock('{}') failed: {}", self.shared.name, key, e);
                false
            }
        }
    }

    /// Release `key`'s exclusive lock previously acquired via
    /// [`Store::lock`]. Returns `false` if the key does not exist.
    pub fn release(&self, key: &str) -> bool {
        match self.shared.release_internal(key) {
            Ok(ok) => ok,
            Err(e) => {
                log::warn!("store '{}' release('{}') failed: {}", self.shared.name, key, e);
                false
            }
        }
    }

    /// Remove every key in the store, locally and on every converged peer.
    pub fn clear(&self) {
        self.shared.clear_internal();
    }

    /// Stop this handle's reaper and listener threads and unsubscribe
    /// from the store's bus. Idempotent; other handles (this thread's or
    /// another's) are unaffected.
    pub fn close(&self) {
        self.shared.close_internal();
        crate::registry::close_handle(&self.shared.name);
    }

    /// Number of keys currently visible to this handle.
    pub fn len(&self) -> usize {
        self.shared.inner.lock().unwrap().bindings.len()
    }

    /// Whether this handle currently sees no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` currently exists on this handle.
    pub fn contains_key(&self, key: &str) -> bool {
        self.shared.inner.lock().unwrap().bindings.contains_key(key)
    }

    /// Time remaining before `key` expires, or `None` if it has no TTL or
    /// does not exist.
    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        let inner = self.shared.inner.lock().unwrap();
        let expiry = *inner.ttl.get(key)?;
        let now = clock::now_ms();
        Some(Duration::from_millis(expiry.saturating_sub(now)))
    }

    /// Number of distinct handles (across all threads) currently
    /// subscribed to this store's bus.
    pub fn peer_count(&self) -> usize {
        self.shared.bus.peer_count()
    }
}
