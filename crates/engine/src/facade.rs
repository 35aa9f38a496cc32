//! `Keyspace`: the commands façade, the contract the core exposes to the
//! command layer. It owns one `Dict<String, ValueObject>` — "the
//! database" in Redis terms — and bridges every engine mutation to the
//! side-effect events a command layer needs: a key-modified signal, a
//! keyspace-notification tag, and a dirty-write counter.
//!
//! ## Design
//!
//! Like `KVStore` in the primitive-store lineage this crate's facades
//! are modelled on, `Keyspace` is a thin, stateful wrapper: all the real
//! work happens in the five container engines, and this module only adds
//! the bookkeeping a single-database server needs around them.

use std::rc::Rc;

use ks_core::numeric::parse_strict_i64;
use ks_core::{EngineConfig, EngineError};
use ks_dict::Dict;
use ks_object::{make_string, SharedIntPool, StringValue};

use crate::value::ValueObject;

/// One keyspace-notification event: an action tag paired with the key it
/// happened to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// The command-level event name (e.g. `"set"`, `"lpush"`, `"expired"`).
    pub event: &'static str,
    /// The key the event happened to.
    pub key: String,
}

const NOTIFICATION_RING_CAPACITY: usize = 1024;

/// The single-database keyspace a command layer drives engine operations
/// through.
///
/// Not `Send`/`Sync`: the concurrency model is single-threaded
/// cooperative per request, so there is no internal locking.
pub struct Keyspace {
    entries: Dict<String, ValueObject>,
    dirty: u64,
    lru_clock: u32,
    notifications: std::collections::VecDeque<Notification>,
    int_pool: SharedIntPool,
}

impl Keyspace {
    /// An empty keyspace, sizing the shared small-integer pool from
    /// `config.shared_integers`.
    pub fn new(config: &EngineConfig) -> Self {
        Keyspace {
            entries: Dict::new(),
            dirty: 0,
            lru_clock: 0,
            notifications: std::collections::VecDeque::new(),
            int_pool: SharedIntPool::new(config.shared_integers),
        }
    }

    /// Build a string value from raw bytes, reusing the shared
    /// small-integer pool when `bytes` parses to a value within
    /// `[0, shared_integers)` rather than allocating a fresh `Int`-encoded
    /// value for it.
    pub fn make_string_value(&self, bytes: &[u8]) -> Rc<StringValue> {
        if let Some(i) = parse_strict_i64(bytes) {
            if let Some(shared) = self.int_pool.get(i) {
                return shared;
            }
        }
        make_string(bytes)
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the keyspace holds no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Advance the logical access clock used for LRU stamping. The command
    /// layer calls this roughly once per event-loop tick; engines never
    /// advance it themselves.
    pub fn tick_clock(&mut self) {
        self.lru_clock = self.lru_clock.wrapping_add(1);
    }

    /// Look up a key for a read-only operation. Records an access for
    /// LRU/LFU but never creates or mutates the key.
    pub fn lookup_read(&mut self, key: &str) -> Option<&ValueObject> {
        let clock = self.lru_clock;
        let entries = &mut self.entries;
        match entries.find_mut(&key.to_string()) {
            Some(v) => {
                v.touch(clock);
                Some(&*v)
            }
            None => None,
        }
    }

    /// Look up a key for a write operation. Returns `None` if absent —
    /// the caller decides whether absence means "error" (e.g. `WrongType`-
    /// adjacent commands) or "create", via [`Keyspace::add_kv`].
    pub fn lookup_write(&mut self, key: &str) -> Option<&mut ValueObject> {
        let clock = self.lru_clock;
        match self.entries.find_mut(&key.to_string()) {
            Some(v) => {
                v.touch(clock);
                Some(v)
            }
            None => None,
        }
    }

    /// Insert a brand new key. Errors with [`EngineError::Exists`] if the
    /// key is already present — commands that want overwrite semantics
    /// call [`Keyspace::overwrite`] instead.
    pub fn add_kv(&mut self, key: &str, value: ValueObject) -> Result<(), EngineError> {
        if self.entries.find(&key.to_string()).is_some() {
            return Err(EngineError::Exists);
        }
        self.entries.replace(key.to_string(), value);
        self.dirty_inc(1);
        Ok(())
    }

    /// Insert or replace a key unconditionally.
    pub fn overwrite(&mut self, key: &str, value: ValueObject) {
        self.entries.replace(key.to_string(), value);
        self.dirty_inc(1);
    }

    /// Remove a key. Returns `true` if it was present.
    pub fn delete(&mut self, key: &str) -> bool {
        let removed = self.entries.delete(&key.to_string());
        if removed {
            self.dirty_inc(1);
        }
        removed
    }

    /// Signal that `key`'s value was modified in place (as opposed to
    /// replaced via `overwrite`). Distinct from `notify` because a single
    /// command can modify a key without the command layer caring about the
    /// specific keyspace-notification tag (e.g. internal defrag).
    pub fn signal_modified(&mut self, key: &str) {
        tracing::debug!(key, "key modified");
    }

    /// Record a keyspace notification. Kept as an in-memory ring buffer
    /// rather than actually publishing to pub/sub — the command layer
    /// drains this to forward externally.
    pub fn notify(&mut self, event: &'static str, key: &str) {
        tracing::debug!(event, key, "keyspace notification");
        if self.notifications.len() == NOTIFICATION_RING_CAPACITY {
            self.notifications.pop_front();
        }
        self.notifications.push_back(Notification {
            event,
            key: key.to_string(),
        });
    }

    /// Drain all buffered notifications.
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain(..).collect()
    }

    /// Increment the dirty-write counter (number of writes since the last
    /// persistence checkpoint).
    pub fn dirty_inc(&mut self, n: u64) {
        self.dirty = self.dirty.saturating_add(n);
    }

    /// Current dirty-write count.
    pub fn dirty(&self) -> u64 {
        self.dirty
    }

    /// Reset the dirty counter, as a persistence checkpoint would.
    pub fn clear_dirty(&mut self) {
        self.dirty = 0;
    }
}

impl Default for Keyspace {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueBody;
    use ks_object::{decode_to_string, make_string, EvictionPolicy};

    fn string_value(bytes: &[u8]) -> ValueObject {
        ValueObject::new(ValueBody::String(make_string(bytes)), 0, EvictionPolicy::Lru)
    }

    #[test]
    fn add_kv_rejects_existing_key() {
        let mut ks = Keyspace::new(&EngineConfig::default());
        ks.add_kv("k", string_value(b"v1")).unwrap();
        assert_eq!(ks.add_kv("k", string_value(b"v2")), Err(EngineError::Exists));
    }

    #[test]
    fn overwrite_replaces_existing_key() {
        let mut ks = Keyspace::new(&EngineConfig::default());
        ks.add_kv("k", string_value(b"v1")).unwrap();
        ks.overwrite("k", string_value(b"v2"));
        let v = ks.lookup_read("k").unwrap();
        assert_eq!(decode_to_string(v.as_string().unwrap()), b"v2");
    }

    #[test]
    fn delete_reports_presence() {
        let mut ks = Keyspace::new(&EngineConfig::default());
        ks.add_kv("k", string_value(b"v")).unwrap();
        assert!(ks.delete("k"));
        assert!(!ks.delete("k"));
        assert!(ks.lookup_read("k").is_none());
    }

    #[test]
    fn dirty_counter_tracks_writes() {
        let mut ks = Keyspace::new(&EngineConfig::default());
        assert_eq!(ks.dirty(), 0);
        ks.add_kv("a", string_value(b"1")).unwrap();
        ks.overwrite("a", string_value(b"2"));
        assert_eq!(ks.dirty(), 2);
        ks.clear_dirty();
        assert_eq!(ks.dirty(), 0);
    }

    #[test]
    fn notifications_drain_in_order() {
        let mut ks = Keyspace::new(&EngineConfig::default());
        ks.notify("set", "a");
        ks.notify("expire", "b");
        let drained = ks.drain_notifications();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].event, "set");
        assert_eq!(drained[1].key, "b");
        assert!(ks.drain_notifications().is_empty());
    }

    #[test]
    fn lookup_read_touches_lru_without_creating() {
        let mut ks = Keyspace::new(&EngineConfig::default());
        assert!(ks.lookup_read("missing").is_none());
        ks.add_kv("k", string_value(b"v")).unwrap();
        ks.tick_clock();
        assert!(ks.lookup_read("k").is_some());
    }
}
