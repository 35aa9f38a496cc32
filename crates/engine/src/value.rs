//! `ValueObject`: the tagged, polymorphic value every key in the keyspace
//! maps to, wrapping exactly one of the five container engines plus the
//! LRU/LFU access bookkeeping shared by all of them.
//!
//! Container engines (`ListEngine`, `SetEngine`, `HashEngine`,
//! `SortedSetEngine`) already enforce Rust's single-owner aliasing rules,
//! so only the `String` variant needs the shared-small-integer refcounting
//! `ks_object` provides — a `ValueObject` simply owns an `Rc<StringValue>`
//! for that variant and lets `Rc`'s own count stand in for a manual
//! incref/decref pair.

use ks_object::{AccessMeta, EvictionPolicy, StringValue};
use std::rc::Rc;

use crate::hash::HashEngine;
use crate::list::ListEngine;
use crate::set::SetEngine;
use crate::zset::SortedSetEngine;

/// The five container kinds a `ValueObject` can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    /// A string value (raw, embedded, or shared integer).
    String,
    /// A list value.
    List,
    /// A set value.
    Set,
    /// A hash value.
    Hash,
    /// A sorted set value.
    SortedSet,
}

/// The payload behind a `ValueObject`, one variant per type tag.
pub enum ValueBody {
    /// A string, sharing the small-integer pool where possible.
    String(Rc<StringValue>),
    /// A list, backed by a quicklist.
    List(ListEngine),
    /// A set, packed-int-array or hash-table encoded.
    Set(SetEngine),
    /// A hash, packed-entry-seq or hash-table encoded.
    Hash(HashEngine),
    /// A sorted set, packed-entry-seq or skiplist-backed encoded.
    SortedSet(SortedSetEngine),
}

/// A key's value together with its access-tracking metadata.
///
/// Owned by exactly one slot in the top-level keyspace `Dict`; commands
/// borrow it for the duration of a single request and never hold it
/// across suspension points (there are none at the engine level).
pub struct ValueObject {
    body: ValueBody,
    access: AccessMeta,
    policy: EvictionPolicy,
}

impl ValueObject {
    /// Wrap a body with freshly initialised access metadata, stamped at
    /// `clock` under the given eviction `policy`.
    pub fn new(body: ValueBody, clock: u32, policy: EvictionPolicy) -> Self {
        ValueObject {
            body,
            access: AccessMeta::new(clock),
            policy,
        }
    }

    /// The type tag for this value.
    pub fn type_tag(&self) -> TypeTag {
        match &self.body {
            ValueBody::String(_) => TypeTag::String,
            ValueBody::List(_) => TypeTag::List,
            ValueBody::Set(_) => TypeTag::Set,
            ValueBody::Hash(_) => TypeTag::Hash,
            ValueBody::SortedSet(_) => TypeTag::SortedSet,
        }
    }

    /// Borrow the payload.
    pub fn body(&self) -> &ValueBody {
        &self.body
    }

    /// Mutably borrow the payload; also records an access for LRU/LFU.
    pub fn body_mut(&mut self, clock: u32) -> &mut ValueBody {
        self.access.touch(clock, self.policy);
        &mut self.body
    }

    /// Record a read access without mutating the payload.
    pub fn touch(&mut self, clock: u32) {
        self.access.touch(clock, self.policy);
    }

    /// The access metadata (LRU clock or LFU counter, per global policy).
    pub fn access(&self) -> &AccessMeta {
        &self.access
    }

    /// Borrow the string payload, if this value is a string.
    pub fn as_string(&self) -> Option<&Rc<StringValue>> {
        match &self.body {
            ValueBody::String(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the list payload, if this value is a list.
    pub fn as_list(&self) -> Option<&ListEngine> {
        match &self.body {
            ValueBody::List(l) => Some(l),
            _ => None,
        }
    }

    /// Mutably borrow the list payload, if this value is a list.
    pub fn as_list_mut(&mut self) -> Option<&mut ListEngine> {
        match &mut self.body {
            ValueBody::List(l) => Some(l),
            _ => None,
        }
    }

    /// Borrow the set payload, if this value is a set.
    pub fn as_set(&self) -> Option<&SetEngine> {
        match &self.body {
            ValueBody::Set(s) => Some(s),
            _ => None,
        }
    }

    /// Mutably borrow the set payload, if this value is a set.
    pub fn as_set_mut(&mut self) -> Option<&mut SetEngine> {
        match &mut self.body {
            ValueBody::Set(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the hash payload, if this value is a hash.
    pub fn as_hash(&self) -> Option<&HashEngine> {
        match &self.body {
            ValueBody::Hash(h) => Some(h),
            _ => None,
        }
    }

    /// Mutably borrow the hash payload, if this value is a hash.
    pub fn as_hash_mut(&mut self) -> Option<&mut HashEngine> {
        match &mut self.body {
            ValueBody::Hash(h) => Some(h),
            _ => None,
        }
    }

    /// Borrow the sorted-set payload, if this value is a sorted set.
    pub fn as_sorted_set(&self) -> Option<&SortedSetEngine> {
        match &self.body {
            ValueBody::SortedSet(z) => Some(z),
            _ => None,
        }
    }

    /// Mutably borrow the sorted-set payload, if this value is a sorted set.
    pub fn as_sorted_set_mut(&mut self) -> Option<&mut SortedSetEngine> {
        match &mut self.body {
            ValueBody::SortedSet(z) => Some(z),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ks_object::make_string;

    #[test]
    fn type_tag_matches_body() {
        let v = ValueObject::new(
            ValueBody::String(make_string(b"hello")),
            0,
            EvictionPolicy::NoEviction,
        );
        assert_eq!(v.type_tag(), TypeTag::String);
        assert!(v.as_string().is_some());
        assert!(v.as_list().is_none());
    }

    #[test]
    fn touch_advances_lru_clock() {
        let mut v = ValueObject::new(ValueBody::List(ListEngine::new(8, 0)), 100, EvictionPolicy::Lru);
        assert_eq!(v.access().idle_time(100), 0);
        v.touch(150);
        assert_eq!(v.access().idle_time(150), 0);
        assert_eq!(v.access().idle_time(200), 50);
    }
}
