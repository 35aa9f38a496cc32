//! `StringValue`: the compact, multi-encoding representation every
//! string-typed value (and every key's scalar metadata) is built from.
//!
//! A string is stored one of three ways, chosen automatically:
//!
//! - [`Encoding::Int`] — the value is a canonical base-10 `i64` with no
//!   backing byte buffer at all.
//! - [`Encoding::EmbStr`] — short byte strings (`<= EMBSTR_MAX_LEN`)
//!   stored inline.
//! - [`Encoding::Raw`] — everything else.
//!
//! Sharing is modelled with `Rc<StringValue>` rather than a hand-rolled
//! refcount: [`incref`]/[`decref`] exist for call-site parity with the
//! container engines' bookkeeping (and so refcount changes are easy to
//! trace through logs), but they're thin wrappers over `Rc::clone`/`drop`.
//! The one place manual refcounting still matters is the shared small
//! integer pool ([`SharedIntPool`]): those objects are cloned out of a
//! pool the pool itself keeps alive forever, so `decref`ing a shared
//! handle never frees anything, mirroring the "shared object, refcount
//! pinned" sentinel from the design this crate is modelled on.

use std::rc::Rc;

use ks_core::numeric::parse_strict_i64;

/// Longest byte string stored inline (`EmbStr`) rather than heap-boxed
/// separately (`Raw`).
pub const EMBSTR_MAX_LEN: usize = 44;

/// Which of the three representations a [`StringValue`] currently uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// A canonical `i64`, stored without a byte buffer.
    Int,
    /// A short byte string stored inline.
    EmbStr,
    /// An arbitrary-length byte string.
    Raw,
}

/// A compactly-encoded string value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringValue {
    encoding: Encoding,
    int_value: i64,
    bytes: Vec<u8>,
}

impl StringValue {
    /// The current encoding.
    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Byte length of the canonical representation.
    pub fn len(&self) -> usize {
        match self.encoding {
            Encoding::Int => self.int_value.to_string().len(),
            Encoding::EmbStr | Encoding::Raw => self.bytes.len(),
        }
    }

    /// Whether the canonical representation is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The stored integer, if this value is `Int`-encoded.
    pub fn as_int(&self) -> Option<i64> {
        (self.encoding == Encoding::Int).then_some(self.int_value)
    }

    fn choose_encoding(bytes: &[u8]) -> Encoding {
        if bytes.len() <= EMBSTR_MAX_LEN {
            Encoding::EmbStr
        } else {
            Encoding::Raw
        }
    }
}

/// Build a value from raw bytes, auto-detecting a canonical integer.
pub fn make_string(bytes: &[u8]) -> Rc<StringValue> {
    if let Some(i) = parse_strict_i64(bytes) {
        return Rc::new(StringValue {
            encoding: Encoding::Int,
            int_value: i,
            bytes: Vec::new(),
        });
    }
    Rc::new(StringValue {
        encoding: StringValue::choose_encoding(bytes),
        int_value: 0,
        bytes: bytes.to_vec(),
    })
}

/// Build a value directly from an integer, consulting `pool` for small
/// values that should reuse a shared allocation.
pub fn make_string_from_int(value: i64, pool: &SharedIntPool) -> Rc<StringValue> {
    if let Some(shared) = pool.get(value) {
        return shared;
    }
    Rc::new(StringValue {
        encoding: Encoding::Int,
        int_value: value,
        bytes: Vec::new(),
    })
}

/// Render a value back to its canonical byte representation.
pub fn decode_to_string(value: &StringValue) -> Vec<u8> {
    match value.encoding {
        Encoding::Int => value.int_value.to_string().into_bytes(),
        Encoding::EmbStr | Encoding::Raw => value.bytes.clone(),
    }
}

/// Value equality regardless of encoding (an `Int` and an `EmbStr`
/// holding the same canonical digits compare equal).
pub fn equal(a: &StringValue, b: &StringValue) -> bool {
    match (a.encoding, b.encoding) {
        (Encoding::Int, Encoding::Int) => a.int_value == b.int_value,
        _ => decode_to_string(a) == decode_to_string(b),
    }
}

/// Trailing capacity slack, as a fraction of capacity, that triggers a
/// `shrink_to_fit` on an otherwise-unchanged `Raw` string.
const SLACK_TRIM_THRESHOLD: f64 = 0.10;

/// If `value` is uniquely owned, recompact it in place: first to `Int`
/// encoding if its bytes are a canonical integer, else to `EmbStr` if it
/// has shrunk to fit inline, else just trimming excess `Vec` capacity left
/// behind by the mutation that over-allocated it. Returns `true` if any of
/// those recompaction steps changed the value, `false` (a no-op) if the
/// value is shared (e.g. held elsewhere via a cloned `Rc`) or none apply —
/// callers that mutated a string in place (APPEND, SETRANGE) call this
/// afterward to recover a compact encoding when possible.
///
/// Does not attempt to route a re-detected small integer through
/// [`SharedIntPool`] — that pool is consulted only when a value is first
/// created ([`make_string`], [`make_string_from_int`]); a string that
/// becomes poolable through in-place mutation keeps its own `Int`
/// allocation rather than being swapped for the pool's.
pub fn try_compact_string(value: &mut Rc<StringValue>) -> bool {
    let Some(inner) = Rc::get_mut(value) else {
        return false;
    };
    if inner.encoding == Encoding::Int {
        return false;
    }
    if let Some(i) = parse_strict_i64(&inner.bytes) {
        inner.encoding = Encoding::Int;
        inner.int_value = i;
        inner.bytes = Vec::new();
        return true;
    }
    if inner.encoding == Encoding::Raw && inner.bytes.len() <= EMBSTR_MAX_LEN {
        inner.encoding = Encoding::EmbStr;
        inner.bytes.shrink_to_fit();
        return true;
    }
    if inner.encoding == Encoding::Raw {
        let cap = inner.bytes.capacity();
        let slack = cap - inner.bytes.len();
        if cap > 0 && slack as f64 > cap as f64 * SLACK_TRIM_THRESHOLD {
            inner.bytes.shrink_to_fit();
            return true;
        }
    }
    false
}

/// Bump a handle's refcount. A thin wrapper over `Rc::clone`, kept as a
/// named operation so refcount changes read the same way at every call
/// site regardless of whether the value happens to come from the shared
/// pool.
pub fn incref(value: &Rc<StringValue>) -> Rc<StringValue> {
    Rc::clone(value)
}

/// Drop a handle's refcount. A thin wrapper over `drop`; for pool-backed
/// shared integers this never actually frees anything, since the pool
/// itself retains a permanent handle.
pub fn decref(value: Rc<StringValue>) {
    drop(value);
}

/// Current refcount of a handle (diagnostic use).
pub fn refcount(value: &Rc<StringValue>) -> usize {
    Rc::strong_count(value)
}

/// A pre-built pool of `Int`-encoded values for `0..size`, shared across
/// every key that stores one of these small integers so they don't each
/// allocate their own `Rc`.
pub struct SharedIntPool {
    pool: Vec<Rc<StringValue>>,
}

impl SharedIntPool {
    /// Build a pool covering `[0, size)`. `size <= 0` yields an empty
    /// pool (every integer then allocates its own value).
    pub fn new(size: i64) -> Self {
        let size = size.max(0) as usize;
        let pool = (0..size as i64)
            .map(|i| {
                Rc::new(StringValue {
                    encoding: Encoding::Int,
                    int_value: i,
                    bytes: Vec::new(),
                })
            })
            .collect();
        SharedIntPool { pool }
    }

    /// Look up the shared handle for `value`, if it falls in the pooled
    /// range.
    pub fn get(&self, value: i64) -> Option<Rc<StringValue>> {
        if value < 0 {
            return None;
        }
        self.pool.get(value as usize).map(Rc::clone)
    }
}

/// Which field of [`AccessMeta`] a key's accesses update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Track the clock tick of last access.
    Lru,
    /// Track an approximate, decaying access frequency.
    Lfu,
    /// Track nothing; eviction is disabled.
    NoEviction,
}

/// The initial frequency counter assigned to a freshly created key under
/// LFU accounting (mirrors the well-known default of the system this
/// crate's design is modelled on: new keys start "warm", not cold).
pub const LFU_INIT_VAL: u8 = 5;

/// Access-recency/frequency metadata attached to every key, independent
/// of its value's encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessMeta {
    lru_clock: u32,
    lfu_counter: u8,
}

impl AccessMeta {
    /// Create metadata for a key created at `clock`.
    pub fn new(clock: u32) -> Self {
        AccessMeta {
            lru_clock: clock,
            lfu_counter: LFU_INIT_VAL,
        }
    }

    /// Record an access at `clock`, updating whichever field `policy`
    /// tracks.
    pub fn touch(&mut self, clock: u32, policy: EvictionPolicy) {
        match policy {
            EvictionPolicy::Lru => self.lru_clock = clock,
            EvictionPolicy::Lfu => self.lfu_counter = self.lfu_counter.saturating_add(1),
            EvictionPolicy::NoEviction => {}
        }
    }

    /// Ticks elapsed since last access, given the current clock. Wraps
    /// around the clock's modulus rather than going negative.
    pub fn idle_time(&self, now_clock: u32) -> u32 {
        now_clock.wrapping_sub(self.lru_clock)
    }

    /// Current LFU frequency counter.
    pub fn frequency(&self) -> u8 {
        self.lfu_counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_string_detects_canonical_integers() {
        assert_eq!(make_string(b"42").encoding(), Encoding::Int);
        assert_eq!(make_string(b"-7").encoding(), Encoding::Int);
        assert_eq!(make_string(b"007").encoding(), Encoding::EmbStr);
        assert_eq!(make_string(b"+5").encoding(), Encoding::EmbStr);
    }

    #[test]
    fn make_string_splits_embstr_and_raw_at_threshold() {
        let short = vec![b'x'; EMBSTR_MAX_LEN];
        let long = vec![b'x'; EMBSTR_MAX_LEN + 1];
        assert_eq!(make_string(&short).encoding(), Encoding::EmbStr);
        assert_eq!(make_string(&long).encoding(), Encoding::Raw);
    }

    #[test]
    fn decode_round_trips_every_encoding() {
        assert_eq!(decode_to_string(&make_string(b"42")), b"42");
        assert_eq!(decode_to_string(&make_string(b"hello")), b"hello");
        let long = vec![b'y'; 100];
        assert_eq!(decode_to_string(&make_string(&long)), long);
    }

    #[test]
    fn equal_ignores_encoding_differences() {
        let int_val = make_string(b"42");
        let raw_val = Rc::new(StringValue {
            encoding: Encoding::Raw,
            int_value: 0,
            bytes: b"42".to_vec(),
        });
        assert!(equal(&int_val, &raw_val));
    }

    #[test]
    fn try_compact_converts_unique_canonical_strings() {
        let mut v = make_string(b"hello world");
        assert!(!try_compact_string(&mut v));
        let mut v = make_string(b"not an int really");
        assert!(!try_compact_string(&mut v));

        let mut v = Rc::new(StringValue {
            encoding: Encoding::Raw,
            int_value: 0,
            bytes: b"12345".to_vec(),
        });
        assert!(try_compact_string(&mut v));
        assert_eq!(v.encoding(), Encoding::Int);
        assert_eq!(v.as_int(), Some(12345));
    }

    #[test]
    fn try_compact_rebuilds_embstr_from_shrunk_raw() {
        let mut v = Rc::new(StringValue {
            encoding: Encoding::Raw,
            int_value: 0,
            bytes: b"short now".to_vec(),
        });
        assert!(try_compact_string(&mut v));
        assert_eq!(v.encoding(), Encoding::EmbStr);
        assert_eq!(decode_to_string(&v), b"short now");
    }

    #[test]
    fn try_compact_trims_trailing_slack_on_oversized_raw() {
        let mut bytes = Vec::with_capacity(200);
        bytes.extend(vec![b'z'; EMBSTR_MAX_LEN + 10]);
        let mut v = Rc::new(StringValue {
            encoding: Encoding::Raw,
            int_value: 0,
            bytes,
        });
        assert!(try_compact_string(&mut v));
        assert_eq!(v.encoding(), Encoding::Raw);
        assert_eq!(v.len(), EMBSTR_MAX_LEN + 10);
    }

    #[test]
    fn try_compact_is_noop_on_tightly_sized_raw() {
        let mut bytes = vec![b'w'; EMBSTR_MAX_LEN + 10];
        bytes.shrink_to_fit();
        let mut v = Rc::new(StringValue {
            encoding: Encoding::Raw,
            int_value: 0,
            bytes,
        });
        assert!(!try_compact_string(&mut v));
        assert_eq!(v.encoding(), Encoding::Raw);
    }

    #[test]
    fn try_compact_refuses_when_shared() {
        let v = Rc::new(StringValue {
            encoding: Encoding::Raw,
            int_value: 0,
            bytes: b"99".to_vec(),
        });
        let mut v2 = Rc::clone(&v);
        assert!(!try_compact_string(&mut v2));
        assert_eq!(v2.encoding(), Encoding::Raw);
    }

    #[test]
    fn shared_int_pool_returns_same_allocation() {
        let pool = SharedIntPool::new(100);
        let a = make_string_from_int(42, &pool);
        let b = make_string_from_int(42, &pool);
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(refcount(&a), 3); // pool + a + b

        let out_of_range = make_string_from_int(500, &pool);
        let out_of_range2 = make_string_from_int(500, &pool);
        assert!(!Rc::ptr_eq(&out_of_range, &out_of_range2));
    }

    #[test]
    fn decref_of_shared_value_never_frees_pool_slot() {
        let pool = SharedIntPool::new(10);
        let handle = make_string_from_int(3, &pool);
        let count_before = refcount(&handle);
        decref(handle);
        let handle2 = pool.get(3).unwrap();
        assert_eq!(refcount(&handle2), count_before - 1);
    }

    #[test]
    fn access_meta_tracks_lru_and_lfu_independently() {
        let mut m = AccessMeta::new(100);
        m.touch(150, EvictionPolicy::Lru);
        assert_eq!(m.idle_time(160), 10);

        let mut f = AccessMeta::new(0);
        assert_eq!(f.frequency(), LFU_INIT_VAL);
        f.touch(0, EvictionPolicy::Lfu);
        assert_eq!(f.frequency(), LFU_INIT_VAL + 1);
    }
}
