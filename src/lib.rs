//! `keyspace`: the in-memory value-representation engine of a Redis-style
//! key/value server — the polymorphic value object plus the five
//! container engines it dispatches to, an incrementally-rehashed hash
//! table, a compressed quicklist, and a width-promoting integer set.
//!
//! This crate is a thin re-export over the workspace's member crates; the
//! implementation lives in `ks-core`, `ks-dict`, `ks-ziplist`,
//! `ks-quicklist`, `ks-skiplist`, `ks-intset`, `ks-object`, and
//! `ks-engine`. See each crate's docs for the data structure it owns.
#![warn(missing_docs)]

pub use ks_core::config::EngineConfig;
pub use ks_core::error::{EngineError, EngineResult};

pub use ks_dict::Dict;

pub use ks_ziplist::{Cursor, End, Entry, PackedEntrySeq};

pub use ks_quicklist::QuickList;

pub use ks_skiplist::{LexBound, OrderedScoreIndex, ScoreBound};

pub use ks_intset::{IntArraySet, Width};

pub use ks_object::{
    decode_to_string, make_string, make_string_from_int, AccessMeta, Encoding, EvictionPolicy,
    SharedIntPool, StringValue,
};

pub use ks_engine::{
    diff, intersect, union, HashEncoding, HashEngine, Keyspace, ListEngine, Notification,
    SetEncoding, SetEngine, SortedSetEncoding, SortedSetEngine, TypeTag, ValueBody, ValueObject,
};
