//! Size and encoding thresholds shared by every engine.
//!
//! These are the tunables every engine references by name when
//! deciding whether to stay in a compact encoding or upgrade to a
//! hash-table / skiplist-backed one. Defaults match the well-known
//! defaults of the system this crate's design is modelled on.
//!
//! ## Contract
//!
//! Like `Limits` in the sibling object-store lineage this is modelled on,
//! the shipped defaults are considered stable: changing them is a
//! behavioural change for any caller relying on encoding thresholds, so
//! treat `EngineConfig::default()` as frozen and prefer constructing a
//! custom `EngineConfig` over editing the defaults in place.

/// Node-size budget for quicklist nodes, expressed the way `fill` is
/// configured: a positive value bounds entry count, a negative value
/// selects one of five byte-size classes.
pub const LIST_SIZE_CLASSES: [usize; 5] = [4096, 8192, 16384, 32768, 65536];

/// Absolute safety limit on any single packed entry sequence, regardless
/// of configuration.
pub const QUICKLIST_NODE_SAFETY_LIMIT: usize = 8192;

/// Minimum packed-sequence byte length eligible for LZF compression.
pub const QUICKLIST_COMPRESS_MIN_SIZE: usize = 48;

/// Minimum byte reduction a compressed node must show over its plain form;
/// a compression that saves less than this is discarded and the node stays
/// plain.
pub const QUICKLIST_COMPRESS_MIN_GAIN: usize = 8;

/// Tunable thresholds controlling compact-vs-hash-table encoding choices.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Max entries in a hash's packed-entry-seq encoding before converting to a dict.
    pub hash_max_listpack_entries: usize,
    /// Max field/value byte length in a hash's packed encoding before converting to a dict.
    pub hash_max_listpack_value: usize,

    /// Max elements in a set's int-array encoding before converting to a dict.
    pub set_max_intset_entries: usize,

    /// Max entries (member+score pairs count double) in a zset's packed encoding.
    pub zset_max_listpack_entries: usize,
    /// Max member byte length in a zset's packed encoding before converting to skiplist.
    pub zset_max_listpack_value: usize,

    /// Quicklist node-size budget (`fill`): positive = max entry count,
    /// negative = index into `LIST_SIZE_CLASSES` (−1 ..= −5).
    pub list_max_listpack_size: i32,
    /// Number of nodes at each end of a quicklist kept uncompressed.
    pub list_compress_depth: usize,

    /// Size of the shared small-integer pool (`[0, shared_integers)`).
    pub shared_integers: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            hash_max_listpack_entries: 128,
            hash_max_listpack_value: 64,

            set_max_intset_entries: 512,

            zset_max_listpack_entries: 128,
            zset_max_listpack_value: 64,

            list_max_listpack_size: -2, // 8 KiB node budget
            list_compress_depth: 0,     // compression disabled by default

            shared_integers: 10_000,
        }
    }
}

impl EngineConfig {
    /// Resolve `list_max_listpack_size` into a concrete byte budget, if it
    /// selects a size class rather than an entry count.
    ///
    /// Returns `None` when `list_max_listpack_size > 0` (entry-count mode);
    /// the caller should then bound by count instead of bytes.
    pub fn list_byte_budget(&self) -> Option<usize> {
        if self.list_max_listpack_size >= 0 {
            return None;
        }
        let idx = (-self.list_max_listpack_size) as usize - 1;
        let idx = idx.min(LIST_SIZE_CLASSES.len() - 1);
        Some(LIST_SIZE_CLASSES[idx])
    }
}
