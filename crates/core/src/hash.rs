//! Process-wide keyed-hash seed.
//!
//! `Dict`'s default string hasher is keyed by a 128-bit seed generated once
//! per process, to mitigate hash-flooding collision attacks on
//! attacker-controlled keys. The seed is generated from `RandomState`
//! (itself seeded from the OS RNG) the first time it is touched and is
//! stable for the lifetime of the process.

use once_cell::sync::Lazy;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};

/// A 128-bit seed, split into two 64-bit halves for convenient mixing into
/// a `u64`-oriented hasher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashSeed(pub u64, pub u64);

static PROCESS_SEED: Lazy<HashSeed> = Lazy::new(|| {
    let a = RandomState::new().build_hasher().finish();
    let b = RandomState::new().build_hasher().finish();
    HashSeed(a, b)
});

/// Returns the process-wide hash seed, generating it on first use.
pub fn process_seed() -> HashSeed {
    *PROCESS_SEED
}
