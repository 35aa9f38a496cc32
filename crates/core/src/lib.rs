//! Ambient stack shared by every crate in the keyspace workspace.
//!
//! This crate has no dependency on any other workspace member; everything
//! downstream (`ks-ziplist`, `ks-dict`, `ks-quicklist`, `ks-intset`,
//! `ks-skiplist`, `ks-object`, `ks-engine`) depends on it for:
//!
//! - [`error`]: the unified error kind enumeration.
//! - [`config`]: size/encoding-threshold configuration.
//! - [`hash`]: the process-wide keyed-hash seed.
//! - [`numeric`]: shared strict integer/float parsing.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod hash;
pub mod numeric;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use hash::{process_seed, HashSeed};
