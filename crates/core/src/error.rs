//! Error kinds shared by every engine.
//!
//! This module defines the unified error type returned by the object layer
//! and the five container engines. We use `thiserror` for `Display`/`Error`
//! derivation, matching the rest of the workspace.
//!
//! ## Error categories
//!
//! - **WrongType** — a key holds a value of an incompatible type.
//! - **NotFound** — missing key or missing field.
//! - **Exists** — attempted add of a present key, where the operation requires absence.
//! - **OutOfRange** — index beyond container size, or an invalid count/offset.
//! - **Overflow** — arithmetic would overflow the 64-bit signed range.
//! - **NotInteger** / **NotFloat** — numeric parse failure on a stored or provided value.
//! - **SyntaxError** — caller passed a malformed option.
//! - **CorruptedEncoding** — an internal invariant was violated on load (fatal).
//!
//! Internal programming errors (refcount underflow, rehash fingerprint
//! mismatch) are not represented here: they are `debug_assert!`/`panic!`
//! at the point of violation, per the fatal-assertion policy described in
//! the error handling design.

use thiserror::Error;

/// Result type alias used throughout the engine crates.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Unified error type for the object layer and container engines.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The value at this key is not of the type the operation requires.
    #[error("WRONGTYPE operation against a key holding the wrong kind of value")]
    WrongType,

    /// The requested key or field does not exist.
    #[error("no such key or field")]
    NotFound,

    /// An `add`-style operation found the key already present.
    #[error("key already exists")]
    Exists,

    /// An index, count, or offset fell outside the valid range.
    #[error("index or count out of range")]
    OutOfRange,

    /// A 64-bit signed arithmetic operation would overflow.
    #[error("increment or decrement would overflow")]
    Overflow,

    /// The stored or supplied value is not a valid base-10 integer.
    #[error("value is not an integer or out of range")]
    NotInteger,

    /// The stored or supplied value is not a valid floating-point number.
    #[error("value is not a valid float")]
    NotFloat,

    /// A caller-supplied option or argument combination is malformed.
    #[error("syntax error: {0}")]
    SyntaxError(String),

    /// An on-disk or in-memory encoding violated a structural invariant.
    ///
    /// This is defined for completeness with the error-kind enumeration but
    /// is expected to be fatal in practice: callers that observe it should
    /// treat the owning object as unrecoverable.
    #[error("corrupted encoding: {0}")]
    CorruptedEncoding(String),
}
