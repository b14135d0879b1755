//! Error types for the CRDT catalog.

use thiserror::Error;

use crate::kind::CrdtKind;

/// Errors raised by CRDT mutation, merge and encoding.
#[derive(Debug, Error)]
pub enum CrdtError {
    /// The mutation is illegal for this kind or this value.
    ///
    /// State is left unchanged.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A delta was applied to a state of a different kind.
    #[error("cannot apply {found} delta to {expected} state")]
    DeltaMismatch { expected: CrdtKind, found: CrdtKind },

    /// A counter would leave its 64-bit range.
    #[error("counter overflow")]
    CounterOverflow,

    /// A kind tag that is not part of the catalog.
    #[error("unknown crdt kind: {0}")]
    UnknownKind(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("decoding error: {0}")]
    Decoding(String),
}

/// Result type for CRDT operations.
pub type Result<T> = std::result::Result<T, CrdtError>;
