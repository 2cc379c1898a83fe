//! Unified error hierarchy (§7: Error Handling Design).
//!
//! One flat enum rather than nested error hierarchies, following the
//! teacher's `StrataError` convention: callers match on a small, stable set
//! of variants instead of downcasting.

use thiserror::Error;

/// Result alias used throughout the transaction core and tiered cursor.
pub type Result<T> = std::result::Result<T, Error>;

/// The five error kinds of §7, plus the public cursor return codes of §6
/// that don't already have a §7 kind (`not_found`, `duplicate_key`).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Recoverable rollback: the caller should retry the whole transaction.
    /// Sources: snapshot conflict, an unresolved prepared update without
    /// `ignore_prepare`, operation-timeout expiry, write-write conflict.
    #[error("rollback required: {0}")]
    Rollback(String),

    /// Invalid argument: bad configuration, mismatched cursor URIs, or an
    /// unsupported feature request (e.g. `checkpoint=` on a tiered cursor).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Not supported for this cursor's current mode (bulk cursor's
    /// non-insert operations; a prepared transaction touching a logged
    /// table).
    #[error("not supported: {0}")]
    NotSupported(String),

    /// A reader encountered an in-progress prepared update and the session
    /// does not carry `ignore_prepare`.
    #[error("prepare conflict")]
    PrepareConflict,

    /// No matching key, or no value at the probed position.
    #[error("not found")]
    NotFound,

    /// Insert into `overwrite=false` cursor found an existing key.
    #[error("duplicate key")]
    DuplicateKey,

    /// Invariant violation. Once raised after the "cannot-fail" epoch of
    /// commit (§4.2 step 5), the connection is expected to be torn down.
    #[error("panic: {0}")]
    Panic(String),
}

impl Error {
    /// True for the error kinds §7 classifies as recoverable by retrying the
    /// whole transaction (rollback and prepare-conflict; not the others).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Rollback(_) | Error::PrepareConflict)
    }

    /// True once this error must tear down the connection rather than just
    /// fail the operation (§7: "expected to tear down the connection").
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Panic(_))
    }
}
