//! Error types for ledger operations.

use std::io;

use thiserror::Error;

/// Errors produced by the key-value ledger and its backends.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// I/O error from the write-ahead log or its files.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Serialization or deserialization failure of a log record.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An internal lock was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// The key is not acceptable as a world-state key.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// The range start sorts after the range end.
    #[error("invalid range: start {start:?} sorts after end {end:?}")]
    InvalidRange { start: String, end: String },

    /// A key read by the transaction changed before it committed.
    #[error("read conflict on key {key:?}: read version {read:?}, current version {current:?}")]
    Conflict {
        key: String,
        read: Option<u64>,
        current: Option<u64>,
    },

    /// A range scanned by the transaction gained or lost keys before it committed.
    #[error("phantom read in range [{start:?}, {end:?})")]
    PhantomRead { start: String, end: String },
}

impl LedgerError {
    pub(crate) fn poisoned(err: impl std::fmt::Display) -> Self {
        Self::LockPoisoned(err.to_string())
    }

    /// Returns `true` for conflicts a host may resolve by re-running the transaction.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::PhantomRead { .. })
    }
}

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
