//! The [`KeyValueLedger`] trait: the world-state boundary every contract
//! operation goes through.

use crate::error::{LedgerError, LedgerResult};
use crate::scan::RangeScan;

/// World-state access within one ambient transaction.
///
/// All implementations must satisfy these invariants:
/// - `get_state` returns `Ok(None)` for an absent key, never an error.
/// - `put_state` overwrites any existing value for the key.
/// - `del_state` on an absent key is a no-op.
/// - `state_by_range` yields entries in ascending key order over
///   `[start_key, end_key)`; empty keys leave that side unbounded.
/// - All I/O errors are propagated, never silently ignored.
pub trait KeyValueLedger: Send + Sync {
    /// Read the value stored under `key`.
    fn get_state(&self, key: &str) -> LedgerResult<Option<Vec<u8>>>;

    /// Store `value` under `key`.
    fn put_state(&self, key: &str, value: &[u8]) -> LedgerResult<()>;

    /// Remove `key` from world state.
    fn del_state(&self, key: &str) -> LedgerResult<()>;

    /// Open an ordered scan over `[start_key, end_key)`.
    ///
    /// The caller owns the returned scan and must release it (close or drop)
    /// before its operation returns.
    fn state_by_range(&self, start_key: &str, end_key: &str) -> LedgerResult<RangeScan<'_>>;

    /// Whether `key` currently holds a value.
    fn contains_key(&self, key: &str) -> LedgerResult<bool> {
        Ok(self.get_state(key)?.is_some())
    }
}

/// Reject keys the ledger cannot store.
///
/// Keys must be non-empty and must not start with U+0000, which is reserved
/// for composite keys.
pub fn validate_key(key: &str) -> LedgerResult<()> {
    if key.is_empty() {
        return Err(LedgerError::InvalidKey {
            key: key.to_string(),
            reason: "key must not be empty".into(),
        });
    }
    if key.starts_with('\u{0}') {
        return Err(LedgerError::InvalidKey {
            key: key.to_string(),
            reason: "keys starting with U+0000 are reserved".into(),
        });
    }
    Ok(())
}
