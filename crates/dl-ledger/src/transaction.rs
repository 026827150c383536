//! The ambient transaction a host wraps around each contract invocation.
//!
//! A [`Transaction`] simulates against committed world state: reads see the
//! transaction's own buffered writes first, and every committed version it
//! observes lands in a read set. [`Transaction::commit`] re-checks that read
//! set under the ledger's write lock and rejects the whole transaction if any
//! observed key or scanned range has moved since. Nothing reaches world state
//! until commit; dropping the transaction discards it.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::batch::{ReadSet, WriteBatch};
use crate::error::{LedgerError, LedgerResult};
use crate::memory::{CommitJournal, InMemoryLedger};
use crate::scan::{KeyRange, KeyValue, RangeScan};
use crate::traits::{validate_key, KeyValueLedger};

/// Identity of a transaction, carried into the write-ahead log.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxMeta {
    pub tx_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl TxMeta {
    pub fn new() -> Self {
        Self {
            tx_id: Uuid::now_v7(),
            timestamp: Utc::now(),
        }
    }
}

impl Default for TxMeta {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
struct TxState {
    reads: ReadSet,
    writes: WriteBatch,
}

/// A read-your-writes transaction with optimistic commit-time validation.
pub struct Transaction<'a> {
    ledger: &'a InMemoryLedger,
    journal: Option<&'a dyn CommitJournal>,
    meta: TxMeta,
    state: Mutex<TxState>,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(ledger: &'a InMemoryLedger, journal: Option<&'a dyn CommitJournal>) -> Self {
        let meta = TxMeta::new();
        debug!(tx_id = %meta.tx_id, "transaction started");
        Self {
            ledger,
            journal,
            meta,
            state: Mutex::new(TxState::default()),
        }
    }

    pub fn tx_id(&self) -> Uuid {
        self.meta.tx_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.meta.timestamp
    }

    /// Number of keys this transaction will write or delete on commit.
    pub fn pending_writes(&self) -> LedgerResult<usize> {
        Ok(self.lock()?.writes.len())
    }

    /// Validate and apply the transaction. Returns the committed height.
    ///
    /// Fails with [`LedgerError::Conflict`] or [`LedgerError::PhantomRead`]
    /// if world state changed under anything this transaction read.
    pub fn commit(self) -> LedgerResult<u64> {
        let state = self.state.into_inner().map_err(LedgerError::poisoned)?;
        self.ledger
            .commit(&self.meta, &state.reads, &state.writes, self.journal)
    }

    /// Discard all buffered writes.
    pub fn rollback(self) {
        debug!(tx_id = %self.meta.tx_id, "transaction rolled back");
    }

    fn lock(&self) -> LedgerResult<MutexGuard<'_, TxState>> {
        self.state.lock().map_err(LedgerError::poisoned)
    }
}

impl KeyValueLedger for Transaction<'_> {
    fn get_state(&self, key: &str) -> LedgerResult<Option<Vec<u8>>> {
        let mut state = self.lock()?;
        if let Some(pending) = state.writes.get(key) {
            return Ok(pending.map(<[u8]>::to_vec));
        }
        let current = self.ledger.read_versioned(key)?;
        state.reads.record(key, current.as_ref().map(|v| v.version));
        Ok(current.map(|v| v.value))
    }

    fn put_state(&self, key: &str, value: &[u8]) -> LedgerResult<()> {
        validate_key(key)?;
        self.lock()?.writes.put(key, value);
        Ok(())
    }

    fn del_state(&self, key: &str) -> LedgerResult<()> {
        validate_key(key)?;
        self.lock()?.writes.delete(key);
        Ok(())
    }

    fn state_by_range(&self, start_key: &str, end_key: &str) -> LedgerResult<RangeScan<'_>> {
        let range = KeyRange::new(start_key, end_key)?;
        let committed = self.ledger.read_range(&range)?;

        let mut state = self.lock()?;
        let observed = committed
            .iter()
            .map(|(k, v)| (k.clone(), v.version))
            .collect();
        state.reads.record_range(range.clone(), observed);

        let mut merged: BTreeMap<String, Vec<u8>> = committed
            .into_iter()
            .map(|(k, v)| (k, v.value))
            .collect();
        for (key, write) in state.writes.iter().filter(|(k, _)| range.contains(k)) {
            match write {
                Some(value) => {
                    merged.insert(key.to_string(), value.to_vec());
                }
                None => {
                    merged.remove(key);
                }
            }
        }

        Ok(RangeScan::new(
            merged
                .into_iter()
                .map(|(key, value)| Ok(KeyValue { key, value })),
            self.ledger.scan_tracker(),
        ))
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("tx_id", &self.meta.tx_id)
            .field("timestamp", &self.meta.timestamp)
            .field("journaled", &self.journal.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> InMemoryLedger {
        let ledger = InMemoryLedger::new();
        ledger.put_state("a", b"1").unwrap();
        ledger.put_state("c", b"3").unwrap();
        ledger
    }

    fn scan_keys(ledger: &dyn KeyValueLedger) -> Vec<String> {
        ledger
            .state_by_range("", "")
            .unwrap()
            .map(|kv| kv.unwrap().key)
            .collect()
    }

    #[test]
    fn reads_see_own_writes() {
        let ledger = seeded();
        let tx = ledger.begin();
        tx.put_state("b", b"2").unwrap();
        tx.del_state("a").unwrap();

        assert_eq!(tx.get_state("b").unwrap(), Some(b"2".to_vec()));
        assert_eq!(tx.get_state("a").unwrap(), None);
        assert_eq!(scan_keys(&tx), vec!["b", "c"]);
    }

    #[test]
    fn uncommitted_writes_are_invisible() {
        let ledger = seeded();
        let tx = ledger.begin();
        tx.put_state("b", b"2").unwrap();
        assert_eq!(ledger.get_state("b").unwrap(), None);
        assert_eq!(tx.pending_writes().unwrap(), 1);
    }

    #[test]
    fn commit_applies_writes_at_one_height() {
        let ledger = seeded();
        let tx = ledger.begin();
        tx.put_state("b", b"2").unwrap();
        tx.del_state("c").unwrap();
        let height = tx.commit().unwrap();

        assert_eq!(height, 3);
        assert_eq!(ledger.version("b").unwrap(), Some(3));
        assert_eq!(scan_keys(&ledger), vec!["a", "b"]);
    }

    #[test]
    fn rollback_discards() {
        let ledger = seeded();
        let tx = ledger.begin();
        tx.put_state("b", b"2").unwrap();
        tx.rollback();
        assert_eq!(ledger.get_state("b").unwrap(), None);
        assert_eq!(ledger.height().unwrap(), 2);
    }

    #[test]
    fn read_only_commit_keeps_height() {
        let ledger = seeded();
        let tx = ledger.begin();
        tx.get_state("a").unwrap();
        assert_eq!(tx.commit().unwrap(), 2);
    }

    #[test]
    fn stale_read_conflicts() {
        let ledger = seeded();
        let tx = ledger.begin();
        assert_eq!(tx.get_state("a").unwrap(), Some(b"1".to_vec()));
        tx.put_state("a", b"from-tx").unwrap();

        ledger.put_state("a", b"concurrent").unwrap();

        let err = tx.commit().unwrap_err();
        assert!(err.is_conflict());
        assert!(matches!(err, LedgerError::Conflict { ref key, .. } if key == "a"));
        assert_eq!(ledger.get_state("a").unwrap(), Some(b"concurrent".to_vec()));
    }

    #[test]
    fn concurrent_creates_of_same_key_conflict() {
        let ledger = InMemoryLedger::new();
        let first = ledger.begin();
        let second = ledger.begin();

        assert!(!first.contains_key("42").unwrap());
        assert!(!second.contains_key("42").unwrap());
        first.put_state("42", b"first").unwrap();
        second.put_state("42", b"second").unwrap();

        first.commit().unwrap();
        let err = second.commit().unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Conflict { read: None, current: Some(_), .. }
        ));
        assert_eq!(ledger.get_state("42").unwrap(), Some(b"first".to_vec()));
    }

    #[test]
    fn blind_writes_do_not_conflict() {
        let ledger = seeded();
        let tx = ledger.begin();
        tx.put_state("a", b"blind").unwrap();
        ledger.put_state("a", b"concurrent").unwrap();
        tx.commit().unwrap();
        assert_eq!(ledger.get_state("a").unwrap(), Some(b"blind".to_vec()));
    }

    #[test]
    fn insert_into_scanned_range_is_a_phantom() {
        let ledger = seeded();
        let tx = ledger.begin();
        assert_eq!(scan_keys(&tx), vec!["a", "c"]);
        tx.put_state("z", b"26").unwrap();

        ledger.put_state("b", b"2").unwrap();

        let err = tx.commit().unwrap_err();
        assert!(matches!(err, LedgerError::PhantomRead { .. }));
    }

    #[test]
    fn write_outside_scanned_range_does_not_conflict() {
        let ledger = seeded();
        let tx = ledger.begin();
        let seen: Vec<String> = tx
            .state_by_range("a", "b")
            .unwrap()
            .map(|kv| kv.unwrap().key)
            .collect();
        assert_eq!(seen, vec!["a"]);

        ledger.put_state("x", b"outside").unwrap();
        tx.commit().unwrap();
    }

    #[test]
    fn transaction_scans_are_tracked() {
        let ledger = seeded();
        let tx = ledger.begin();
        let scan = tx.state_by_range("", "").unwrap();
        assert_eq!(ledger.open_scans(), 1);
        drop(scan);
        assert_eq!(ledger.open_scans(), 0);
    }

    #[test]
    fn transaction_ids_are_unique() {
        let ledger = InMemoryLedger::new();
        let a = ledger.begin();
        let b = ledger.begin();
        assert_ne!(a.tx_id(), b.tx_id());
    }
}
