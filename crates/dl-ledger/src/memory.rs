use std::collections::BTreeMap;
use std::sync::RwLock;

use tracing::{debug, warn};

use crate::batch::{ReadSet, WriteBatch};
use crate::error::{LedgerError, LedgerResult};
use crate::scan::{KeyRange, KeyValue, RangeScan, ScanTracker};
use crate::traits::{validate_key, KeyValueLedger};
use crate::transaction::{Transaction, TxMeta};
use crate::wal::CommitRecord;

/// A committed value and the block height that last wrote it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionedValue {
    pub value: Vec<u8>,
    pub version: u64,
}

/// Durable sink that must accept a commit before it is applied in memory.
pub(crate) trait CommitJournal: Send + Sync {
    fn record(&self, record: &CommitRecord) -> LedgerResult<()>;
}

#[derive(Debug, Default)]
struct LedgerState {
    entries: BTreeMap<String, VersionedValue>,
    height: u64,
}

impl LedgerState {
    fn validate(&self, reads: &ReadSet) -> LedgerResult<()> {
        for (key, read) in reads.points() {
            let current = self.entries.get(key).map(|v| v.version);
            if current != read {
                return Err(LedgerError::Conflict {
                    key: key.to_string(),
                    read,
                    current,
                });
            }
        }
        for range_read in reads.ranges() {
            let current: Vec<(String, u64)> = self
                .entries
                .range::<str, _>(range_read.range.bounds())
                .map(|(k, v)| (k.clone(), v.version))
                .collect();
            if current != range_read.observed {
                return Err(LedgerError::PhantomRead {
                    start: range_read.range.start().to_string(),
                    end: range_read.range.end().to_string(),
                });
            }
        }
        Ok(())
    }

    fn apply(&mut self, height: u64, writes: &WriteBatch) {
        for (key, write) in writes.iter() {
            match write {
                Some(value) => {
                    self.entries.insert(
                        key.to_string(),
                        VersionedValue {
                            value: value.to_vec(),
                            version: height,
                        },
                    );
                }
                None => {
                    self.entries.remove(key);
                }
            }
        }
        self.height = height;
    }
}

/// In-memory world state for tests, local demos, and embedding.
///
/// Entries live in a `BTreeMap` behind a `RwLock`, so range scans come out in
/// key order. Every commit bumps the block height and stamps each written key
/// with it; those stamps are the versions transactions validate against.
///
/// Calling the [`KeyValueLedger`] methods directly auto-commits each write.
/// Use [`InMemoryLedger::begin`] for a transaction spanning several calls.
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
    scans: ScanTracker,
}

impl InMemoryLedger {
    /// Create an empty ledger at height zero.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
            scans: ScanTracker::new(),
        }
    }

    /// Start a transaction against the current world state.
    pub fn begin(&self) -> Transaction<'_> {
        Transaction::new(self, None)
    }

    /// Height of the last commit; zero for a fresh ledger.
    pub fn height(&self) -> LedgerResult<u64> {
        Ok(self.state.read().map_err(LedgerError::poisoned)?.height)
    }

    /// Number of keys in world state.
    pub fn len(&self) -> LedgerResult<usize> {
        Ok(self.state.read().map_err(LedgerError::poisoned)?.entries.len())
    }

    pub fn is_empty(&self) -> LedgerResult<bool> {
        Ok(self.len()? == 0)
    }

    /// The height that last wrote `key`, if present.
    pub fn version(&self, key: &str) -> LedgerResult<Option<u64>> {
        Ok(self.read_versioned(key)?.map(|v| v.version))
    }

    /// Number of range scans handed out and not yet released.
    pub fn open_scans(&self) -> usize {
        self.scans.open_scans()
    }

    pub(crate) fn scan_tracker(&self) -> &ScanTracker {
        &self.scans
    }

    pub(crate) fn read_versioned(&self, key: &str) -> LedgerResult<Option<VersionedValue>> {
        let state = self.state.read().map_err(LedgerError::poisoned)?;
        Ok(state.entries.get(key).cloned())
    }

    pub(crate) fn read_range(&self, range: &KeyRange) -> LedgerResult<Vec<(String, VersionedValue)>> {
        let state = self.state.read().map_err(LedgerError::poisoned)?;
        Ok(state
            .entries
            .range::<str, _>(range.bounds())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    /// Validate `reads` and apply `writes` atomically under the write lock.
    ///
    /// The journal, when present, sees the commit before memory does; if it
    /// fails nothing is applied. Returns the height of the commit, or the
    /// current height for a transaction with no writes.
    pub(crate) fn commit(
        &self,
        meta: &TxMeta,
        reads: &ReadSet,
        writes: &WriteBatch,
        journal: Option<&dyn CommitJournal>,
    ) -> LedgerResult<u64> {
        let mut state = self.state.write().map_err(LedgerError::poisoned)?;

        if let Err(e) = state.validate(reads) {
            warn!(tx_id = %meta.tx_id, error = %e, "transaction failed validation");
            return Err(e);
        }
        if writes.is_empty() {
            return Ok(state.height);
        }

        let height = state.height + 1;
        if let Some(journal) = journal {
            journal.record(&CommitRecord {
                height,
                tx_id: meta.tx_id,
                timestamp: meta.timestamp,
                writes: writes.clone(),
            })?;
        }
        state.apply(height, writes);

        debug!(tx_id = %meta.tx_id, height, writes = writes.len(), "transaction committed");
        Ok(height)
    }

    /// Commit a single write outside any caller-visible transaction.
    pub(crate) fn autocommit(
        &self,
        key: &str,
        value: Option<&[u8]>,
        journal: Option<&dyn CommitJournal>,
    ) -> LedgerResult<u64> {
        validate_key(key)?;
        let mut writes = WriteBatch::new();
        match value {
            Some(value) => writes.put(key, value),
            None => writes.delete(key),
        }
        self.commit(&TxMeta::new(), &ReadSet::new(), &writes, journal)
    }

    /// Apply a commit recovered from the write-ahead log.
    pub(crate) fn replay(&self, record: &CommitRecord) -> LedgerResult<()> {
        let mut state = self.state.write().map_err(LedgerError::poisoned)?;
        // A compacted log starts at the snapshot height, so the first record
        // may skip ahead.
        if record.height <= state.height {
            warn!(
                height = record.height,
                current = state.height,
                "replayed commit does not advance height; applying anyway"
            );
        } else if state.height != 0 && record.height != state.height + 1 {
            warn!(
                height = record.height,
                expected = state.height + 1,
                "gap in replayed commit heights"
            );
        }
        let height = record.height.max(state.height);
        state.apply(height, &record.writes);
        Ok(())
    }

    /// Hand the current height and every live entry, as one batch of puts,
    /// to `persist`.
    ///
    /// The write lock is held until `persist` returns, so no commit can land
    /// between taking the snapshot and persisting it.
    pub(crate) fn with_snapshot<T>(
        &self,
        persist: impl FnOnce(u64, WriteBatch) -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        let state = self.state.write().map_err(LedgerError::poisoned)?;
        let mut batch = WriteBatch::new();
        for (key, entry) in &state.entries {
            batch.put(key, &entry.value);
        }
        persist(state.height, batch)
    }

    pub(crate) fn scan(&self, start_key: &str, end_key: &str) -> LedgerResult<RangeScan<'_>> {
        let range = KeyRange::new(start_key, end_key)?;
        let entries = self.read_range(&range)?;
        debug!(start = start_key, end = end_key, count = entries.len(), "range scan opened");
        Ok(RangeScan::new(
            entries
                .into_iter()
                .map(|(key, v)| Ok(KeyValue { key, value: v.value })),
            &self.scans,
        ))
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueLedger for InMemoryLedger {
    fn get_state(&self, key: &str) -> LedgerResult<Option<Vec<u8>>> {
        Ok(self.read_versioned(key)?.map(|v| v.value))
    }

    fn put_state(&self, key: &str, value: &[u8]) -> LedgerResult<()> {
        self.autocommit(key, Some(value), None).map(|_| ())
    }

    fn del_state(&self, key: &str) -> LedgerResult<()> {
        self.autocommit(key, None, None).map(|_| ())
    }

    fn state_by_range(&self, start_key: &str, end_key: &str) -> LedgerResult<RangeScan<'_>> {
        self.scan(start_key, end_key)
    }
}

impl std::fmt::Debug for InMemoryLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (height, keys) = match self.state.read() {
            Ok(state) => (state.height, state.entries.len()),
            Err(_) => (0, 0),
        };
        f.debug_struct("InMemoryLedger")
            .field("height", &height)
            .field("keys", &keys)
            .field("open_scans", &self.open_scans())
            .finish()
    }
}
