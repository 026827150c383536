use tracing::info;

use crate::config::LedgerConfig;
use crate::error::LedgerResult;
use crate::memory::{CommitJournal, InMemoryLedger};
use crate::scan::RangeScan;
use crate::traits::KeyValueLedger;
use crate::transaction::{Transaction, TxMeta};
use crate::wal::{CommitRecord, WriteAheadLog};

/// Durable ledger: in-memory world state rebuilt from a write-ahead log.
///
/// Every commit is appended to the log before it becomes visible, so
/// reopening the same path restores the last committed state.
#[derive(Debug)]
pub struct FileLedger {
    memory: InMemoryLedger,
    wal: WriteAheadLog,
    config: LedgerConfig,
}

impl FileLedger {
    /// Open the ledger at `config.path`, replaying any existing log.
    pub fn open(config: LedgerConfig) -> LedgerResult<Self> {
        let wal = WriteAheadLog::open(&config.path, config.sync_mode)?;
        let memory = InMemoryLedger::new();
        let records = wal.recover()?;
        for record in &records {
            memory.replay(record)?;
        }

        info!(
            path = %config.path.display(),
            commits = records.len(),
            height = memory.height()?,
            keys = memory.len()?,
            "ledger opened"
        );
        Ok(Self {
            memory,
            wal,
            config,
        })
    }

    /// Start a transaction whose commit is logged before it is applied.
    pub fn begin(&self) -> Transaction<'_> {
        Transaction::new(&self.memory, self.journal())
    }

    pub fn height(&self) -> LedgerResult<u64> {
        self.memory.height()
    }

    pub fn len(&self) -> LedgerResult<usize> {
        self.memory.len()
    }

    pub fn is_empty(&self) -> LedgerResult<bool> {
        self.memory.is_empty()
    }

    pub fn open_scans(&self) -> usize {
        self.memory.open_scans()
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Collapse the log into a single record holding current world state.
    ///
    /// Commits wait until the rewritten log is in place. The snapshot record
    /// carries the height even when no keys are live, so reopening keeps it.
    pub fn compact(&self) -> LedgerResult<()> {
        let height = self.memory.with_snapshot(|height, writes| {
            let records = if height == 0 {
                Vec::new()
            } else {
                let meta = TxMeta::new();
                vec![CommitRecord {
                    height,
                    tx_id: meta.tx_id,
                    timestamp: meta.timestamp,
                    writes,
                }]
            };
            self.wal.rewrite(&records)?;
            Ok(height)
        })?;
        info!(path = %self.config.path.display(), height, "ledger compacted");
        Ok(())
    }

    fn journal(&self) -> Option<&dyn CommitJournal> {
        Some(&self.wal)
    }
}

impl KeyValueLedger for FileLedger {
    fn get_state(&self, key: &str) -> LedgerResult<Option<Vec<u8>>> {
        self.memory.get_state(key)
    }

    fn put_state(&self, key: &str, value: &[u8]) -> LedgerResult<()> {
        self.memory
            .autocommit(key, Some(value), self.journal())
            .map(|_| ())
    }

    fn del_state(&self, key: &str) -> LedgerResult<()> {
        self.memory.autocommit(key, None, self.journal()).map(|_| ())
    }

    fn state_by_range(&self, start_key: &str, end_key: &str) -> LedgerResult<RangeScan<'_>> {
        self.memory.scan(start_key, end_key)
    }
}
