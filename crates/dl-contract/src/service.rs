use dl_ledger::KeyValueLedger;
use dl_record::{bootstrap_records, Record, RecordCodec};
use tracing::debug;

use crate::error::{ContractError, ContractResult};

/// Existence-checked CRUD over records in world state.
///
/// The service is stateless: it caches nothing and every call goes through
/// the ledger handed to it, so the ledger stays the single source of truth.
/// Each operation is a read-check followed by at most one write; isolation
/// against concurrent callers comes from the ledger's transaction.
#[derive(Clone, Copy, Debug, Default)]
pub struct RecordService;

impl RecordService {
    pub fn new() -> Self {
        Self
    }

    /// Whether a record is stored under `id`.
    pub fn exists(&self, ledger: &dyn KeyValueLedger, id: &str) -> ContractResult<bool> {
        Ok(ledger.get_state(id)?.is_some())
    }

    /// Store a new record. Fails if `record.id` is already present.
    pub fn create(&self, ledger: &dyn KeyValueLedger, record: &Record) -> ContractResult<()> {
        if self.exists(ledger, &record.id)? {
            return Err(ContractError::AlreadyExists {
                id: record.id.clone(),
            });
        }
        self.put(ledger, record)?;
        debug!(id = %record.id, "data created");
        Ok(())
    }

    pub fn read(&self, ledger: &dyn KeyValueLedger, id: &str) -> ContractResult<Record> {
        let bytes = ledger.get_state(id)?.ok_or_else(|| ContractError::NotFound {
            id: id.to_string(),
        })?;
        RecordCodec::decode(&bytes).map_err(|source| ContractError::Decode {
            key: id.to_string(),
            source,
        })
    }

    /// Replace an existing record wholesale; nothing of the old one is kept.
    pub fn update(&self, ledger: &dyn KeyValueLedger, record: &Record) -> ContractResult<()> {
        if !self.exists(ledger, &record.id)? {
            return Err(ContractError::NotFound {
                id: record.id.clone(),
            });
        }
        self.put(ledger, record)?;
        debug!(id = %record.id, "data updated");
        Ok(())
    }

    pub fn delete(&self, ledger: &dyn KeyValueLedger, id: &str) -> ContractResult<()> {
        if !self.exists(ledger, id)? {
            return Err(ContractError::NotFound { id: id.to_string() });
        }
        ledger.del_state(id)?;
        debug!(id, "data deleted");
        Ok(())
    }

    /// Every record in world state, in key order.
    ///
    /// One malformed entry fails the whole listing. The scan is released on
    /// every path out of this function.
    pub fn list_all(&self, ledger: &dyn KeyValueLedger) -> ContractResult<Vec<Record>> {
        let mut scan = ledger.state_by_range("", "")?;
        let mut records = Vec::new();
        for entry in scan.by_ref() {
            let entry = entry?;
            let record = RecordCodec::decode(&entry.value).map_err(|source| {
                ContractError::Decode {
                    key: entry.key,
                    source,
                }
            })?;
            records.push(record);
        }
        scan.close();
        Ok(records)
    }

    /// Seed the bootstrap records, overwriting whatever those ids hold.
    pub fn init_ledger(&self, ledger: &dyn KeyValueLedger) -> ContractResult<()> {
        for record in bootstrap_records() {
            self.put(ledger, &record)?;
        }
        debug!("ledger initialized");
        Ok(())
    }

    fn put(&self, ledger: &dyn KeyValueLedger, record: &Record) -> ContractResult<()> {
        let bytes = RecordCodec::encode(record).map_err(ContractError::Encode)?;
        ledger.put_state(&record.id, &bytes)?;
        Ok(())
    }
}
