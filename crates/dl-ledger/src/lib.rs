//! Transactional key-value world state for the Data Ledger.
//!
//! Contract code never touches storage directly: it receives a
//! [`KeyValueLedger`] for the duration of one invocation and performs point
//! reads, writes, deletes, and ordered range scans through it.
//!
//! # Backends
//!
//! - [`InMemoryLedger`] -- `BTreeMap` world state for tests and embedding
//! - [`FileLedger`] -- in-memory state made durable by a [`WriteAheadLog`]
//!
//! Both hand out [`Transaction`]s via `begin()`. A transaction buffers its
//! writes, reads its own writes back, and validates everything it read at
//! commit time; a conflicting transaction is rejected, never merged.
//!
//! # Design Rules
//!
//! 1. Keys are non-empty strings; values are opaque bytes.
//! 2. Range scans are half-open `[start, end)`, empty bounds are unbounded.
//! 3. Every range scan is tracked until closed or dropped.
//! 4. A commit is logged before it is applied.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod batch;
pub mod config;
pub mod error;
pub mod file;
pub mod memory;
pub mod scan;
pub mod traits;
pub mod transaction;
pub mod wal;

pub use batch::{ReadSet, WriteBatch};
pub use config::{LedgerConfig, SyncMode};
pub use error::{LedgerError, LedgerResult};
pub use file::FileLedger;
pub use memory::{InMemoryLedger, VersionedValue};
pub use scan::{KeyRange, KeyValue, RangeScan, ScanTracker};
pub use traits::{validate_key, KeyValueLedger};
pub use transaction::{Transaction, TxMeta};
pub use wal::{CommitRecord, WriteAheadLog};
