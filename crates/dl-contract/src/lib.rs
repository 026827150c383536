//! The data contract: existence-checked CRUD over [`Record`]s.
//!
//! The contract owns no storage. Each call receives the host's ambient
//! transaction as a [`KeyValueLedger`] and performs a read-check followed by
//! at most one write through it. Commit, abort, and retry belong to the host.
//!
//! # Modules
//!
//! - [`service`] — [`RecordService`], the CRUD operations
//! - [`invoke`] — [`Invocation`] parsing and [`Response`]s for the host
//! - [`error`] — [`ContractError`]
//!
//! [`Record`]: dl_record::Record
//! [`KeyValueLedger`]: dl_ledger::KeyValueLedger

pub mod error;
pub mod invoke;
pub mod service;

pub use error::{ContractError, ContractResult};
pub use invoke::{Invocation, Response};
pub use service::RecordService;

// Re-export the types hosts need alongside the contract.
pub use dl_ledger::{FileLedger, InMemoryLedger, KeyValueLedger, LedgerConfig, Transaction};
pub use dl_record::{bootstrap_records, Record, RecordCodec};
