use dl_ledger::LedgerError;
use dl_record::CodecError;
use thiserror::Error;

/// Errors surfaced by contract operations.
///
/// Nothing is retried here: every failure goes straight back to the host,
/// which decides whether to abort or re-run the transaction.
#[derive(Debug, Error)]
pub enum ContractError {
    /// World state could not be read or written.
    #[error("failed to access world state: {0}")]
    Storage(#[from] LedgerError),

    /// The operation targets an id with no stored record.
    #[error("the data {id} does not exist")]
    NotFound { id: String },

    /// A record with this id is already stored.
    #[error("the data {id} already exists")]
    AlreadyExists { id: String },

    /// Stored bytes under `key` are not a valid record.
    #[error("stored data {key} is malformed: {source}")]
    Decode { key: String, source: CodecError },

    /// A record could not be serialized.
    #[error("failed to encode data: {0}")]
    Encode(#[source] CodecError),

    /// A host-supplied argument could not be interpreted.
    #[error("invalid argument {name}: {reason}")]
    InvalidArgument { name: String, reason: String },

    /// The host passed the wrong number of arguments.
    #[error("{function} expects {expected} arguments, got {actual}")]
    WrongArity {
        function: String,
        expected: usize,
        actual: usize,
    },

    /// The host asked for a function the contract does not export.
    #[error("unknown function: {0}")]
    UnknownFunction(String),
}

impl ContractError {
    /// Expected, user-facing outcomes as opposed to infrastructure failures.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::AlreadyExists { .. }
                | Self::InvalidArgument { .. }
                | Self::WrongArity { .. }
                | Self::UnknownFunction(_)
        )
    }
}

/// Result alias for contract operations.
pub type ContractResult<T> = Result<T, ContractError>;
