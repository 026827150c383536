use thiserror::Error;

/// Errors from encoding or decoding records.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The record could not be serialized.
    #[error("failed to encode record: {0}")]
    Encode(String),

    /// The bytes are not a well-formed record.
    #[error("failed to decode record: {0}")]
    Decode(String),
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
