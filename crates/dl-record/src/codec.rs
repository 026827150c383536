use crate::error::{CodecError, CodecResult};
use crate::record::Record;

/// JSON codec for records as they are stored on the ledger.
///
/// Encoding is deterministic: fields are always written in declaration order.
pub struct RecordCodec;

impl RecordCodec {
    pub fn encode(record: &Record) -> CodecResult<Vec<u8>> {
        serde_json::to_vec(record).map_err(|e| CodecError::Encode(e.to_string()))
    }

    pub fn decode(data: &[u8]) -> CodecResult<Record> {
        serde_json::from_slice(data).map_err(|e| CodecError::Decode(e.to_string()))
    }

    /// Encode a listing as a JSON array.
    pub fn encode_list(records: &[Record]) -> CodecResult<Vec<u8>> {
        serde_json::to_vec(records).map_err(|e| CodecError::Encode(e.to_string()))
    }

    pub fn decode_list(data: &[u8]) -> CodecResult<Vec<Record>> {
        serde_json::from_slice(data).map_err(|e| CodecError::Decode(e.to_string()))
    }
}
