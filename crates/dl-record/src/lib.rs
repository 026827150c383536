//! Record model and wire codec for the Data Ledger.
//!
//! A [`Record`] is the only entity the contract manages. It is persisted as
//! a JSON object whose field names (`task_id`, `letter_num`,
//! `predict_divation`, ...) are part of the on-ledger format.

pub mod codec;
pub mod error;
pub mod record;

pub use codec::RecordCodec;
pub use error::{CodecError, CodecResult};
pub use record::{bootstrap_records, Record};
