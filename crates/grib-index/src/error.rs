//! Error types for inventory parsing.

use reference_common::SlotError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("line {line}: offset {offset} does not follow previous offset {previous}")]
    NonMonotonic {
        line: usize,
        previous: u64,
        offset: u64,
    },

    #[error("message {ordinal} starts at {offset} but the file is only {file_size} bytes")]
    LengthUnresolved {
        ordinal: u32,
        offset: u64,
        file_size: u64,
    },
}

impl From<IndexError> for SlotError {
    fn from(err: IndexError) -> Self {
        SlotError::malformed(err.to_string())
    }
}
