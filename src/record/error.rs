use crate::file::{FileError, PageId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Invalid slot: page={0}, slot={1}")]
    InvalidSlot(PageId, usize),

    #[error("Invalid column index {index} (table has {count} columns)")]
    InvalidColumn { index: usize, count: usize },

    #[error("Record of {record_size} bytes does not fit in a {page_size}-byte page")]
    RecordTooLarge {
        record_size: usize,
        page_size: usize,
    },

    #[error("Value for column {column} is {length} characters long, limit is {limit}")]
    ValueTooLong {
        column: String,
        length: usize,
        limit: usize,
    },

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Unknown column type: {0}")]
    UnknownType(String),

    #[error("Invalid comparison operator: {0}")]
    InvalidOperator(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },
}

pub type RecordResult<T> = Result<T, RecordError>;
