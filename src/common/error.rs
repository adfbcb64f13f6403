use thiserror::Error;

use super::types::{PageId, SlotId, TableId};

/// Database error types
#[derive(Error, Debug)]
pub enum KilnError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Page {0} has no empty slot")]
    PageFull(PageId),

    #[error("Tuple is not stored on page {page_id}")]
    TupleNotOnPage { page_id: PageId },

    #[error("Tuple has no record id; it is not stored in any table")]
    UnplacedTuple,

    #[error("Slot {slot} of page {page_id} is empty")]
    EmptySlot { page_id: PageId, slot: SlotId },

    #[error("Tuple references {0}, which is beyond the end of its table file")]
    TupleNotFound(PageId),

    #[error("Cache capacity must be positive, got {0}")]
    InvalidCapacity(usize),

    #[error("Buffer pool is full, every cached page is in use")]
    BufferPoolFull,

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("No such element: stream is not open")]
    NoSuchElement,

    #[error("Table {0} not found")]
    TableNotFound(TableId),

    #[error("Table {0} already exists")]
    TableAlreadyExists(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Column index {0} out of range")]
    ColumnOutOfRange(usize),

    #[error("{op} result {value} does not fit in a 32-bit integer")]
    AggregateOverflow { op: String, value: i64 },

    #[error("Corrupt page {page_id}: {reason}")]
    CorruptPage { page_id: PageId, reason: String },
}

pub type Result<T> = std::result::Result<T, KilnError>;
