use thiserror::Error;

use crate::common::PageId;
use crate::storage::common::DecodeError;
use crate::tuple::RecordId;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Schema mismatch: expected ({expected}), got ({actual})")]
    SchemaMismatch { expected: String, actual: String },

    #[error("Page {0} is full")]
    PageFull(PageId),

    #[error("Tuple at {record_id} is not stored on page {page_id}")]
    SlotNotOwned { record_id: RecordId, page_id: PageId },

    #[error("Tuple has not been placed on any page")]
    TupleNotPlaced,

    #[error("Slot of tuple {0} is already empty")]
    SlotAlreadyEmpty(RecordId),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("A tuple of {tuple_size} bytes does not fit into a page of {page_size} bytes")]
    TupleTooLarge { tuple_size: usize, page_size: usize },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Page {page_id} is corrupted")]
    CorruptPage {
        page_id: PageId,
        #[source]
        source: DecodeError,
    },

    #[error("All pages in the buffer pool are pinned or dirty")]
    BufferPoolFull,
}

/// Attaches a human readable context to I/O errors, similar to `anyhow::Context`.
pub(crate) trait IoContext<T> {
    fn io_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn io_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|source| StorageError::Io {
            context: f(),
            source,
        })
    }
}
