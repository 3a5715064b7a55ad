//! Storage layer error types.

use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Page not found: {0:?}")]
    PageNotFound(crate::storage::page::PageId),

    #[error("Page limit reached: table holds at most {limit} pages")]
    PageLimitReached { limit: u32 },

    #[error("Corrupt database file: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
