//! Error types for tinymem-storage

use thiserror::Error;

/// Storage-layer errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),
}

/// Result type alias for tinymem-storage
pub type Result<T> = std::result::Result<T, StorageError>;

impl From<StorageError> for tinymem_core::Error {
    fn from(e: StorageError) -> Self {
        tinymem_core::Error::Storage(e.to_string())
    }
}
