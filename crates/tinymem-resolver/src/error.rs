//! Error types for tinymem-resolver

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("storage error: {0}")]
    Storage(#[from] tinymem_storage::StorageError),

    #[error("validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, ResolverError>;
