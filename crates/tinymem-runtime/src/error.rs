//! Error types for tinymem-runtime

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("storage error: {0}")]
    Storage(#[from] tinymem_storage::StorageError),

    #[error("resolver error: {0}")]
    Resolver(#[from] tinymem_resolver::ResolverError),

    #[error("validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
