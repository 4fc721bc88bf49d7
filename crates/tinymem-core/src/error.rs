//! Error types for tinymem-core

use thiserror::Error;

/// Top-level errors surfaced across the state-transition engine
#[derive(Error, Debug)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("parser error: {0}")]
    Parser(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for tinymem-core and its consumers
pub type Result<T> = std::result::Result<T, Error>;
