//! Error types for tinymem-etv

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtvError {
    #[error("read error: {0}")]
    Read(String),
}

pub type Result<T> = std::result::Result<T, EtvError>;
