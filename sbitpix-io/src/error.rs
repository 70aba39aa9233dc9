//! I/O error types.

use sbitpix_core::MappingError;
use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid file format.
    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    /// Channel map content rejected.
    #[error("malformed mapping: {0}")]
    Mapping(#[from] MappingError),

    /// Summary serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn format_at(source: &str, line: usize, message: impl std::fmt::Display) -> Self {
        Self::InvalidFormat(format!("{source}:{line}: {message}"))
    }
}
