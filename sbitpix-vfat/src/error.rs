//! VFAT decoding and readout configuration error types.

use thiserror::Error;

/// Result type for decoder operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Decoder-specific error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Readout configuration rejected during validation.
    #[error("invalid readout configuration: {0}")]
    ConfigError(String),

    /// Configuration JSON could not be parsed.
    #[error("configuration parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A mapping table failed validation.
    #[error("malformed mapping: {0}")]
    MalformedMapping(#[from] sbitpix_core::MappingError),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
