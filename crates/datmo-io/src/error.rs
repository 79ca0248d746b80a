//! Error types for frame I/O.

use std::io;
use thiserror::Error;

/// Frame I/O error.
#[derive(Debug, Error)]
pub enum IoError {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// File extension not handled by any reader or writer.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Invalid or corrupted file.
    #[error("invalid file: {0}")]
    InvalidFile(String),

    /// Encoder failure.
    #[error("encode error: {0}")]
    EncodeError(String),

    /// Color conversion failed.
    #[error(transparent)]
    Color(#[from] datmo_color::ColorError),

    /// Decoded planes do not form a valid frame.
    #[error(transparent)]
    Frame(#[from] datmo_core::Error),
}

/// Result type for frame I/O.
pub type IoResult<T> = Result<T, IoError>;
