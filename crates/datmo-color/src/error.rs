//! Error types for color operations.

use thiserror::Error;

/// Color operation error.
#[derive(Debug, Error)]
pub enum ColorError {
    /// Matrix operation failed (singular primaries).
    #[error("matrix error: {0}")]
    MatrixError(String),

    /// Planes passed to a conversion differ in length.
    #[error("plane length mismatch: expected {expected}, got {got}")]
    PlaneMismatch {
        /// Expected plane length
        expected: usize,
        /// Actual plane length
        got: usize,
    },

    /// Unknown working space name.
    #[error("unknown working space: {0}")]
    UnknownWorkingSpace(String),
}

/// Result type for color operations.
pub type ColorResult<T> = Result<T, ColorError>;
