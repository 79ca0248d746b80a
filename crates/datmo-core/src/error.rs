//! Error types for datmo-core operations.
//!
//! # Usage
//!
//! ```rust
//! use datmo_core::{Error, Result};
//!
//! fn check(width: u32, height: u32) -> Result<()> {
//!     if width == 0 || height == 0 {
//!         return Err(Error::invalid_dimensions(width, height, "zero-sized frame"));
//!     }
//!     Ok(())
//! }
//! assert!(check(0, 4).is_err());
//! ```

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or accessing a [`Frame`](crate::Frame).
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid frame dimensions.
    ///
    /// Returned when a channel buffer does not hold `width * height`
    /// samples, or the sample count overflows.
    #[error("invalid dimensions: {width}x{height} ({reason})")]
    InvalidDimensions {
        /// Requested width
        width: u32,
        /// Requested height
        height: u32,
        /// Reason why dimensions are invalid
        reason: String,
    },

    /// Channel planes of different sizes were combined.
    #[error("channel size mismatch: {channel} has {got} samples, expected {expected}")]
    ChannelMismatch {
        /// Channel name
        channel: &'static str,
        /// Expected sample count
        expected: usize,
        /// Actual sample count
        got: usize,
    },

    /// Generic error with custom message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Creates an [`Error::InvalidDimensions`] error.
    #[inline]
    pub fn invalid_dimensions(width: u32, height: u32, reason: impl Into<String>) -> Self {
        Self::InvalidDimensions {
            width,
            height,
            reason: reason.into(),
        }
    }

    /// Creates an [`Error::ChannelMismatch`] error.
    #[inline]
    pub fn channel_mismatch(channel: &'static str, expected: usize, got: usize) -> Self {
        Self::ChannelMismatch {
            channel,
            expected,
            got,
        }
    }

    /// Creates an [`Error::Other`] error.
    #[inline]
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}
