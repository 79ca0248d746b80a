//! Error types for tone mapping.
//!
//! Every failure aborts the whole pipeline before anything is written back
//! to the frame. Recoverable anomalies (a garbled `WHITE_Y` tag, already
//! display-referred input, a solve that hit its iteration cap) are logged
//! with `tracing::warn!` instead.

use thiserror::Error;

/// Tone mapping error.
#[derive(Debug, Error)]
pub enum TmoError {
    /// A caller-supplied factor or setting is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Display type identifier is not one of the known models.
    #[error("unknown display type: {0}")]
    UnknownDisplayType(String),

    /// Luminance plane holds a negative or non-finite sample.
    #[error("invalid image data: {0}")]
    InvalidImageData(String),

    /// Contrast statistics could not be built.
    #[error("failed to analyse the image: {0}")]
    DensityEstimationFailed(String),

    /// No tone curve satisfies the display constraints.
    #[error("failed to compute the tone curve: {0}")]
    ToneCurveComputationFailed(String),

    /// The tone curve could not be applied to the image.
    #[error("failed to tone-map the image: {0}")]
    ToneCurveApplicationFailed(String),

    /// Configuration file could not be parsed or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),

    /// Color conversion failed.
    #[error(transparent)]
    Color(#[from] datmo_color::ColorError),

    /// Frame construction or access failed.
    #[error(transparent)]
    Core(#[from] datmo_core::Error),

    /// I/O error while reading a configuration file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TmoError {
    /// Creates a [`TmoError::InvalidParameter`] error.
    #[inline]
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Creates a [`TmoError::ToneCurveComputationFailed`] error.
    #[inline]
    pub fn curve_failed(msg: impl Into<String>) -> Self {
        Self::ToneCurveComputationFailed(msg.into())
    }
}

/// Result type for tone mapping.
pub type TmoResult<T> = Result<T, TmoError>;
