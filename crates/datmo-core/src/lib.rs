//! # datmo-core
//!
//! Core types shared by the datmo tone mapping crates.
//!
//! - [`Frame`] - Planar three-channel (XYZ) float image with a [`Tags`] store
//! - [`Tags`] - String key/value metadata attached to a frame
//! - [`ProgressSink`], [`Progress`] - One-way progress reporting
//! - [`Error`] - Error type for frame construction and access
//!
//! ## Crate Structure
//!
//! ```text
//! datmo-core (this crate)
//!    ^
//!    |
//!    +-- datmo-color (RGB <-> XYZ conversion)
//!    +-- datmo-tmo (density, optimizer, curve application)
//!    +-- datmo-io (Radiance HDR / PFM)
//!    +-- datmo-cli
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod frame;
pub mod progress;
pub mod tags;

pub use error::{Error, Result};
pub use frame::Frame;
pub use progress::{NoProgress, Progress, ProgressError, ProgressSink};
pub use tags::{Tags, TAG_LUMINANCE, TAG_WHITE_Y};

/// Prelude module for convenient imports.
///
/// ```
/// use datmo_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::frame::Frame;
    pub use crate::progress::{NoProgress, Progress, ProgressSink};
    pub use crate::tags::{Tags, TAG_LUMINANCE, TAG_WHITE_Y};
}
