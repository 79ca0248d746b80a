//! # datmo-tmo
//!
//! Display adaptive tone mapping.
//!
//! A global tone curve is fitted to one image and one display: the contrasts
//! the image contains, weighted by how visible they are on the target
//! display, are preserved as well as the display's luminance range allows.
//!
//! # Modules
//!
//! - [`display`] - Display luminance response and viewing geometry
//! - [`density`] - Contrast density conditional on luminance
//! - [`optimize`] - Tone curve solver
//! - [`curve`] - Tone curve evaluation and export
//! - [`apply`] - Curve application with saturation compensation
//! - [`pipeline`] - Frame-level orchestration, tags, and progress
//! - [`config`] - YAML-loadable settings
//!
//! # Example
//!
//! ```rust
//! use datmo_core::{Frame, NoProgress, TAG_LUMINANCE};
//! use datmo_tmo::{tonemap, TonemapConfig};
//!
//! let lum: Vec<f32> = (0..64).map(|i| 0.01 * 1.15f32.powi(i)).collect();
//! let mut frame = Frame::from_luminance(8, 8, lum, [0.9505, 1.0, 1.089]).unwrap();
//! let report = tonemap(&mut frame, &TonemapConfig::default(), &mut NoProgress).unwrap();
//! assert!(report.curve.len() >= 2);
//! assert_eq!(frame.tags().get(TAG_LUMINANCE), Some("DISPLAY"));
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod apply;
pub mod config;
pub mod csf;
pub mod curve;
pub mod density;
pub mod display;
mod error;
pub mod optimize;
pub mod pipeline;

pub use apply::apply_tone_curve;
pub use config::TonemapConfig;
pub use curve::ToneCurve;
pub use density::{ConditionalDensity, DensityEntry, MIN_LUMINANCE};
pub use display::{DisplayFunction, DisplayPreset, DisplaySize, Ggba};
pub use error::{TmoError, TmoResult};
pub use optimize::{compute_tone_curve, OptimizerOptions, ToneCurveSolution};
pub use pipeline::{tonemap, tonemap_frame, TonemapReport, LUMINANCE_DISPLAY};
