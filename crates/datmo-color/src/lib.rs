//! # datmo-color
//!
//! Color primaries and planar RGB <-> XYZ conversion.
//!
//! The tone mapper works on linear RGB (for the saturation correction) while
//! frames are stored as CIE XYZ. [`ColorSpaceAdapter`] converts between the
//! two for whole planes at once.
//!
//! # Usage
//!
//! ```rust
//! use datmo_color::{ColorSpaceAdapter, WorkingSpace};
//!
//! let adapter = ColorSpaceAdapter::new(WorkingSpace::Srgb).unwrap();
//! let (x, y, z) = (vec![0.9505_f32], vec![1.0_f32], vec![1.089_f32]);
//! let (mut r, mut g, mut b) = (vec![0.0; 1], vec![0.0; 1], vec![0.0; 1]);
//! adapter.xyz_to_rgb(&x, &y, &z, &mut r, &mut g, &mut b).unwrap();
//! assert!((r[0] - 1.0).abs() < 1e-3);
//! ```
//!
//! # Dependencies
//!
//! - [`glam`] - 3x3 matrices
//! - [`rayon`] - Parallel plane conversion

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod convert;
mod error;
pub mod primaries;

pub use convert::{ColorSpaceAdapter, WorkingSpace};
pub use error::{ColorError, ColorResult};
pub use primaries::{rgb_to_xyz_matrix, xyz_to_rgb_matrix, Primaries, D65_XY, REC2020, SRGB};
