//! Color primaries, white points, and RGB-XYZ matrix generation.
//!
//! Each RGB space is defined by the CIE xy chromaticities of its three
//! primaries and its white point. The RGB -> XYZ matrix is derived so that
//! RGB `(1, 1, 1)` lands on the white point with `Y = 1`.
//!
//! ```rust
//! use datmo_color::{rgb_to_xyz_matrix, SRGB};
//! use glam::Vec3;
//!
//! let m = rgb_to_xyz_matrix(&SRGB).unwrap();
//! let white = m * Vec3::ONE;
//! assert!((white.y - 1.0).abs() < 1e-4);
//! ```

use crate::{ColorError, ColorResult};
use glam::{Mat3, Vec3};

/// RGB color space primaries definition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Primaries {
    /// Red primary (x, y) chromaticity
    pub r: (f32, f32),
    /// Green primary (x, y) chromaticity
    pub g: (f32, f32),
    /// Blue primary (x, y) chromaticity
    pub b: (f32, f32),
    /// White point (x, y) chromaticity
    pub w: (f32, f32),
    /// Color space name
    pub name: &'static str,
}

impl Primaries {
    /// White point as XYZ (Y=1).
    #[inline]
    pub fn white_xyz(&self) -> Vec3 {
        xy_to_xyz(self.w.0, self.w.1)
    }
}

/// D65 white point chromaticity (daylight, ~6500K).
pub const D65_XY: (f32, f32) = (0.31270, 0.32900);

/// sRGB / Rec.709 primaries (D65 white point).
pub const SRGB: Primaries = Primaries {
    r: (0.6400, 0.3300),
    g: (0.3000, 0.6000),
    b: (0.1500, 0.0600),
    w: D65_XY,
    name: "sRGB",
};

/// Rec.2020 primaries (D65 white point).
pub const REC2020: Primaries = Primaries {
    r: (0.7080, 0.2920),
    g: (0.1700, 0.7970),
    b: (0.1310, 0.0460),
    w: D65_XY,
    name: "Rec.2020",
};

/// Converts xy chromaticity to XYZ (with Y=1).
fn xy_to_xyz(x: f32, y: f32) -> Vec3 {
    if y.abs() < 1e-10 {
        Vec3::ZERO
    } else {
        Vec3::new(x / y, 1.0, (1.0 - x - y) / y)
    }
}

/// Computes the RGB to XYZ matrix for a set of primaries.
///
/// # Errors
///
/// [`ColorError::MatrixError`] if the primaries are collinear.
pub fn rgb_to_xyz_matrix(primaries: &Primaries) -> ColorResult<Mat3> {
    let r_xyz = xy_to_xyz(primaries.r.0, primaries.r.1);
    let g_xyz = xy_to_xyz(primaries.g.0, primaries.g.1);
    let b_xyz = xy_to_xyz(primaries.b.0, primaries.b.1);

    let m = Mat3::from_cols(r_xyz, g_xyz, b_xyz);
    if m.determinant().abs() < 1e-8 {
        return Err(ColorError::MatrixError(format!(
            "primaries of {} are degenerate",
            primaries.name
        )));
    }

    // Scale columns so that RGB white maps to the white point: S = M^-1 * W
    let s = m.inverse() * primaries.white_xyz();
    Ok(Mat3::from_cols(r_xyz * s.x, g_xyz * s.y, b_xyz * s.z))
}

/// Computes the XYZ to RGB matrix for a set of primaries.
pub fn xyz_to_rgb_matrix(primaries: &Primaries) -> ColorResult<Mat3> {
    Ok(rgb_to_xyz_matrix(primaries)?.inverse())
}
