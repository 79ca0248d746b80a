//! Planar RGB <-> XYZ conversion.
//!
//! [`ColorSpaceAdapter`] is a pure function pair over whole planes. Each
//! output sample depends only on the input samples at the same index, so the
//! planes are converted in parallel without changing results.

use std::fmt;
use std::str::FromStr;

use glam::{Mat3, Vec3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::primaries::{rgb_to_xyz_matrix, Primaries, REC2020, SRGB};
use crate::{ColorError, ColorResult};

/// Linear RGB space used while tone mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkingSpace {
    /// sRGB / Rec.709 primaries.
    #[default]
    Srgb,
    /// Rec.2020 primaries.
    Rec2020,
}

impl WorkingSpace {
    /// Primaries of this space.
    pub fn primaries(self) -> &'static Primaries {
        match self {
            WorkingSpace::Srgb => &SRGB,
            WorkingSpace::Rec2020 => &REC2020,
        }
    }
}

impl fmt::Display for WorkingSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.primaries().name)
    }
}

impl FromStr for WorkingSpace {
    type Err = ColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['.', '-', '_'], "").as_str() {
            "srgb" | "rec709" | "bt709" => Ok(WorkingSpace::Srgb),
            "rec2020" | "bt2020" => Ok(WorkingSpace::Rec2020),
            _ => Err(ColorError::UnknownWorkingSpace(s.to_string())),
        }
    }
}

/// Converts frames between CIE XYZ and a linear RGB working space.
#[derive(Debug, Clone, Copy)]
pub struct ColorSpaceAdapter {
    space: WorkingSpace,
    to_xyz: Mat3,
    to_rgb: Mat3,
}

impl ColorSpaceAdapter {
    /// Builds the adapter for `space`.
    pub fn new(space: WorkingSpace) -> ColorResult<Self> {
        let to_xyz = rgb_to_xyz_matrix(space.primaries())?;
        Ok(Self {
            space,
            to_xyz,
            to_rgb: to_xyz.inverse(),
        })
    }

    /// Working space of this adapter.
    pub fn space(&self) -> WorkingSpace {
        self.space
    }

    /// XYZ of the working space white (Y = 1).
    pub fn white_xyz(&self) -> [f32; 3] {
        self.space.primaries().white_xyz().to_array()
    }

    /// Converts XYZ planes to RGB planes.
    pub fn xyz_to_rgb(
        &self,
        x: &[f32],
        y: &[f32],
        z: &[f32],
        r: &mut [f32],
        g: &mut [f32],
        b: &mut [f32],
    ) -> ColorResult<()> {
        transform_planes(&self.to_rgb, [x, y, z], [r, g, b])
    }

    /// Converts RGB planes to XYZ planes.
    pub fn rgb_to_xyz(
        &self,
        r: &[f32],
        g: &[f32],
        b: &[f32],
        x: &mut [f32],
        y: &mut [f32],
        z: &mut [f32],
    ) -> ColorResult<()> {
        transform_planes(&self.to_xyz, [r, g, b], [x, y, z])
    }

    /// Luminance (Y) of a single linear RGB triple.
    #[inline]
    pub fn luminance(&self, rgb: [f32; 3]) -> f32 {
        (self.to_xyz * Vec3::from_array(rgb)).y
    }
}

fn transform_planes(m: &Mat3, src: [&[f32]; 3], dst: [&mut [f32]; 3]) -> ColorResult<()> {
    let len = src[0].len();
    for got in src.iter().map(|p| p.len()).chain(dst.iter().map(|p| p.len())) {
        if got != len {
            return Err(ColorError::PlaneMismatch { expected: len, got });
        }
    }

    let [a, b, c] = src;
    let [oa, ob, oc] = dst;
    oa.par_iter_mut()
        .zip(ob.par_iter_mut())
        .zip(oc.par_iter_mut())
        .enumerate()
        .for_each(|(i, ((o0, o1), o2))| {
            let v = *m * Vec3::new(a[i], b[i], c[i]);
            *o0 = v.x;
            *o1 = v.y;
            *o2 = v.z;
        });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_parse_working_space() {
        assert_eq!("sRGB".parse::<WorkingSpace>().unwrap(), WorkingSpace::Srgb);
        assert_eq!("Rec.2020".parse::<WorkingSpace>().unwrap(), WorkingSpace::Rec2020);
        assert!("prophoto".parse::<WorkingSpace>().is_err());
    }

    #[test]
    fn test_white_maps_to_equal_rgb() {
        let adapter = ColorSpaceAdapter::new(WorkingSpace::Srgb).unwrap();
        let w = adapter.white_xyz();
        let (x, y, z) = ([w[0] * 5.0], [5.0], [w[2] * 5.0]);
        let (mut r, mut g, mut b) = ([0.0], [0.0], [0.0]);
        adapter.xyz_to_rgb(&x, &y, &z, &mut r, &mut g, &mut b).unwrap();
        assert_abs_diff_eq!(r[0], 5.0, epsilon = 1e-3);
        assert_abs_diff_eq!(g[0], 5.0, epsilon = 1e-3);
        assert_abs_diff_eq!(b[0], 5.0, epsilon = 1e-3);
    }

    #[test]
    fn test_round_trip_preserves_color() {
        let adapter = ColorSpaceAdapter::new(WorkingSpace::Rec2020).unwrap();
        let r = [0.2, 1.5, 30.0];
        let g = [0.7, 0.1, 10.0];
        let b = [0.05, 0.4, 2.0];
        let (mut x, mut y, mut z) = ([0.0; 3], [0.0; 3], [0.0; 3]);
        adapter.rgb_to_xyz(&r, &g, &b, &mut x, &mut y, &mut z).unwrap();
        assert_abs_diff_eq!(y[1], adapter.luminance([1.5, 0.1, 0.4]), epsilon = 1e-5);

        let (mut r2, mut g2, mut b2) = ([0.0; 3], [0.0; 3], [0.0; 3]);
        adapter.xyz_to_rgb(&x, &y, &z, &mut r2, &mut g2, &mut b2).unwrap();
        for i in 0..3 {
            assert_abs_diff_eq!(r2[i], r[i], epsilon = 1e-3 * r[i].max(1.0));
            assert_abs_diff_eq!(g2[i], g[i], epsilon = 1e-3 * g[i].max(1.0));
            assert_abs_diff_eq!(b2[i], b[i], epsilon = 1e-3 * b[i].max(1.0));
        }
    }

    #[test]
    fn test_plane_mismatch() {
        let adapter = ColorSpaceAdapter::new(WorkingSpace::Srgb).unwrap();
        let (mut r, mut g, mut b) = ([0.0; 2], [0.0; 2], [0.0; 1]);
        let err = adapter
            .xyz_to_rgb(&[1.0; 2], &[1.0; 2], &[1.0; 2], &mut r, &mut g, &mut b)
            .unwrap_err();
        assert!(matches!(err, ColorError::PlaneMismatch { expected: 2, got: 1 }));
    }
}
