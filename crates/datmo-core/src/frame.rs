//! Planar XYZ frame buffer.
//!
//! A [`Frame`] holds three equally sized `f32` planes (CIE X, Y, Z) in
//! row-major order, plus a [`Tags`] store:
//!
//! ```text
//! X: [x00 x01 x02 ...]   Y: [y00 y01 ...]   Z: [z00 z01 ...]
//! ```
//!
//! The Y plane carries luminance. Tone mapping reads it directly and the
//! other planes are only touched through color conversion.
//!
//! # Usage
//!
//! ```rust
//! use datmo_core::Frame;
//!
//! let mut frame = Frame::new(4, 2);
//! frame.y_mut()[0] = 100.0;
//! assert_eq!(frame.pixel_count(), 8);
//! assert_eq!(frame.y()[0], 100.0);
//! ```

use crate::{Error, Result, Tags};

/// Owned planar three-channel float image.
///
/// Invariant: all three planes hold exactly `width * height` samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    x: Vec<f32>,
    y: Vec<f32>,
    z: Vec<f32>,
    tags: Tags,
}

impl Frame {
    /// Creates a frame filled with zeros.
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            x: vec![0.0; len],
            y: vec![0.0; len],
            z: vec![0.0; len],
            tags: Tags::new(),
        }
    }

    /// Creates a frame from existing X, Y, Z planes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDimensions`] if `width * height` overflows and
    /// [`Error::ChannelMismatch`] if a plane has the wrong length.
    pub fn from_xyz(width: u32, height: u32, x: Vec<f32>, y: Vec<f32>, z: Vec<f32>) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| Error::invalid_dimensions(width, height, "sample count overflows"))?;
        for (name, plane) in [("X", &x), ("Y", &y), ("Z", &z)] {
            if plane.len() != expected {
                return Err(Error::channel_mismatch(name, expected, plane.len()));
            }
        }
        Ok(Self {
            width,
            height,
            x,
            y,
            z,
            tags: Tags::new(),
        })
    }

    /// Creates a gray frame from a luminance plane.
    ///
    /// X and Z are set so every pixel has the chromaticity of `white`
    /// (XYZ with `Y = 1`), e.g. D65.
    pub fn from_luminance(width: u32, height: u32, y: Vec<f32>, white: [f32; 3]) -> Result<Self> {
        let x = y.iter().map(|&v| v * white[0]).collect();
        let z = y.iter().map(|&v| v * white[2]).collect();
        Self::from_xyz(width, height, x, y, z)
    }

    /// Attaches tags, consuming and returning the frame.
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    /// Frame width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of pixels (samples per plane).
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.y.len()
    }

    /// X plane.
    pub fn x(&self) -> &[f32] {
        &self.x
    }

    /// Y (luminance) plane.
    pub fn y(&self) -> &[f32] {
        &self.y
    }

    /// Z plane.
    pub fn z(&self) -> &[f32] {
        &self.z
    }

    /// Mutable Y plane.
    pub fn y_mut(&mut self) -> &mut [f32] {
        &mut self.y
    }

    /// All three planes.
    pub fn xyz(&self) -> (&[f32], &[f32], &[f32]) {
        (&self.x, &self.y, &self.z)
    }

    /// All three planes, mutably.
    pub fn xyz_mut(&mut self) -> (&mut [f32], &mut [f32], &mut [f32]) {
        (&mut self.x, &mut self.y, &mut self.z)
    }

    /// Tag store.
    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    /// Mutable tag store.
    pub fn tags_mut(&mut self) -> &mut Tags {
        &mut self.tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_new_zeroed() {
        let frame = Frame::new(3, 2);
        assert_eq!(frame.width(), 3);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.pixel_count(), 6);
        assert!(frame.x().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_from_xyz_mismatch() {
        let err = Frame::from_xyz(2, 2, vec![0.0; 4], vec![0.0; 4], vec![0.0; 3]).unwrap_err();
        assert!(matches!(err, Error::ChannelMismatch { channel: "Z", expected: 4, got: 3 }));
    }

    #[test]
    fn test_from_luminance_chromaticity() {
        let white = [0.9505, 1.0, 1.089];
        let frame = Frame::from_luminance(2, 1, vec![2.0, 4.0], white).unwrap();
        assert_relative_eq!(frame.x()[1], 4.0 * 0.9505, epsilon = 1e-6);
        assert_relative_eq!(frame.z()[0], 2.0 * 1.089, epsilon = 1e-6);
    }
}
