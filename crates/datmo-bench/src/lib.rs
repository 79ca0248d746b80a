//! Synthetic inputs shared by the datmo benchmarks.

use datmo_core::{Frame, Result};

/// D65 white in XYZ with Y = 1.
const D65: [f32; 3] = [0.950_47, 1.0, 1.088_83];

/// Luminance of a `width x height` scene spanning about five decades: a
/// diagonal log ramp with a bright window and checkered texture.
pub fn synthetic_luminance(width: usize, height: usize) -> Vec<f32> {
    let mut y = Vec::with_capacity(width * height);
    let diag = (width + height).max(1) as f32;
    for row in 0..height {
        for col in 0..width {
            let t = (row + col) as f32 / diag;
            let mut l = 10f32.powf(-2.0 + 4.0 * t);
            if (row / 4 + col / 4) % 2 == 0 {
                l *= 1.5;
            }
            if row > height / 3 && row < height / 2 && col > width / 2 && col < 3 * width / 4 {
                l *= 50.0;
            }
            y.push(l);
        }
    }
    y
}

/// Gray frame over [`synthetic_luminance`].
pub fn synthetic_frame(width: u32, height: u32) -> Result<Frame> {
    let y = synthetic_luminance(width as usize, height as usize);
    Frame::from_luminance(width, height, y, D65)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spans_several_decades() {
        let y = synthetic_luminance(64, 64);
        let (lo, hi) = y
            .iter()
            .fold((f32::INFINITY, 0.0f32), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        assert!((hi / lo).log10() > 4.0);
        assert_eq!(synthetic_frame(16, 8).unwrap().pixel_count(), 128);
    }
}
