//! 8-bit PNG output for display-referred frames.
//!
//! A tone-mapped frame stores display pixel values in `[0, 1]` (already
//! encoded for the display response) converted to XYZ. Writing converts
//! back with the same working space and quantizes to 8 bits.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use datmo_color::{ColorSpaceAdapter, WorkingSpace};
use datmo_core::{Frame, TAG_LUMINANCE};
use tracing::warn;

use crate::{IoError, IoResult};

/// Writes a display-referred frame as 8-bit RGB PNG.
pub fn write<P: AsRef<Path>>(path: P, frame: &Frame, space: WorkingSpace) -> IoResult<()> {
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    write_to(&mut writer, frame, space)?;
    writer.flush()?;
    Ok(())
}

/// Writes a display-referred frame as 8-bit RGB PNG to a stream.
pub fn write_to<W: Write>(writer: W, frame: &Frame, space: WorkingSpace) -> IoResult<()> {
    if frame.tags().get(TAG_LUMINANCE) != Some("DISPLAY") {
        warn!("writing a frame that is not display-referred to PNG, values are clipped to [0, 1]");
    }

    let adapter = ColorSpaceAdapter::new(space)?;
    let n = frame.pixel_count();
    let (mut r, mut g, mut b) = (vec![0.0; n], vec![0.0; n], vec![0.0; n]);
    let (x, y, z) = frame.xyz();
    adapter.xyz_to_rgb(x, y, z, &mut r, &mut g, &mut b)?;

    let mut bytes = Vec::with_capacity(n * 3);
    for i in 0..n {
        bytes.extend([to_u8(r[i]), to_u8(g[i]), to_u8(b[i])]);
    }

    let mut encoder = png::Encoder::new(writer, frame.width(), frame.height());
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png::Compression::default());
    encoder.set_source_srgb(png::SrgbRenderingIntent::Perceptual);

    let mut png_writer = encoder
        .write_header()
        .map_err(|e| IoError::EncodeError(e.to_string()))?;
    png_writer
        .write_image_data(&bytes)
        .map_err(|e| IoError::EncodeError(e.to_string()))?;
    Ok(())
}

#[inline]
fn to_u8(v: f32) -> u8 {
    if v.is_nan() {
        return 0;
    }
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantization() {
        assert_eq!(to_u8(0.0), 0);
        assert_eq!(to_u8(1.0), 255);
        assert_eq!(to_u8(2.0), 255);
        assert_eq!(to_u8(-1.0), 0);
        assert_eq!(to_u8(0.5), 128);
        assert_eq!(to_u8(f32::NAN), 0);
    }

    #[test]
    fn writes_png_signature() {
        let mut frame = Frame::from_luminance(4, 2, vec![0.5; 8], [0.9505, 1.0, 1.089]).unwrap();
        frame.tags_mut().set(TAG_LUMINANCE, "DISPLAY");
        let mut out = Vec::new();
        write_to(&mut out, &frame, WorkingSpace::Srgb).unwrap();
        assert_eq!(&out[1..4], b"PNG");
    }
}
