//! Portable float map (PFM) support.
//!
//! `PF` files hold linear RGB, `Pf` files a single gray channel. Rows are
//! stored bottom to top; the sign of the scale line gives the byte order
//! (negative = little endian) and its magnitude is ignored. RGB is taken
//! to use sRGB primaries.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use datmo_color::{ColorSpaceAdapter, WorkingSpace};
use datmo_core::{Frame, TAG_LUMINANCE};
use tracing::debug;

use crate::{IoError, IoResult};

/// Reads a PFM file into an XYZ frame.
pub fn read<P: AsRef<Path>>(path: P) -> IoResult<Frame> {
    let file = File::open(path)?;
    read_from(&mut BufReader::new(file))
}

/// Reads a PFM stream into an XYZ frame.
pub fn read_from<R: BufRead>(reader: &mut R) -> IoResult<Frame> {
    let magic = next_token(reader)?;
    let channels = match magic.as_str() {
        "PF" => 3,
        "Pf" => 1,
        other => return Err(IoError::InvalidFile(format!("not a PFM file (magic '{other}')"))),
    };
    let width: usize = parse_token(reader, "width")?;
    let height: usize = parse_token(reader, "height")?;
    let scale: f32 = parse_token(reader, "scale")?;
    let len = crate::sample_count(width, height, channels)?;
    if scale == 0.0 || !scale.is_finite() {
        return Err(IoError::InvalidFile(format!("invalid PFM scale {scale}")));
    }

    let mut data = vec![0.0f32; len];
    if scale < 0.0 {
        reader.read_f32_into::<LittleEndian>(&mut data)?;
    } else {
        reader.read_f32_into::<BigEndian>(&mut data)?;
    }

    let n = width * height;
    let mut planes = vec![vec![0.0f32; n]; channels];
    for (row, src) in data.chunks_exact(width * channels).enumerate() {
        // Bottom-up storage
        let dst_row = height - 1 - row;
        for (x, px) in src.chunks_exact(channels).enumerate() {
            for (c, &v) in px.iter().enumerate() {
                planes[c][dst_row * width + x] = v;
            }
        }
    }

    let (w, h) = (width as u32, height as u32);
    let adapter = ColorSpaceAdapter::new(WorkingSpace::Srgb)?;
    let mut frame = match planes.as_slice() {
        [gray] => Frame::from_luminance(w, h, gray.clone(), adapter.white_xyz())?,
        [r, g, b] => {
            let (mut x, mut y, mut z) = (vec![0.0; n], vec![0.0; n], vec![0.0; n]);
            adapter.rgb_to_xyz(r, g, b, &mut x, &mut y, &mut z)?;
            Frame::from_xyz(w, h, x, y, z)?
        }
        _ => {
            return Err(IoError::InvalidFile(format!(
                "unsupported PFM channel count {channels}"
            )));
        }
    };
    frame.tags_mut().set(TAG_LUMINANCE, "RELATIVE");
    debug!(width, height, channels, "read PFM");
    Ok(frame)
}

/// Writes an XYZ frame as little-endian RGB PFM.
pub fn write<P: AsRef<Path>>(path: P, frame: &Frame) -> IoResult<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_to(&mut writer, frame)?;
    writer.flush()?;
    Ok(())
}

/// Writes an XYZ frame as little-endian RGB PFM to a stream.
pub fn write_to<W: Write>(writer: &mut W, frame: &Frame) -> IoResult<()> {
    let (width, height) = (frame.width() as usize, frame.height() as usize);
    write!(writer, "PF\n{width} {height}\n-1.0\n")?;

    let adapter = ColorSpaceAdapter::new(WorkingSpace::Srgb)?;
    let n = frame.pixel_count();
    let (mut r, mut g, mut b) = (vec![0.0; n], vec![0.0; n], vec![0.0; n]);
    let (x, y, z) = frame.xyz();
    adapter.xyz_to_rgb(x, y, z, &mut r, &mut g, &mut b)?;

    for row in (0..height).rev() {
        for i in row * width..(row + 1) * width {
            writer.write_f32::<LittleEndian>(r[i])?;
            writer.write_f32::<LittleEndian>(g[i])?;
            writer.write_f32::<LittleEndian>(b[i])?;
        }
    }
    Ok(())
}

/// Reads one whitespace-delimited header token and the single whitespace
/// byte that ends it.
fn next_token<R: Read>(reader: &mut R) -> IoResult<String> {
    let mut token = Vec::new();
    loop {
        let byte = reader.read_u8()?;
        if byte.is_ascii_whitespace() {
            if token.is_empty() {
                continue;
            }
            break;
        }
        token.push(byte);
        if token.len() > 64 {
            return Err(IoError::InvalidFile("PFM header token too long".into()));
        }
    }
    String::from_utf8(token).map_err(|_| IoError::InvalidFile("PFM header is not ASCII".into()))
}

fn parse_token<R: Read, T: std::str::FromStr>(reader: &mut R, what: &str) -> IoResult<T> {
    let token = next_token(reader)?;
    token
        .parse()
        .map_err(|_| IoError::InvalidFile(format!("invalid PFM {what} '{token}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Cursor;

    #[test]
    fn pfm_round_trip_keeps_orientation() {
        let lum: Vec<f32> = (0..12).map(|i| 0.5 + i as f32 * 10.0).collect();
        let frame = Frame::from_luminance(4, 3, lum.clone(), [0.9505, 1.0, 1.089]).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ramp.pfm");
        write(&path, &frame).unwrap();
        let back = read(&path).unwrap();

        assert_eq!((back.width(), back.height()), (4, 3));
        for (a, b) in lum.iter().zip(back.y()) {
            assert_relative_eq!(*a, *b, max_relative = 1e-3);
        }
        assert_eq!(back.tags().get(TAG_LUMINANCE), Some("RELATIVE"));
    }

    #[test]
    fn reads_big_endian_gray() {
        let mut bytes = b"Pf\n2 1\n1.0\n".to_vec();
        bytes.write_f32::<BigEndian>(3.0).unwrap();
        bytes.write_f32::<BigEndian>(7.0).unwrap();
        let frame = read_from(&mut Cursor::new(bytes)).unwrap();
        assert_relative_eq!(frame.y()[0], 3.0, epsilon = 1e-6);
        assert_relative_eq!(frame.y()[1], 7.0, epsilon = 1e-6);
    }

    #[test]
    fn rejects_truncated_and_bad_magic() {
        let err = read_from(&mut Cursor::new(b"P6\n2 2\n255\n".to_vec())).unwrap_err();
        assert!(matches!(err, IoError::InvalidFile(_)));

        let mut bytes = b"PF\n2 2\n-1.0\n".to_vec();
        bytes.extend_from_slice(&[0u8; 12]);
        let err = read_from(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, IoError::Io(_)));
    }

    #[test]
    fn rejects_oversized_header() {
        for header in [
            "PF\n8589934592 8589934592\n-1.0\n",
            "Pf\n70000 1\n-1.0\n",
            "PF\n0 4\n-1.0\n",
        ] {
            let err = read_from(&mut Cursor::new(header.as_bytes().to_vec())).unwrap_err();
            assert!(matches!(err, IoError::InvalidFile(_)), "{header:?}: {err}");
        }
    }
}
