//! Radiance HDR (RGBE / XYZE) format support.
//!
//! Reads and writes RGBE with optional RLE scanlines. RGB files are
//! converted to XYZ with sRGB primaries; XYZE files are taken as is.
//! The `EXPOSURE` header is divided out on read so frames hold the
//! original radiance.
//!
//! Header fields map to frame tags: `WHITE_Y` and `LUMINANCE` keep their
//! names, everything else is stored as `HDR:<KEY>` and written back on save.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use datmo_color::{ColorSpaceAdapter, WorkingSpace};
use datmo_core::{Frame, Tags, TAG_LUMINANCE, TAG_WHITE_Y};
use tracing::debug;

use crate::{IoError, IoResult, TAG_PREFIX_HDR};

const HDR_MAGIC: &str = "#?";
const FORMAT_RGBE: &str = "32-bit_rle_rgbe";
const FORMAT_XYZE: &str = "32-bit_rle_xyze";

/// Parsed header.
struct Header {
    width: usize,
    height: usize,
    xyz: bool,
    exposure: f32,
    tags: Tags,
}

/// Reads an HDR file into an XYZ frame.
pub fn read<P: AsRef<Path>>(path: P) -> IoResult<Frame> {
    let file = File::open(path)?;
    read_from(&mut BufReader::new(file))
}

/// Reads an HDR stream into an XYZ frame.
pub fn read_from<R: BufRead>(reader: &mut R) -> IoResult<Frame> {
    let header = read_header(reader)?;
    let (mut a, mut b, mut c) = read_pixels(reader, header.width, header.height)?;

    if header.exposure != 1.0 {
        let inv = 1.0 / header.exposure;
        for v in a.iter_mut().chain(b.iter_mut()).chain(c.iter_mut()) {
            *v *= inv;
        }
    }

    let (w, h) = (header.width as u32, header.height as u32);
    let frame = if header.xyz {
        Frame::from_xyz(w, h, a, b, c)?
    } else {
        let adapter = ColorSpaceAdapter::new(WorkingSpace::Srgb)?;
        let n = header.width * header.height;
        let (mut x, mut y, mut z) = (vec![0.0; n], vec![0.0; n], vec![0.0; n]);
        adapter.rgb_to_xyz(&a, &b, &c, &mut x, &mut y, &mut z)?;
        Frame::from_xyz(w, h, x, y, z)?
    };
    debug!(width = w, height = h, xyz = header.xyz, "read Radiance HDR");
    Ok(frame.with_tags(header.tags))
}

/// Writes an XYZ frame as an RGBE HDR file.
pub fn write<P: AsRef<Path>>(path: P, frame: &Frame) -> IoResult<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_to(&mut writer, frame)?;
    writer.flush()?;
    Ok(())
}

/// Writes an XYZ frame as RGBE to a stream.
pub fn write_to<W: Write>(writer: &mut W, frame: &Frame) -> IoResult<()> {
    writeln!(writer, "{HDR_MAGIC}RADIANCE")?;
    write_header_field(writer, "FORMAT", FORMAT_RGBE)?;
    for (key, value) in frame.tags().iter() {
        if key == TAG_WHITE_Y || key == TAG_LUMINANCE {
            write_header_field(writer, key, value)?;
        } else if let Some(hdr_key) = key.strip_prefix(TAG_PREFIX_HDR) {
            if !hdr_key.eq_ignore_ascii_case("FORMAT") && !hdr_key.eq_ignore_ascii_case("EXPOSURE") {
                write_header_field(writer, hdr_key, value)?;
            }
        }
    }
    writeln!(writer)?;
    writeln!(writer, "-Y {} +X {}", frame.height(), frame.width())?;

    let adapter = ColorSpaceAdapter::new(WorkingSpace::Srgb)?;
    let n = frame.pixel_count();
    let (mut r, mut g, mut b) = (vec![0.0; n], vec![0.0; n], vec![0.0; n]);
    let (x, y, z) = frame.xyz();
    adapter.xyz_to_rgb(x, y, z, &mut r, &mut g, &mut b)?;
    write_pixels(writer, frame.width() as usize, frame.height() as usize, [&r, &g, &b])
}

fn read_header<R: BufRead>(reader: &mut R) -> IoResult<Header> {
    let mut tags = Tags::new();
    let mut line = String::new();

    reader.read_line(&mut line)?;
    if !trim_line(&line).starts_with(HDR_MAGIC) {
        return Err(IoError::InvalidFile("HDR magic not found".into()));
    }

    let mut resolution = None;
    let mut xyz = false;
    let mut exposure = 1.0f32;

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let line = trim_line(&line);
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with('+') || line.starts_with('-') {
            resolution = Some(
                parse_resolution(line)
                    .ok_or_else(|| IoError::InvalidFile(format!("invalid resolution line '{line}'")))?,
            );
            break;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());
        match key.to_uppercase().as_str() {
            "FORMAT" => {
                xyz = match value.to_lowercase().as_str() {
                    FORMAT_RGBE => false,
                    FORMAT_XYZE => true,
                    other => {
                        return Err(IoError::InvalidFile(format!("unknown HDR format '{other}'")));
                    }
                };
            }
            // Exposures accumulate multiplicatively
            "EXPOSURE" => match value.parse::<f32>() {
                Ok(v) if v.is_finite() && v > 0.0 => exposure *= v,
                _ => return Err(IoError::InvalidFile(format!("invalid EXPOSURE '{value}'"))),
            },
            upper if upper == TAG_WHITE_Y || upper == TAG_LUMINANCE => tags.set(upper, value),
            _ => tags.set(format!("{TAG_PREFIX_HDR}{key}"), value),
        }
    }

    let (width, height) =
        resolution.ok_or_else(|| IoError::InvalidFile("missing HDR resolution".into()))?;
    crate::sample_count(width, height, 4)?;
    if !tags.contains(TAG_LUMINANCE) {
        tags.set(TAG_LUMINANCE, "RELATIVE");
    }
    Ok(Header {
        width,
        height,
        xyz,
        exposure,
        tags,
    })
}

type Planes = (Vec<f32>, Vec<f32>, Vec<f32>);

fn read_pixels<R: Read>(reader: &mut R, width: usize, height: usize) -> IoResult<Planes> {
    let mut rgbe = vec![0u8; crate::sample_count(width, height, 4)?];
    let mut first = [0u8; 4];
    reader.read_exact(&mut first)?;

    let use_rle = (8..=0x7fff).contains(&width)
        && first[0] == 2
        && first[1] == 2
        && ((first[2] as usize) << 8 | first[3] as usize) == width;

    if use_rle {
        let mut header = first;
        for (row, scanline) in rgbe.chunks_exact_mut(width * 4).enumerate() {
            if row > 0 {
                reader.read_exact(&mut header)?;
            }
            decode_rle_scanline(reader, width, scanline, header)?;
        }
    } else {
        rgbe[0..4].copy_from_slice(&first);
        reader.read_exact(&mut rgbe[4..])?;
    }

    let n = width * height;
    let (mut a, mut b, mut c) = (Vec::with_capacity(n), Vec::with_capacity(n), Vec::with_capacity(n));
    for px in rgbe.chunks_exact(4) {
        let (r, g, bl) = rgbe_to_f32(px[0], px[1], px[2], px[3]);
        a.push(r);
        b.push(g);
        c.push(bl);
    }
    Ok((a, b, c))
}

fn decode_rle_scanline<R: Read>(
    reader: &mut R,
    width: usize,
    out: &mut [u8],
    header: [u8; 4],
) -> IoResult<()> {
    if header[0] != 2 || header[1] != 2 {
        return Err(IoError::InvalidFile("HDR RLE header invalid".into()));
    }
    let encoded_width = ((header[2] as usize) << 8) | (header[3] as usize);
    if encoded_width != width {
        return Err(IoError::InvalidFile("HDR RLE width mismatch".into()));
    }

    let mut channel = vec![0u8; width];
    for c in 0..4 {
        let mut idx = 0usize;
        while idx < width {
            let mut count = [0u8; 1];
            reader.read_exact(&mut count)?;
            let (run, repeat) = match count[0] as usize {
                n if n > 128 => (n - 128, true),
                n => (n, false),
            };
            if run == 0 || idx + run > width {
                return Err(IoError::InvalidFile("HDR RLE run overflows scanline".into()));
            }
            if repeat {
                let mut value = [0u8; 1];
                reader.read_exact(&mut value)?;
                channel[idx..idx + run].fill(value[0]);
            } else {
                reader.read_exact(&mut channel[idx..idx + run])?;
            }
            idx += run;
        }

        for (x, &v) in channel.iter().enumerate() {
            out[x * 4 + c] = v;
        }
    }

    Ok(())
}

fn write_pixels<W: Write>(
    writer: &mut W,
    width: usize,
    height: usize,
    planes: [&[f32]; 3],
) -> IoResult<()> {
    let use_rle = (8..=0x7fff).contains(&width);
    let [r, g, b] = planes;

    let mut scanline = vec![0u8; width * 4];
    for y in 0..height {
        for x in 0..width {
            let i = y * width + x;
            scanline[x * 4..x * 4 + 4].copy_from_slice(&f32_to_rgbe(r[i], g[i], b[i]));
        }

        if use_rle {
            let header = [2u8, 2u8, (width >> 8) as u8, (width & 0xFF) as u8];
            writer.write_all(&header)?;
            encode_rle_scanline(writer, width, &scanline)?;
        } else {
            writer.write_all(&scanline)?;
        }
    }

    Ok(())
}

fn encode_rle_scanline<W: Write>(writer: &mut W, width: usize, scanline: &[u8]) -> IoResult<()> {
    let mut channel = vec![0u8; width];
    for c in 0..4 {
        for (x, v) in channel.iter_mut().enumerate() {
            *v = scanline[x * 4 + c];
        }
        writer.write_all(&encode_rle_channel(&channel))?;
    }
    Ok(())
}

/// Length of the run of equal bytes starting at `i`, capped at 127.
fn run_length(data: &[u8], i: usize) -> usize {
    let mut run = 1usize;
    while i + run < data.len() && run < 127 && data[i] == data[i + run] {
        run += 1;
    }
    run
}

fn encode_rle_channel(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() * 2);
    let mut i = 0usize;
    while i < data.len() {
        let run = run_length(data, i);
        if run >= 4 {
            out.push((128 + run) as u8);
            out.push(data[i]);
            i += run;
            continue;
        }

        let start = i;
        let mut literal = 0usize;
        while i < data.len() && literal < 128 && run_length(data, i) < 4 {
            i += 1;
            literal += 1;
        }
        out.push(literal as u8);
        out.extend_from_slice(&data[start..start + literal]);
    }
    out
}

fn f32_to_rgbe(r: f32, g: f32, b: f32) -> [u8; 4] {
    let r = r.max(0.0);
    let g = g.max(0.0);
    let b = b.max(0.0);
    let max = r.max(g).max(b);
    if !(max >= 1.0e-32) || !max.is_finite() {
        return [0, 0, 0, 0];
    }

    let (m, e) = frexp(max);
    let scale = m * 256.0 / max;

    [
        (r * scale).clamp(0.0, 255.0) as u8,
        (g * scale).clamp(0.0, 255.0) as u8,
        (b * scale).clamp(0.0, 255.0) as u8,
        (e + 128).clamp(0, 255) as u8,
    ]
}

fn rgbe_to_f32(r: u8, g: u8, b: u8, e: u8) -> (f32, f32, f32) {
    if e == 0 {
        return (0.0, 0.0, 0.0);
    }
    let f = 2.0_f32.powi(e as i32 - 136);
    // Sample at the center of the mantissa bucket
    ((r as f32 + 0.5) * f, (g as f32 + 0.5) * f, (b as f32 + 0.5) * f)
}

/// Splits `x > 0` into `m * 2^e` with `m` in `[0.5, 1)`.
fn frexp(x: f32) -> (f32, i32) {
    let e = x.log2().floor() as i32 + 1;
    let m = x / 2.0_f32.powi(e);
    // log2 rounding can land one off near powers of two
    if m >= 1.0 {
        (m * 0.5, e + 1)
    } else if m < 0.5 {
        (m * 2.0, e - 1)
    } else {
        (m, e)
    }
}

fn parse_resolution(line: &str) -> Option<(usize, usize)> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let [a, va, b, vb] = parts.as_slice() else {
        return None;
    };
    // Only the standard top-to-bottom, left-to-right orientation
    let (width, height) = match (*a, *b) {
        ("-Y", "+X") => (vb.parse().ok()?, va.parse().ok()?),
        _ => return None,
    };
    (width > 0 && height > 0).then_some((width, height))
}

fn write_header_field<W: Write>(writer: &mut W, key: &str, value: &str) -> IoResult<()> {
    writeln!(writer, "{key}={value}")?;
    Ok(())
}

fn trim_line(line: &str) -> &str {
    line.trim_end_matches(&['\r', '\n'][..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Cursor;

    fn gray_frame(width: u32, height: u32) -> Frame {
        let lum = (0..width * height).map(|i| 0.01 * 1.3f32.powi(i as i32)).collect();
        Frame::from_luminance(width, height, lum, [0.9505, 1.0, 1.089]).unwrap()
    }

    #[test]
    fn parse_resolution_line() {
        assert_eq!(parse_resolution("-Y 2 +X 3"), Some((3, 2)));
        assert_eq!(parse_resolution("+X 4 -Y 5"), None);
        assert_eq!(parse_resolution("-Y 0 +X 5"), None);
    }

    #[test]
    fn rgbe_round_trip_precision() {
        for v in [1e-3f32, 0.5, 1.0, 3.7, 1234.5] {
            let e = f32_to_rgbe(v, v * 0.5, 0.0);
            let (r, g, b) = rgbe_to_f32(e[0], e[1], e[2], e[3]);
            assert_relative_eq!(r, v, max_relative = 0.01);
            assert_relative_eq!(g, v * 0.5, max_relative = 0.02);
            assert!(b < v * 0.01);
        }
        assert_eq!(f32_to_rgbe(0.0, -1.0, f32::NAN), [0, 0, 0, 0]);
    }

    #[test]
    fn rle_channel_round_trip() {
        let data: Vec<u8> = [vec![7u8; 40], (0..200).map(|i| (i * 3) as u8).collect(), vec![1u8; 3]].concat();
        let encoded = encode_rle_channel(&data);
        let width = data.len();
        let mut stream = Vec::new();
        for _ in 0..4 {
            stream.extend_from_slice(&encoded);
        }
        let header = [2, 2, (width >> 8) as u8, (width & 0xff) as u8];
        let mut out = vec![0u8; width * 4];
        decode_rle_scanline(&mut Cursor::new(stream), width, &mut out, header).unwrap();
        for (x, &v) in data.iter().enumerate() {
            assert_eq!(out[x * 4], v);
            assert_eq!(out[x * 4 + 3], v);
        }
    }

    #[test]
    fn hdr_round_trip_rle() {
        let mut frame = gray_frame(16, 3);
        frame.tags_mut().set(TAG_WHITE_Y, "42");
        frame.tags_mut().set("HDR:SOFTWARE", "datmo");

        let mut bytes = Vec::new();
        write_to(&mut bytes, &frame).unwrap();
        let back = read_from(&mut Cursor::new(bytes)).unwrap();

        assert_eq!((back.width(), back.height()), (16, 3));
        for (a, b) in frame.y().iter().zip(back.y()) {
            assert_relative_eq!(*a, *b, max_relative = 0.02);
        }
        assert_eq!(back.tags().get(TAG_WHITE_Y), Some("42"));
        assert_eq!(back.tags().get("HDR:SOFTWARE"), Some("datmo"));
        assert_eq!(back.tags().get(TAG_LUMINANCE), Some("RELATIVE"));
    }

    #[test]
    fn hdr_flat_scanlines_and_file() {
        // Width below 8 is written without RLE
        let frame = gray_frame(3, 2);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.hdr");
        write(&path, &frame).unwrap();
        let back = read(&path).unwrap();
        for (a, b) in frame.y().iter().zip(back.y()) {
            assert_relative_eq!(*a, *b, max_relative = 0.02);
        }
    }

    #[test]
    fn exposure_is_divided_out() {
        let mut bytes = b"#?RADIANCE\nFORMAT=32-bit_rle_xyze\nEXPOSURE=2\n\n-Y 1 +X 1\n".to_vec();
        bytes.extend_from_slice(&f32_to_rgbe(1.0, 4.0, 2.0));
        let frame = read_from(&mut Cursor::new(bytes)).unwrap();
        assert_relative_eq!(frame.y()[0], 2.0, max_relative = 0.01);
        assert_relative_eq!(frame.x()[0], 0.5, max_relative = 0.02);
    }

    #[test]
    fn rejects_bad_header() {
        let err = read_from(&mut Cursor::new(b"P6\n".to_vec())).unwrap_err();
        assert!(matches!(err, IoError::InvalidFile(_)));
        let err = read_from(&mut Cursor::new(b"#?RADIANCE\nFORMAT=32-bit_rle_rgbe\n\n".to_vec())).unwrap_err();
        assert!(matches!(err, IoError::InvalidFile(_)));
    }

    #[test]
    fn rejects_oversized_resolution() {
        for res in ["-Y 4294967296 +X 4294967296", "-Y 1 +X 70000"] {
            let bytes = format!("#?RADIANCE\nFORMAT=32-bit_rle_rgbe\n\n{res}\n").into_bytes();
            let err = read_from(&mut Cursor::new(bytes)).unwrap_err();
            assert!(matches!(err, IoError::InvalidFile(_)), "{res}: {err}");
        }
    }
}
