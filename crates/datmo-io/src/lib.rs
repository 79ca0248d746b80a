//! # datmo-io
//!
//! Frame readers and writers for the datmo tone mapper.
//!
//! | Format | Read | Write | Notes |
//! |--------|------|-------|-------|
//! | Radiance HDR (`.hdr`, `.pic`) | yes | yes | RGBE/XYZE, RLE, header tags |
//! | PFM (`.pfm`) | yes | yes | RGB or gray, either byte order |
//! | PNG (`.png`) | no | yes | 8-bit, display-referred frames |
//!
//! All readers return XYZ frames with a `LUMINANCE` tag (`RELATIVE` unless
//! the file says otherwise).
//!
//! # Usage
//!
//! ```rust,no_run
//! use datmo_io::{read, write};
//!
//! let frame = read("memorial.hdr")?;
//! write("copy.pfm", &frame)?;
//! # Ok::<(), datmo_io::IoError>(())
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod error;
pub mod hdr;
pub mod pfm;
pub mod png;

use std::path::Path;

use datmo_color::WorkingSpace;
use datmo_core::Frame;

pub use error::{IoError, IoResult};

/// Prefix of tags that carry Radiance header fields.
pub const TAG_PREFIX_HDR: &str = "HDR:";

/// Largest width or height accepted from a file header.
pub const MAX_DIMENSION: usize = 1 << 16;

/// Number of values in a `width` x `height` image with `channels` values per
/// pixel. Rejects empty images and sizes beyond [`MAX_DIMENSION`].
pub(crate) fn sample_count(width: usize, height: usize, channels: usize) -> IoResult<usize> {
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(IoError::InvalidFile(format!(
            "unsupported image size {width}x{height}"
        )));
    }
    width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(channels))
        .ok_or_else(|| IoError::InvalidFile(format!("image size {width}x{height} is too large")))
}

/// File formats handled by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Radiance RGBE.
    Hdr,
    /// Portable float map.
    Pfm,
    /// 8-bit PNG (write only).
    Png,
}

impl Format {
    /// Detects the format from a file extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> IoResult<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "hdr" | "pic" | "rgbe" => Ok(Format::Hdr),
            "pfm" => Ok(Format::Pfm),
            "png" => Ok(Format::Png),
            _ => Err(IoError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Reads a frame, choosing the reader by extension.
pub fn read<P: AsRef<Path>>(path: P) -> IoResult<Frame> {
    let path = path.as_ref();
    match Format::from_path(path)? {
        Format::Hdr => hdr::read(path),
        Format::Pfm => pfm::read(path),
        Format::Png => Err(IoError::UnsupportedFormat(format!(
            "{}: PNG input is not supported, use HDR or PFM",
            path.display()
        ))),
    }
}

/// Writes a frame, choosing the writer by extension. PNG output assumes
/// sRGB primaries.
pub fn write<P: AsRef<Path>>(path: P, frame: &Frame) -> IoResult<()> {
    write_with_space(path, frame, WorkingSpace::Srgb)
}

/// Like [`write`], converting display-referred PNG output with `space`.
pub fn write_with_space<P: AsRef<Path>>(path: P, frame: &Frame, space: WorkingSpace) -> IoResult<()> {
    let path = path.as_ref();
    match Format::from_path(path)? {
        Format::Hdr => hdr::write(path, frame),
        Format::Pfm => pfm::write(path, frame),
        Format::Png => png::write(path, frame, space),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_count_limits() {
        assert_eq!(sample_count(4, 3, 3).unwrap(), 36);
        assert_eq!(sample_count(MAX_DIMENSION, 1, 4).unwrap(), MAX_DIMENSION * 4);
        for (w, h) in [(0, 3), (3, 0), (MAX_DIMENSION + 1, 1), (1, usize::MAX)] {
            assert!(matches!(sample_count(w, h, 3), Err(IoError::InvalidFile(_))));
        }
    }
}
