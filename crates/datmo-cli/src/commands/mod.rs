//! CLI command implementations

pub mod displays;
pub mod info;
pub mod tonemap;

use anyhow::{Context, Result};
use datmo_color::WorkingSpace;
use datmo_core::Frame;
use std::path::Path;

/// Load frame from path
pub fn load_frame(path: &Path) -> Result<Frame> {
    datmo_io::read(path).with_context(|| format!("Failed to load: {}", path.display()))
}

/// Save frame to path, converting PNG output with `space`
pub fn save_frame(path: &Path, frame: &Frame, space: WorkingSpace) -> Result<()> {
    datmo_io::write_with_space(path, frame, space)
        .with_context(|| format!("Failed to save: {}", path.display()))
}

/// Format file size for display
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.00 MB");
    }
}
