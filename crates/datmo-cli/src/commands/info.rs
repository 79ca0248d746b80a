//! Frame info command.
//!
//! Prints dimensions, tags and, with `--stats`, luminance statistics that
//! describe how much range the tone curve has to compress.

use crate::InfoArgs;
use anyhow::Result;
use datmo_core::Frame;
use datmo_io::Format;
use datmo_tmo::MIN_LUMINANCE;
use std::fs;

/// Luminance statistics of a frame.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LumStats {
    min: f32,
    max: f32,
    mean: f32,
    /// Geometric mean, floored at the smallest luminance the tone mapper sees.
    log_mean: f32,
    /// Dynamic range in decades between the floored min and max.
    decades: f32,
}

pub fn run(args: InfoArgs, verbose: u8) -> Result<()> {
    for path in &args.input {
        let file_size = fs::metadata(path)?.len();
        let format = Format::from_path(path)?;
        let frame = super::load_frame(path)?;

        println!("{}", path.display());
        println!("  Resolution: {}x{}", frame.width(), frame.height());
        println!("  Pixels:     {}", frame.pixel_count());
        println!("  File size:  {}", super::format_size(file_size));
        if verbose > 0 {
            println!("  Format:     {:?}", format);
        }

        if !frame.tags().is_empty() {
            println!("  Tags:");
            for (key, value) in frame.tags().iter() {
                println!("    {key} = {value}");
            }
        }

        if args.stats {
            let s = luminance_stats(&frame);
            println!("  Min Y:      {:.6}", s.min);
            println!("  Max Y:      {:.6}", s.max);
            println!("  Mean Y:     {:.6}", s.mean);
            println!("  Log mean Y: {:.6}", s.log_mean);
            println!("  Range:      {:.2} decades", s.decades);
        }

        if args.input.len() > 1 {
            println!();
        }
    }

    Ok(())
}

fn luminance_stats(frame: &Frame) -> LumStats {
    let y = frame.y();
    let n = y.len().max(1) as f64;
    let (mut min, mut max) = (f32::INFINITY, f32::NEG_INFINITY);
    let (mut sum, mut log_sum) = (0.0f64, 0.0f64);
    for &v in y {
        min = min.min(v);
        max = max.max(v);
        sum += v as f64;
        log_sum += (v.max(MIN_LUMINANCE) as f64).log10();
    }
    if y.is_empty() {
        min = 0.0;
        max = 0.0;
    }
    LumStats {
        min,
        max,
        mean: (sum / n) as f32,
        log_mean: 10f64.powf(log_sum / n) as f32,
        decades: (max.max(MIN_LUMINANCE) / min.max(MIN_LUMINANCE)).log10(),
    }
}
