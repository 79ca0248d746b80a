//! Tonemap command
//!
//! Loads settings (YAML file, then flags), tone-maps the input frame and
//! writes the display-referred result. Optionally exports the tone curve.

use crate::TonemapArgs;
use anyhow::{Context, Result};
use datmo_core::{ProgressError, ProgressSink};
use datmo_tmo::TonemapConfig;
use std::fs::File;
use std::io::{BufWriter, Write};
use tracing::{debug, info, trace, warn};

/// Forwards pipeline progress to the log.
struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&mut self, percent: u8) -> Result<(), ProgressError> {
        debug!(percent, "progress");
        Ok(())
    }
}

pub fn run(args: TonemapArgs, verbose: u8) -> Result<()> {
    trace!(input = %args.input.display(), output = %args.output.display(), "tonemap::run");

    let config = build_config(&args)?;
    debug!(?config, "settings");

    let mut frame = super::load_frame(&args.input)?;
    info!(width = frame.width(), height = frame.height(), "loaded {}", args.input.display());

    if verbose > 0 {
        println!(
            "Tone mapping {} ({}x{}) for display '{}'",
            args.input.display(),
            frame.width(),
            frame.height(),
            config.display
        );
    }

    let report = datmo_tmo::tonemap(&mut frame, &config, &mut LogProgress)
        .with_context(|| format!("Failed to tone-map: {}", args.input.display()))?;

    if !report.converged {
        warn!(
            iterations = report.iterations,
            "tone curve did not converge, using the best curve found"
        );
    }

    super::save_frame(&args.output, &frame, config.working_space)?;

    if let Some(path) = &args.tone_curve {
        let file = File::create(path)
            .with_context(|| format!("Failed to create: {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        report
            .curve
            .write_csv(&mut writer, &report.display)
            .and_then(|_| writer.flush())
            .with_context(|| format!("Failed to write tone curve: {}", path.display()))?;
        info!("tone curve written to {}", path.display());
    }

    if verbose > 0 {
        println!("{}", report.display);
        println!("{}", report.display_size.describe());
        if let Some(w) = report.white_y {
            println!("Reference white: {w} cd/m^2");
        }
        println!(
            "Tone curve: {} points, {} iterations{}",
            report.curve.len(),
            report.iterations,
            if report.converged { "" } else { " (not converged)" }
        );
        println!("Done.");
    }

    Ok(())
}

/// Starts from the YAML file (or defaults) and applies command-line overrides.
fn build_config(args: &TonemapArgs) -> Result<TonemapConfig> {
    let mut config = match &args.config {
        Some(path) => TonemapConfig::load(path)
            .with_context(|| format!("Failed to load settings: {}", path.display()))?,
        None => TonemapConfig::default(),
    };

    if let Some(s) = args.saturation {
        config.saturation = s;
    }
    if let Some(e) = args.contrast {
        config.contrast_enhancement = e;
    }
    if let Some(w) = args.white_y {
        config.white_y = Some(w);
    }
    if args.no_white_y {
        config.use_white_y = false;
    }
    if let Some(d) = &args.display {
        config.display = d.clone();
    }
    if let Some(ds) = &args.display_size {
        config.display_size = ds.clone();
    }
    if let Some(ws) = &args.working_space {
        config.working_space = ws
            .parse()
            .with_context(|| format!("Invalid working space: {ws}"))?;
    }
    if let Some(n) = args.max_iterations {
        config.optimizer.max_iterations = n;
    }

    config.validate().context("Invalid tone mapping settings")?;
    Ok(config)
}
