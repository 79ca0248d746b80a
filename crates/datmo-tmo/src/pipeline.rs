//! End-to-end tone mapping of one frame.
//!
//! Stages run in order and each one must succeed before the next starts:
//!
//! ```text
//! XYZ -> RGB -> density(Y) -> optimizer -> apply(curve, RGB, Y) -> XYZ -> tags
//! ```
//!
//! The frame is only written once the tone curve has been applied to the
//! working copy, so a failure at any stage leaves it untouched.
//!
//! Progress windows: density 0-40%, optimizer 40-85%, write-back 95%,
//! then 100% on success.

use std::ops::RangeInclusive;

use datmo_color::ColorSpaceAdapter;
use datmo_core::{Frame, Progress, ProgressSink, Tags, TAG_LUMINANCE, TAG_WHITE_Y};
use tracing::{debug, info, warn};

use crate::apply::apply_tone_curve;
use crate::config::{validate_factors, TonemapConfig};
use crate::curve::ToneCurve;
use crate::density::ConditionalDensity;
use crate::display::{DisplayFunction, DisplaySize};
use crate::optimize::compute_tone_curve;
use crate::{TmoError, TmoResult};

const DENSITY_WINDOW: RangeInclusive<u8> = 0..=40;
const OPTIMIZE_WINDOW: RangeInclusive<u8> = 40..=85;
const WRITE_BACK: u8 = 95;

/// `LUMINANCE` tag value of display-referred frames.
pub const LUMINANCE_DISPLAY: &str = "DISPLAY";

/// Outcome of a successful [`tonemap`] call.
#[derive(Debug, Clone)]
pub struct TonemapReport {
    /// Curve that was applied.
    pub curve: ToneCurve,
    /// Optimizer iterations.
    pub iterations: usize,
    /// False if the optimizer stopped at its iteration cap.
    pub converged: bool,
    /// Final optimizer objective.
    pub objective: f64,
    /// Reference white that constrained the curve, if any.
    pub white_y: Option<f32>,
    /// Display the curve was fitted to.
    pub display: DisplayFunction,
    /// Viewing geometry used for the contrast sensitivity.
    pub display_size: DisplaySize,
}

/// Tone-maps `frame` in place with `config`.
///
/// On success the frame holds display-referred values (pixel values in
/// `[0, 1]` converted back to XYZ) and its `LUMINANCE` tag is `DISPLAY`.
///
/// # Errors
///
/// - [`TmoError::InvalidParameter`] for out-of-range factors, before any work
/// - [`TmoError::UnknownDisplayType`] for an unknown display
/// - [`TmoError::InvalidImageData`] for negative or non-finite luminance
/// - [`TmoError::DensityEstimationFailed`],
///   [`TmoError::ToneCurveComputationFailed`],
///   [`TmoError::ToneCurveApplicationFailed`] from the stages
pub fn tonemap(
    frame: &mut Frame,
    config: &TonemapConfig,
    sink: &mut dyn ProgressSink,
) -> TmoResult<TonemapReport> {
    validate_factors(config.saturation, config.contrast_enhancement)?;
    config.optimizer.validate()?;

    info!(
        saturation = config.saturation,
        contrast = config.contrast_enhancement,
        use_white_y = config.use_white_y,
        "display adaptive tone mapping"
    );

    let white_y = resolve_white(config, frame.tags())?;
    match white_y {
        Some(w) => info!("Luminance factor of the reference white: {w}"),
        None => info!("Luminance factor of the reference white: not specified"),
    }

    if frame.tags().get(TAG_LUMINANCE) == Some(LUMINANCE_DISPLAY) {
        warn!("input frame is display-referred; tone mapping expects linear luminance");
    }

    let display = config.display_function()?;
    let display_size = config.display_geometry()?;
    let (display_desc, size_desc) = (display.describe(), display_size.describe());
    debug!("{display_desc}");
    debug!("{size_desc}");

    let mut progress = Progress::new(sink);
    progress.report(0);

    let adapter = ColorSpaceAdapter::new(config.working_space)?;
    let (width, height) = (frame.width() as usize, frame.height() as usize);
    let n = frame.pixel_count();
    let mut r = vec![0.0f32; n];
    let mut g = vec![0.0f32; n];
    let mut b = vec![0.0f32; n];
    let (x, y, z) = frame.xyz();
    adapter.xyz_to_rgb(x, y, z, &mut r, &mut g, &mut b)?;

    let density =
        ConditionalDensity::estimate(frame.y(), width, height, &mut progress, DENSITY_WINDOW)?;

    let solution = compute_tone_curve(
        &density,
        &display,
        &display_size,
        config.contrast_enhancement,
        white_y,
        &config.optimizer,
        &mut progress,
        OPTIMIZE_WINDOW,
    )?;

    apply_tone_curve(
        &mut r,
        &mut g,
        &mut b,
        frame.y(),
        &solution.curve,
        &display,
        config.saturation,
    )?;
    progress.report(WRITE_BACK);

    let (x, y, z) = frame.xyz_mut();
    adapter.rgb_to_xyz(&r, &g, &b, x, y, z)?;
    frame.tags_mut().set(TAG_LUMINANCE, LUMINANCE_DISPLAY);
    progress.finish();

    info!(
        iterations = solution.iterations,
        converged = solution.converged,
        points = solution.curve.len(),
        "tone mapping done"
    );

    Ok(TonemapReport {
        curve: solution.curve,
        iterations: solution.iterations,
        converged: solution.converged,
        objective: solution.objective,
        white_y,
        display,
        display_size,
    })
}

/// Tone-maps `frame` with the default display and geometry.
///
/// `white_y` is only honored when `use_white_y` is set; otherwise the
/// frame's `WHITE_Y` tag is consulted.
pub fn tonemap_frame(
    frame: &mut Frame,
    saturation: f32,
    contrast_enhancement: f32,
    white_y: Option<f32>,
    use_white_y: bool,
    sink: &mut dyn ProgressSink,
) -> TmoResult<TonemapReport> {
    let config = TonemapConfig {
        saturation,
        contrast_enhancement,
        white_y,
        use_white_y,
        ..TonemapConfig::default()
    };
    tonemap(frame, &config, sink)
}

/// Picks the reference white: explicit value if honored, else the
/// `WHITE_Y` tag, else none.
fn resolve_white(config: &TonemapConfig, tags: &Tags) -> TmoResult<Option<f32>> {
    let explicit = if config.use_white_y { config.white_y } else { None };
    match explicit {
        Some(w) if !w.is_finite() || w < 0.0 => {
            return Err(TmoError::invalid_parameter(format!(
                "white luminance must be non-negative, got {w}"
            )));
        }
        Some(w) if w > 0.0 => return Ok(Some(w)),
        Some(_) => warn!("white luminance of 0 treated as not specified"),
        None => {}
    }

    let Some(raw) = tags.get(TAG_WHITE_Y) else {
        return Ok(None);
    };
    match raw.trim().parse::<f32>() {
        Ok(w) if w.is_finite() && w > 0.0 => Ok(Some(w)),
        _ => {
            warn!(value = raw, "wrong {TAG_WHITE_Y} in the input frame, ignoring it");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(white: &str) -> Tags {
        let mut t = Tags::new();
        t.set(TAG_WHITE_Y, white);
        t
    }

    #[test]
    fn test_resolve_white_explicit() {
        let cfg = TonemapConfig {
            white_y: Some(80.0),
            ..Default::default()
        };
        assert_eq!(resolve_white(&cfg, &tags("5")).unwrap(), Some(80.0));

        let cfg = TonemapConfig {
            white_y: Some(-3.0),
            ..Default::default()
        };
        assert!(matches!(
            resolve_white(&cfg, &Tags::new()),
            Err(TmoError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_resolve_white_flag_off_reads_tag() {
        let cfg = TonemapConfig {
            white_y: Some(80.0),
            use_white_y: false,
            ..Default::default()
        };
        assert_eq!(resolve_white(&cfg, &tags("12.5")).unwrap(), Some(12.5));
        assert_eq!(resolve_white(&cfg, &Tags::new()).unwrap(), None);
    }

    #[test]
    fn test_resolve_white_bad_tag() {
        let cfg = TonemapConfig::default();
        assert_eq!(resolve_white(&cfg, &tags("bright")).unwrap(), None);
        assert_eq!(resolve_white(&cfg, &tags("0")).unwrap(), None);
        assert_eq!(resolve_white(&cfg, &tags("-4")).unwrap(), None);
    }

    #[test]
    fn test_zero_white_falls_back_to_tag() {
        let cfg = TonemapConfig {
            white_y: Some(0.0),
            ..Default::default()
        };
        assert_eq!(resolve_white(&cfg, &tags("3")).unwrap(), Some(3.0));
    }
}
