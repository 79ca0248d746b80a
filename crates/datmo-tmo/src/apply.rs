//! Tone curve application.

use rayon::prelude::*;

use crate::curve::ToneCurve;
use crate::density::{log_luminance, MIN_LUMINANCE};
use crate::display::DisplayFunction;
use crate::{TmoError, TmoResult};

/// Maps linear RGB planes to display-referred pixel values in place.
///
/// Each pixel's luminance goes through `curve`; color is carried by the
/// channel-to-luminance ratio raised to `saturation`, then the result is
/// converted to a pixel value with the inverse of `display`. Saturation 0
/// yields gray, 1 keeps the original chroma ratios.
///
/// Nothing is written unless every luminance lies inside the curve domain.
pub fn apply_tone_curve(
    r: &mut [f32],
    g: &mut [f32],
    b: &mut [f32],
    lum: &[f32],
    curve: &ToneCurve,
    display: &DisplayFunction,
    saturation: f32,
) -> TmoResult<()> {
    let n = lum.len();
    if r.len() != n || g.len() != n || b.len() != n {
        return Err(TmoError::ToneCurveApplicationFailed(format!(
            "channel planes have {}/{}/{} samples for {n} luminance samples",
            r.len(),
            g.len(),
            b.len()
        )));
    }
    if !(0.0..=2.0).contains(&saturation) {
        return Err(TmoError::invalid_parameter(format!(
            "saturation must be within [0, 2], got {saturation}"
        )));
    }
    let Some((lo, hi)) = curve.domain() else {
        return Err(TmoError::ToneCurveApplicationFailed(
            "tone curve is empty".into(),
        ));
    };
    if let Some(i) = lum.par_iter().position_first(|&l| !curve.contains(log_luminance(l))) {
        return Err(TmoError::ToneCurveApplicationFailed(format!(
            "luminance {} at index {i} is outside the tone curve domain [{}, {}]",
            lum[i],
            10f32.powf(lo),
            10f32.powf(hi)
        )));
    }

    r.par_iter_mut()
        .zip(g.par_iter_mut())
        .zip(b.par_iter_mut())
        .zip(lum.par_iter())
        .for_each(|(((r, g), b), &l)| {
            let l_in = l.max(MIN_LUMINANCE);
            let l_out = 10f32.powf(curve.eval_clamped(log_luminance(l)));
            for c in [r, g, b] {
                let ratio = (*c).max(0.0) / l_in;
                *c = display.inv_display(ratio.powf(saturation) * l_out);
            }
        });
    Ok(())
}
