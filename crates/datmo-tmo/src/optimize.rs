//! Tone curve optimization.
//!
//! The curve is parametrized by its per-segment increments `d_k >= 0` in
//! log10 display luminance. A contrast `G` around a background bucket covers
//! the input interval of length `G` centered on that bucket (shifted to stay
//! inside the image range). It is shown with log contrast `sum(c_k d_k)`,
//! where `c_k` is the covered fraction of segment `k`, and should ideally be
//! shown with `e * G`, where `e` is the contrast enhancement factor. The
//! objective is the density-weighted squared difference of the visual
//! responses to the two contrasts, at the sensitivity of the luminance the
//! curve maps the sample to.
//!
//! Each iteration scales the gradient with a diagonal Gauss-Newton
//! majorizer, projects the resulting point onto the feasible set
//! `{d >= 0, sum(d) <= display range}` and backtracks towards the current
//! curve until the objective does not increase. The gradient includes the
//! shift of the sensitivity with the curve, so the step is a descent
//! direction. Monotonicity and the display range constraint hold for every
//! iterate, not only at convergence.

use std::ops::RangeInclusive;

use datmo_core::Progress;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::csf::{
    band_frequency, csf_daly_with_slope, response, response_deriv, response_sensitivity_deriv,
};
use crate::curve::ToneCurve;
use crate::density::ConditionalDensity;
use crate::display::{DisplayFunction, DisplaySize};
use crate::{TmoError, TmoResult};

/// Bisection steps used by the range projection.
const PROJECTION_STEPS: usize = 100;

/// Step halvings before the projected step is considered stationary.
const MAX_BACKTRACKS: usize = 30;

/// Tolerance (log10 units) when comparing the reference white against the
/// image range.
const WHITE_SLACK: f64 = 1e-6;

/// Solver settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerOptions {
    /// Iteration cap.
    pub max_iterations: usize,
    /// Stop once no curve point moves by more than this (log10 units).
    pub tolerance: f32,
}

impl Default for OptimizerOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-3,
        }
    }
}

impl OptimizerOptions {
    /// Rejects a zero iteration cap and non-positive tolerances.
    pub fn validate(&self) -> TmoResult<()> {
        if self.max_iterations == 0 {
            return Err(TmoError::invalid_parameter("max_iterations must be at least 1"));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(TmoError::invalid_parameter(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Result of [`compute_tone_curve`].
#[derive(Debug, Clone)]
pub struct ToneCurveSolution {
    /// Solved curve over the density grid.
    pub curve: ToneCurve,
    /// Iterations performed.
    pub iterations: usize,
    /// False if the iteration cap was hit; `curve` is then the best iterate.
    pub converged: bool,
    /// Objective value of the returned curve.
    pub objective: f64,
}

/// Grid point pinned to a fixed display luminance.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Anchor {
    /// Segments below this index are free; the rest are flat.
    index: usize,
    /// log10 display luminance at the anchor.
    y: f64,
}

/// One weighted contrast sample over segments `first..=last`.
///
/// Inner segments are fully covered; the end segments by `c_first` and
/// `c_last` (equal when `first == last`). Only free segments are included.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Term {
    first: usize,
    last: usize,
    c_first: f64,
    c_last: f64,
    weight: f64,
    target: f64,
    rho: f64,
}

impl Term {
    /// Sum of the coverage coefficients.
    fn coverage(&self) -> f64 {
        if self.first == self.last {
            self.c_first
        } else {
            self.c_first + self.c_last + (self.last - self.first - 1) as f64
        }
    }

    /// Displayed log contrast given prefix sums of the increments.
    fn shown(&self, d: &[f64], prefix: &[f64]) -> f64 {
        if self.first == self.last {
            self.c_first * d[self.first]
        } else {
            self.c_first * d[self.first]
                + (prefix[self.last] - prefix[self.first + 1])
                + self.c_last * d[self.last]
        }
    }
}

/// Computes the tone curve that best preserves the visible contrasts of
/// `density` on `display`.
///
/// `white_y` is the scene luminance that should map to the display peak.
/// `None` maps the image maximum there instead.
///
/// # Errors
///
/// [`TmoError::ToneCurveComputationFailed`] if the density is empty, the
/// display has no dynamic range, or `white_y` cannot be honored.
#[allow(clippy::too_many_arguments)]
pub fn compute_tone_curve(
    density: &ConditionalDensity,
    display: &DisplayFunction,
    size: &DisplaySize,
    contrast_factor: f32,
    white_y: Option<f32>,
    options: &OptimizerOptions,
    progress: &mut Progress<'_>,
    window: RangeInclusive<u8>,
) -> TmoResult<ToneCurveSolution> {
    if density.is_empty() {
        return Err(TmoError::curve_failed("contrast density is empty"));
    }
    if !(contrast_factor.is_finite() && contrast_factor > 0.0) {
        return Err(TmoError::curve_failed(format!(
            "contrast factor must be positive, got {contrast_factor}"
        )));
    }
    options.validate()?;

    let top = f64::from(display.max_luminance()).log10();
    let bottom = f64::from(display.min_luminance()).log10();
    if !(top.is_finite() && bottom.is_finite() && top > bottom) {
        return Err(TmoError::curve_failed(format!(
            "display has no usable dynamic range ({})",
            display.describe()
        )));
    }

    let segments = density.segment_count();
    let step = f64::from(density.step());
    let anchor = resolve_anchor(density, white_y, top, bottom)?;
    let budget = anchor.y - bottom;
    let problem = Problem::new(
        density,
        anchor,
        budget,
        f64::from(contrast_factor),
        f64::from(size.pix_per_deg()),
        f64::from(size.field_area_deg2()),
    );

    // Start from the linear-in-log curve over the populated segments
    let mut covered = vec![0.0f64; segments];
    for t in &problem.terms {
        covered[t.first..=t.last].fill(1.0);
    }
    let e = f64::from(contrast_factor);
    let init: Vec<f64> = covered.iter().map(|&c| c * e * step).collect();
    let mut d = project(&init, &covered, budget);
    let mut y = problem.curve_points(&d);
    let mut current = problem.evaluate(&d, &y);

    let mut iterations = 0;
    let mut converged = false;
    let tolerance = f64::from(options.tolerance);
    let (win_start, win_end) = (*window.start(), *window.end());

    for it in 1..=options.max_iterations {
        iterations = it;
        let target = current.projected_step(&d, budget);

        let mut accepted = None;
        let mut t = 1.0;
        for _ in 0..MAX_BACKTRACKS {
            let trial: Vec<f64> = d
                .iter()
                .zip(&target)
                .map(|(&a, &b)| a + t * (b - a))
                .collect();
            let trial_y = problem.curve_points(&trial);
            let eval = problem.evaluate(&trial, &trial_y);
            if eval.objective <= current.objective {
                accepted = Some((trial, trial_y, eval));
                break;
            }
            t *= 0.5;
        }
        let Some((d_next, y_next, next)) = accepted else {
            debug!(iteration = it, "no descent along the projected step, curve is stationary");
            converged = true;
            break;
        };

        let change = y
            .iter()
            .zip(&y_next)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        trace!(
            iteration = it,
            objective = next.objective,
            change,
            step = t,
            "tone curve iteration"
        );

        d = d_next;
        y = y_next;
        current = next;
        progress.report_within(
            win_start,
            win_end,
            it as f32 / options.max_iterations as f32,
        );
        if change < tolerance {
            converged = true;
            break;
        }
    }

    let objective = current.objective;
    if converged {
        progress.report(win_end);
    } else {
        // The objective never increases, so the last iterate is the best one
        warn!(
            iterations,
            objective, "tone curve did not converge, using the best curve found"
        );
    }

    let x = density.grid();
    let y: Vec<f32> = y.iter().map(|&v| v.clamp(bottom, top) as f32).collect();
    let curve = ToneCurve::from_points(x, y)?;
    debug!(iterations, converged, objective, "tone curve ready");
    Ok(ToneCurveSolution {
        curve,
        iterations,
        converged,
        objective,
    })
}

/// Contrast terms of one solve and the anchor they are solved under.
#[derive(Debug, Clone)]
struct Problem {
    terms: Vec<Term>,
    anchor: Anchor,
    area: f64,
    segments: usize,
    x_count: usize,
}

impl Problem {
    fn new(
        density: &ConditionalDensity,
        anchor: Anchor,
        budget: f64,
        contrast_factor: f64,
        pix_per_deg: f64,
        area: f64,
    ) -> Self {
        let segments = density.segment_count();
        let step = f64::from(density.step());
        let terms: Vec<Term> = density
            .entries()
            .filter_map(|en| {
                let g = f64::from(en.contrast());
                let (first, last, c_first, c_last) =
                    covered_segments(en.bucket as f64, g / step, segments, anchor.index)?;
                Some(Term {
                    first,
                    last,
                    c_first,
                    c_last,
                    weight: en.weight,
                    target: contrast_factor * g,
                    rho: band_frequency(en.band, pix_per_deg),
                })
            })
            .collect();
        debug!(
            anchor = anchor.index,
            anchor_y = anchor.y,
            budget,
            segments,
            terms = terms.len(),
            "optimizing tone curve"
        );
        Self {
            terms,
            anchor,
            area,
            segments,
            x_count: density.x_count(),
        }
    }

    fn curve_points(&self, d: &[f64]) -> Vec<f64> {
        curve_points(d, self.anchor, self.x_count)
    }

    /// Objective, gradient and diagonal Hessian majorizer at `d`, whose
    /// curve points are `y`.
    fn evaluate(&self, d: &[f64], y: &[f64]) -> Evaluation {
        let segments = self.segments;
        let free = self.anchor.index.min(segments);
        let mut prefix = Vec::with_capacity(segments + 1);
        prefix.push(0.0);
        let mut acc = 0.0;
        for &dk in d {
            acc += dk;
            prefix.push(acc);
        }

        // Difference arrays carry the fully covered inner segments; the two
        // end segments are added directly
        let mut grad_diff = vec![0.0f64; segments + 1];
        let mut hess_diff = vec![0.0f64; segments + 1];
        let mut grad_end = vec![0.0f64; segments];
        let mut hess_end = vec![0.0f64; segments];
        // Sensitivity terms reach every free segment above the sample's ends
        let mut adapt = vec![0.0f64; segments + 1];
        let mut objective = 0.0;
        for t in &self.terms {
            let shown = t.shown(d, &prefix);
            let l_adapt = 10f64.powf(0.5 * (y[t.first] + y[t.last + 1]));
            let (s, ds) = csf_daly_with_slope(t.rho, l_adapt, self.area);
            let resid = response(shown, s) - response(t.target, s);
            let slope = response_deriv(shown, s);
            objective += t.weight * resid * resid;

            let q = 2.0
                * t.weight
                * resid
                * (response_sensitivity_deriv(shown, s) - response_sensitivity_deriv(t.target, s))
                * ds;
            adapt[t.first] -= 0.5 * q;
            adapt[t.last + 1] -= 0.5 * q;

            let g = 2.0 * t.weight * resid * slope;
            let h = 2.0 * t.weight * slope * slope * t.coverage();
            grad_end[t.first] += g * t.c_first;
            hess_end[t.first] += h * t.c_first;
            if t.first == t.last {
                continue;
            }
            grad_end[t.last] += g * t.c_last;
            hess_end[t.last] += h * t.c_last;
            if t.last > t.first + 1 {
                grad_diff[t.first + 1] += g;
                grad_diff[t.last] -= g;
                hess_diff[t.first + 1] += h;
                hess_diff[t.last] -= h;
            }
        }

        let mut grad = Vec::with_capacity(segments);
        let mut hess = Vec::with_capacity(segments);
        let (mut g, mut h, mut a) = (0.0, 0.0, 0.0);
        for k in 0..segments {
            g += grad_diff[k];
            h += hess_diff[k];
            let sens = if k < free {
                a += adapt[k];
                a
            } else {
                0.0
            };
            grad.push(g + grad_end[k] + sens);
            // Cancellation in the running sum can leave tiny negatives
            let hk = h + hess_end[k];
            hess.push(if hk > 1e-300 { hk } else { 0.0 });
        }
        Evaluation {
            objective,
            grad,
            hess,
        }
    }
}

/// Objective value and local model at one iterate.
#[derive(Debug, Clone)]
struct Evaluation {
    objective: f64,
    grad: Vec<f64>,
    hess: Vec<f64>,
}

impl Evaluation {
    /// Scaled gradient step from `d`, projected onto the feasible set.
    fn projected_step(&self, d: &[f64], budget: f64) -> Vec<f64> {
        let z: Vec<f64> = d
            .iter()
            .zip(self.grad.iter().zip(&self.hess))
            .map(|(&dk, (&g, &h))| if h > 0.0 { dk - g / h } else { 0.0 })
            .collect();
        project(&z, &self.hess, budget)
    }
}

/// Segments covered by an interval of `len` segments centered on grid
/// position `center`, shifted to stay inside `[0, segments]` and cut at
/// `free`. Returns `(first, last, c_first, c_last)`.
fn covered_segments(
    center: f64,
    len: f64,
    segments: usize,
    free: usize,
) -> Option<(usize, usize, f64, f64)> {
    if segments == 0 || free == 0 || !(len > 0.0) {
        return None;
    }
    let len = len.min(segments as f64);
    let lo = (center - 0.5 * len).clamp(0.0, segments as f64 - len);
    let hi = lo + len;
    let cover = |k: usize| (hi.min(k as f64 + 1.0) - lo.max(k as f64)).max(0.0);

    let first = (lo.floor() as usize).min(segments - 1);
    if first >= free {
        return None;
    }
    let last = (hi.ceil() as usize)
        .saturating_sub(1)
        .clamp(first, segments - 1)
        .min(free - 1);
    let (c_first, c_last) = (cover(first), cover(last));
    if c_first <= 0.0 {
        return None;
    }
    Some((first, last, c_first, c_last))
}

/// Finds the grid point that maps to a fixed display luminance.
fn resolve_anchor(
    density: &ConditionalDensity,
    white_y: Option<f32>,
    top: f64,
    bottom: f64,
) -> TmoResult<Anchor> {
    let segments = density.segment_count();
    let Some(white) = white_y else {
        return Ok(Anchor {
            index: segments,
            y: top,
        });
    };
    if !(white.is_finite() && white > 0.0) {
        return Err(TmoError::curve_failed(format!(
            "reference white must be positive, got {white}"
        )));
    }

    let lw = f64::from(white).log10();
    let l_min = f64::from(density.l_min());
    let l_max = f64::from(density.l_max());
    if lw < l_min - WHITE_SLACK {
        return Err(TmoError::curve_failed(format!(
            "reference white {white} is darker than every pixel of the image"
        )));
    }
    if lw >= l_max {
        // White above the image: the brightest pixel lands below the peak
        let gap = lw - l_max;
        if gap >= top - bottom {
            return Err(TmoError::curve_failed(format!(
                "reference white {white} lies {gap:.2} log10 units above the image maximum, \
                 more than the display range of {:.2}",
                top - bottom
            )));
        }
        return Ok(Anchor {
            index: segments,
            y: top - gap,
        });
    }

    // Grid point at or just below the white
    let step = f64::from(density.step());
    let index = if step > 0.0 {
        let pos = (lw - l_min) / step;
        ((pos + WHITE_SLACK).floor().max(0.0) as usize).min(segments)
    } else {
        0
    };
    Ok(Anchor { index, y: top })
}

/// Display log-luminance at every grid point for increments `d`.
fn curve_points(d: &[f64], anchor: Anchor, x_count: usize) -> Vec<f64> {
    let mut y = vec![anchor.y; x_count];
    for k in (0..anchor.index).rev() {
        y[k] = y[k + 1] - d[k];
    }
    y
}

/// Weighted projection of `z` onto `{d >= 0, sum(d) <= budget}`.
///
/// Minimizes `sum(h_k (d_k - z_k)^2)`; entries with `h_k == 0` are fixed at 0.
fn project(z: &[f64], h: &[f64], budget: f64) -> Vec<f64> {
    let clip = |lambda: f64| -> Vec<f64> {
        z.iter()
            .zip(h)
            .map(|(&z, &h)| if h > 0.0 { (z - lambda / h).max(0.0) } else { 0.0 })
            .collect()
    };
    let d = clip(0.0);
    if d.iter().sum::<f64>() <= budget {
        return d;
    }

    let mut lo = 0.0;
    let mut hi = z
        .iter()
        .zip(h)
        .filter(|&(_, &h)| h > 0.0)
        .map(|(&z, &h)| z * h)
        .fold(0.0, f64::max);
    for _ in 0..PROJECTION_STEPS {
        let mid = 0.5 * (lo + hi);
        if clip(mid).iter().sum::<f64>() > budget {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    clip(hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use datmo_core::NoProgress;

    fn density(lum: &[f32], w: usize, h: usize) -> ConditionalDensity {
        let mut sink = NoProgress;
        let mut progress = Progress::new(&mut sink);
        ConditionalDensity::estimate(lum, w, h, &mut progress, 0..=40).unwrap()
    }

    fn solve(d: &ConditionalDensity, contrast: f32, white: Option<f32>) -> TmoResult<ToneCurveSolution> {
        let mut sink = NoProgress;
        let mut progress = Progress::new(&mut sink);
        compute_tone_curve(
            d,
            &DisplayFunction::default(),
            &DisplaySize::default(),
            contrast,
            white,
            &OptimizerOptions::default(),
            &mut progress,
            40..=85,
        )
    }

    /// Horizontal ramp spanning `decades` orders of magnitude.
    fn ramp(w: usize, h: usize, decades: f32) -> Vec<f32> {
        (0..w * h)
            .map(|i| 10f32.powf(decades * (i % w) as f32 / (w - 1) as f32 - 2.0))
            .collect()
    }

    /// Ramp with a 2:1 checkerboard on top, so every level carries detail.
    fn textured(w: usize, h: usize, decades: f32) -> Vec<f32> {
        ramp(w, h, decades)
            .into_iter()
            .enumerate()
            .map(|(i, v)| if (i % w + i / w) % 2 == 0 { v } else { 2.0 * v })
            .collect()
    }

    /// Deterministic value in `[0, 1)` for pixel `i`.
    fn hash01(i: usize) -> f32 {
        let mut x = (i as u64)
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add(0x632B_E59B_D9B4_E019);
        x ^= x >> 33;
        x = x.wrapping_mul(0xFF51_AFD7_ED55_8CCD);
        x ^= x >> 33;
        (x >> 40) as f32 / (1u64 << 24) as f32
    }

    /// Ramp with multiplicative noise of `amp` log10 units.
    fn noisy(w: usize, h: usize, decades: f32, amp: f32) -> Vec<f32> {
        (0..w * h)
            .map(|i| {
                let base = decades * (i % w) as f32 / (w - 1) as f32 - 2.0;
                10f32.powf(base + amp * (hash01(i) - 0.5))
            })
            .collect()
    }

    fn problem(d: &ConditionalDensity, white: Option<f32>) -> Problem {
        let display = DisplayFunction::default();
        let size = DisplaySize::default();
        let top = f64::from(display.max_luminance()).log10();
        let bottom = f64::from(display.min_luminance()).log10();
        let anchor = resolve_anchor(d, white, top, bottom).unwrap();
        Problem::new(
            d,
            anchor,
            anchor.y - bottom,
            1.0,
            f64::from(size.pix_per_deg()),
            f64::from(size.field_area_deg2()),
        )
    }

    #[test]
    fn test_project_respects_budget() {
        let z = [1.0, 2.0, 3.0, -1.0];
        let h = [1.0, 1.0, 1.0, 1.0];
        let d = project(&z, &h, 3.0);
        assert!(d.iter().all(|&v| v >= 0.0));
        assert_relative_eq!(d.iter().sum::<f64>(), 3.0, epsilon = 1e-9);
        // Equal weights shift every active entry by the same amount
        assert_relative_eq!(d[2] - d[1], 1.0, epsilon = 1e-9);
        assert_eq!(d[3], 0.0);

        let inside = project(&[0.5, 0.5], &[1.0, 0.0], 3.0);
        assert_eq!(inside, vec![0.5, 0.0]);
    }

    #[test]
    fn test_covered_segments() {
        // Half a segment around grid point 3
        assert_eq!(covered_segments(3.0, 0.5, 10, 10), Some((2, 3, 0.25, 0.25)));
        // Inside one segment
        assert_eq!(covered_segments(3.5, 0.5, 10, 10), Some((3, 3, 0.5, 0.5)));
        // Shifted away from the bottom edge
        assert_eq!(covered_segments(0.0, 2.0, 10, 10), Some((0, 1, 1.0, 1.0)));
        // Longer than the whole range
        assert_eq!(covered_segments(5.0, 40.0, 4, 4), Some((0, 3, 1.0, 1.0)));
        // Cut at the anchor
        assert_eq!(covered_segments(4.0, 4.0, 10, 3), Some((2, 2, 1.0, 1.0)));
        assert_eq!(covered_segments(8.0, 1.0, 10, 3), None);
        assert_eq!(covered_segments(1.0, 1.0, 0, 0), None);
    }

    #[test]
    fn test_curve_points_anchor() {
        let anchor = Anchor { index: 2, y: 2.0 };
        let y = curve_points(&[0.5, 0.25, 0.0], anchor, 4);
        assert_eq!(y, vec![1.25, 1.75, 2.0, 2.0]);
    }

    #[test]
    fn test_gradient_matches_objective() {
        let d = density(&noisy(32, 32, 8.0, 0.3), 32, 32);
        let problem = problem(&d, None);
        let inc: Vec<f64> = (0..d.segment_count())
            .map(|k| 0.03 + 0.01 * (k % 3) as f64)
            .collect();
        let eval = problem.evaluate(&inc, &problem.curve_points(&inc));
        let objective_at = |v: &[f64]| problem.evaluate(v, &problem.curve_points(v)).objective;

        let h = 1e-6;
        for k in [0, 10, d.segment_count() / 2, d.segment_count() - 1] {
            let mut up = inc.clone();
            up[k] += h;
            let mut down = inc.clone();
            down[k] -= h;
            let numeric = (objective_at(&up) - objective_at(&down)) / (2.0 * h);
            assert_relative_eq!(eval.grad[k], numeric, epsilon = 1e-7, max_relative = 1e-4);
        }
    }

    #[test]
    fn test_noisy_scenes_converge() {
        let d = density(&noisy(128, 128, 6.0, 0.3), 128, 128);
        let sol = solve(&d, 1.0, None).unwrap();
        assert!(sol.converged, "6 decades: {} iterations", sol.iterations);

        let d = density(&noisy(128, 128, 8.0, 0.3), 128, 128);
        for contrast in [0.5, 1.0, 2.0] {
            let sol = solve(&d, contrast, None).unwrap();
            assert!(sol.converged, "8 decades, e = {contrast}: {} iterations", sol.iterations);
            assert!(sol.curve.y().windows(2).all(|w| w[1] >= w[0]));
        }
    }

    #[test]
    fn test_objective_matches_returned_curve() {
        let d = density(&textured(64, 32, 6.0), 64, 32);
        let sol = solve(&d, 1.0, None).unwrap();
        assert!(sol.converged);

        let problem = problem(&d, None);
        let y = sol.curve.y();
        let inc: Vec<f64> = y.windows(2).map(|w| f64::from(w[1] - w[0])).collect();
        let objective = problem.evaluate(&inc, &problem.curve_points(&inc)).objective;
        assert_relative_eq!(sol.objective, objective, max_relative = 1e-4);
    }

    #[test]
    fn test_curve_is_monotonic_and_in_range() {
        let lum = textured(64, 32, 6.0);
        let d = density(&lum, 64, 32);
        let sol = solve(&d, 1.0, None).unwrap();
        let display = DisplayFunction::default();
        let (lo, hi) = (
            display.min_luminance().log10(),
            display.max_luminance().log10(),
        );
        let y = sol.curve.y();
        assert!(y.windows(2).all(|w| w[1] >= w[0]));
        assert!(y.iter().all(|&v| v >= lo - 1e-5 && v <= hi + 1e-5));
        assert_relative_eq!(*y.last().unwrap(), hi, epsilon = 1e-5);
        assert_eq!(sol.curve.x(), d.grid().as_slice());
        assert!(sol.objective.is_finite());
    }

    #[test]
    fn test_narrow_range_is_not_compressed() {
        // One decade fits on the display without compression
        let lum = textured(32, 32, 1.0);
        let d = density(&lum, 32, 32);
        let sol = solve(&d, 1.0, None).unwrap();
        let (y0, y1) = sol.curve.range().unwrap();
        assert!(y1 - y0 > 0.5, "displayed range {}", y1 - y0);
    }

    #[test]
    fn test_constant_density_converges_immediately() {
        let d = density(&[5.0; 16], 4, 4);
        let sol = solve(&d, 1.0, None).unwrap();
        assert!(sol.converged);
        assert_eq!(sol.iterations, 1);
        assert_eq!(sol.curve.len(), 1);
    }

    #[test]
    fn test_empty_density_fails() {
        let err = solve(&ConditionalDensity::default(), 1.0, None).unwrap_err();
        assert!(matches!(err, TmoError::ToneCurveComputationFailed(_)));
    }

    #[test]
    fn test_white_inside_range_saturates_above() {
        let lum = textured(64, 16, 4.0);
        let d = density(&lum, 64, 16);
        let white = d.grid_point(20);
        let sol = solve(&d, 1.0, Some(10f32.powf(white))).unwrap();
        let top = DisplayFunction::default().max_luminance().log10();
        let curve = &sol.curve;
        assert_relative_eq!(curve.eval(white).unwrap(), top, epsilon = 1e-5);
        assert_relative_eq!(curve.eval(1.5).unwrap(), top, epsilon = 1e-5);
        assert!(curve.eval(-1.5).unwrap() < top);
    }

    #[test]
    fn test_white_between_grid_points_maps_to_peak() {
        let lum = textured(64, 16, 4.0);
        let d = density(&lum, 64, 16);
        // Closer to grid point 21 than to 20
        let white = d.grid_point(20) + 0.6 * d.step();
        let sol = solve(&d, 1.0, Some(10f32.powf(white))).unwrap();
        let top = DisplayFunction::default().max_luminance().log10();
        assert_relative_eq!(sol.curve.eval(white).unwrap(), top, epsilon = 1e-5);
        assert!(sol.curve.eval(d.grid_point(10)).unwrap() < top);
    }

    #[test]
    fn test_white_outside_range() {
        let lum = ramp(64, 16, 2.0);
        let d = density(&lum, 64, 16);
        // Darker than every pixel
        let err = solve(&d, 1.0, Some(1e-3)).unwrap_err();
        assert!(matches!(err, TmoError::ToneCurveComputationFailed(_)));
        // Far above the image: the gap exceeds the display range
        let err = solve(&d, 1.0, Some(1e6)).unwrap_err();
        assert!(matches!(err, TmoError::ToneCurveComputationFailed(_)));
        // Slightly above: the image maximum lands below the display peak
        let sol = solve(&d, 1.0, Some(10.0)).unwrap();
        let top = DisplayFunction::default().max_luminance().log10();
        let (_, y1) = sol.curve.range().unwrap();
        assert_relative_eq!(y1, top - 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_rejects_bad_options() {
        let d = density(&ramp(8, 8, 2.0), 8, 8);
        let mut sink = NoProgress;
        let mut progress = Progress::new(&mut sink);
        let options = OptimizerOptions {
            max_iterations: 0,
            ..Default::default()
        };
        let err = compute_tone_curve(
            &d,
            &DisplayFunction::default(),
            &DisplaySize::default(),
            1.0,
            None,
            &options,
            &mut progress,
            40..=85,
        )
        .unwrap_err();
        assert!(matches!(err, TmoError::InvalidParameter(_)));
    }

    #[test]
    fn test_iteration_cap_returns_best() {
        let d = density(&textured(64, 16, 5.0), 64, 16);
        let mut sink = NoProgress;
        let mut progress = Progress::new(&mut sink);
        let options = OptimizerOptions {
            max_iterations: 1,
            tolerance: 1e-12,
        };
        let sol = compute_tone_curve(
            &d,
            &DisplayFunction::default(),
            &DisplaySize::default(),
            1.0,
            None,
            &options,
            &mut progress,
            40..=85,
        )
        .unwrap();
        assert_eq!(sol.iterations, 1);
        assert!(!sol.converged);
        assert!(sol.curve.y().windows(2).all(|w| w[1] >= w[0]));
    }
}
