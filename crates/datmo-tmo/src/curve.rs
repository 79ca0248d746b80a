//! Tone curve: scene log-luminance to display log-luminance.
//!
//! Control points are stored as two parallel arrays. Inputs are strictly
//! increasing log10 scene luminance, outputs are non-decreasing log10 display
//! luminance (cd/m^2). Between control points the curve is linear in the log
//! domain.

use std::io::{self, Write};

use crate::display::DisplayFunction;
use crate::{TmoError, TmoResult};

/// Slack (log10 units) allowed when testing whether a value lies inside the
/// curve domain.
pub const DOMAIN_TOLERANCE: f32 = 1e-3;

/// Monotonic piecewise-linear tone curve.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToneCurve {
    x: Vec<f32>,
    y: Vec<f32>,
}

impl ToneCurve {
    /// Creates an empty curve.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a curve from control points.
    ///
    /// # Errors
    ///
    /// [`TmoError::ToneCurveComputationFailed`] if the arrays differ in length,
    /// are empty, hold non-finite values, `x` is not strictly increasing, or
    /// `y` decreases anywhere.
    pub fn from_points(x: Vec<f32>, y: Vec<f32>) -> TmoResult<Self> {
        if x.len() != y.len() {
            return Err(TmoError::curve_failed(format!(
                "{} inputs but {} outputs",
                x.len(),
                y.len()
            )));
        }
        if x.is_empty() {
            return Err(TmoError::curve_failed("tone curve has no control points"));
        }
        if x.iter().chain(&y).any(|v| !v.is_finite()) {
            return Err(TmoError::curve_failed("tone curve holds non-finite values"));
        }
        if x.windows(2).any(|w| w[1] <= w[0]) {
            return Err(TmoError::curve_failed("tone curve inputs are not strictly increasing"));
        }
        if y.windows(2).any(|w| w[1] < w[0]) {
            return Err(TmoError::curve_failed("tone curve decreases"));
        }
        Ok(Self { x, y })
    }

    /// Number of control points.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Returns true if the curve has no control points.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Input log10 luminances.
    pub fn x(&self) -> &[f32] {
        &self.x
    }

    /// Output log10 display luminances.
    pub fn y(&self) -> &[f32] {
        &self.y
    }

    /// Input range `(first, last)`.
    pub fn domain(&self) -> Option<(f32, f32)> {
        Some((*self.x.first()?, *self.x.last()?))
    }

    /// Output range `(first, last)` in log10 cd/m^2.
    pub fn range(&self) -> Option<(f32, f32)> {
        Some((*self.y.first()?, *self.y.last()?))
    }

    /// Returns true if `l` (log10 luminance) lies within the domain.
    pub fn contains(&self, l: f32) -> bool {
        match self.domain() {
            Some((lo, hi)) => l >= lo - DOMAIN_TOLERANCE && l <= hi + DOMAIN_TOLERANCE,
            None => false,
        }
    }

    /// Output log10 display luminance for input `l`, or `None` outside the
    /// domain.
    pub fn eval(&self, l: f32) -> Option<f32> {
        self.contains(l).then(|| self.eval_clamped(l))
    }

    /// Output for `l` with the input clamped into the domain.
    ///
    /// Returns 0 for an empty curve.
    pub fn eval_clamped(&self, l: f32) -> f32 {
        let n = self.x.len();
        if n == 0 {
            return 0.0;
        }
        if n == 1 || l <= self.x[0] {
            return self.y[0];
        }
        if l >= self.x[n - 1] {
            return self.y[n - 1];
        }
        // First control point strictly greater than l; 1..n-1 here
        let hi = self.x.partition_point(|&v| v <= l);
        let lo = hi - 1;
        let t = (l - self.x[lo]) / (self.x[hi] - self.x[lo]);
        self.y[lo] + (self.y[hi] - self.y[lo]) * t
    }

    /// Display luminance (cd/m^2) for input `l`, or `None` outside the domain.
    pub fn display_luminance(&self, l: f32) -> Option<f32> {
        self.eval(l).map(|y| 10f32.powf(y))
    }

    /// Writes the curve as CSV: input luminance, display luminance, and the
    /// pixel value that produces it on `display`.
    pub fn write_csv<W: Write>(&self, mut w: W, display: &DisplayFunction) -> io::Result<()> {
        writeln!(w, "log10_input,log10_display,pixel_value")?;
        for (&x, &y) in self.x.iter().zip(&self.y) {
            let p = display.inv_display(10f32.powf(y));
            writeln!(w, "{x:.6},{y:.6},{p:.6}")?;
        }
        Ok(())
    }
}
