//! Contrast sensitivity and contrast transducer.
//!
//! Sensitivity follows Daly's CSF without the orientation and eccentricity
//! terms. It depends on the adapting luminance, so the same physical
//! contrast is more visible on the bright part of a display than on the
//! dark part. The optimizer uses this to decide where display range pays off.

/// Peak gain of the CSF.
const CSF_PEAK_GAIN: f64 = 250.0;
/// Eye-optics constant of Daly's model.
const CSF_EPSILON: f64 = 0.9;

/// Contrast sensitivity (1 / detection threshold) at spatial frequency `rho`
/// (cycles per degree), adapting luminance `l_adapt` (cd/m^2), for a field
/// of `area_deg2` square degrees.
pub fn csf_daly(rho: f64, l_adapt: f64, area_deg2: f64) -> f64 {
    let rho = rho.max(1e-3);
    let l = l_adapt.max(1e-4);
    let i2 = area_deg2.max(1.0);

    let a_l = 0.801 * (1.0 + 0.7 / l).powf(-0.2);
    let b_l = 0.3 * (1.0 + 100.0 / l).powf(0.15);

    let low_freq = ((3.23 * (rho * rho * i2).powf(-0.3)).powi(5) + 1.0).powf(-0.2);
    let e = b_l * CSF_EPSILON * rho;
    let band = a_l * CSF_EPSILON * rho * (-e).exp() * (1.0 + 0.06 * e.exp()).sqrt();

    (CSF_PEAK_GAIN * low_freq * band).max(1.0)
}

/// [`csf_daly`] together with its derivative with respect to log10 of the
/// adapting luminance.
pub fn csf_daly_with_slope(rho: f64, l_adapt: f64, area_deg2: f64) -> (f64, f64) {
    let s = csf_daly(rho, l_adapt, area_deg2);
    if l_adapt < 1e-4 || s <= 1.0 {
        return (s, 0.0);
    }
    let rho = rho.max(1e-3);
    let l = l_adapt;
    let e = 0.3 * (1.0 + 100.0 / l).powf(0.15) * CSF_EPSILON * rho;
    let ee = e.exp();
    let dln_a = 0.14 / (l * (l + 0.7));
    let dln_b = -15.0 / (l * (l + 100.0));
    let dln_s = dln_a + (0.03 * ee / (1.0 + 0.06 * ee) - 1.0) * e * dln_b;
    (s, s * dln_s * l * std::f64::consts::LN_10)
}

/// Peak spatial frequency (cycles per degree) of contrast band `band`.
///
/// Band 0 compares neighboring pixels; each further band doubles the scale.
#[inline]
pub fn band_frequency(band: usize, pix_per_deg: f64) -> f64 {
    pix_per_deg / f64::powi(2.0, band as i32 + 2)
}

/// Michelson contrast of a log10 contrast `g >= 0`.
#[inline]
fn michelson(g: f64) -> f64 {
    let t = 10f64.powf(g);
    (t - 1.0) / (t + 1.0)
}

#[inline]
fn michelson_deriv(g: f64) -> f64 {
    let t = 10f64.powf(g);
    2.0 * std::f64::consts::LN_10 * t / ((t + 1.0) * (t + 1.0))
}

/// Visual response to log10 contrast `g` at sensitivity `s`.
///
/// Compressive: `ln(1 + s * M(g))` with `M` the Michelson contrast.
#[inline]
pub fn response(g: f64, s: f64) -> f64 {
    (s * michelson(g.max(0.0))).ln_1p()
}

/// Derivative of [`response`] with respect to `g`.
#[inline]
pub fn response_deriv(g: f64, s: f64) -> f64 {
    let g = g.max(0.0);
    s * michelson_deriv(g) / (1.0 + s * michelson(g))
}

/// Derivative of [`response`] with respect to the sensitivity `s`.
#[inline]
pub fn response_sensitivity_deriv(g: f64, s: f64) -> f64 {
    let m = michelson(g.max(0.0));
    m / (1.0 + s * m)
}
