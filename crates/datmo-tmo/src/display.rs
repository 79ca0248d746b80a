//! Display model: luminance response and viewing geometry.
//!
//! A display is described by two independent, immutable parts:
//!
//! - [`DisplayFunction`] maps a normalized pixel value `p` in `[0, 1]` to
//!   emitted luminance in cd/m^2, including light reflected from the screen.
//! - [`DisplaySize`] gives the number of pixels per visual degree, which fixes
//!   the spatial frequencies the eye sees for each contrast band.
//!
//! # Gamma-gain-black-ambient model
//!
//! ```text
//! L(p) = p^gamma * (L_max - L_black) + L_black + k / pi * E_amb
//! ```
//!
//! where `k` is the screen reflectivity and `E_amb` the ambient illuminance
//! in lux.
//!
//! # Example
//!
//! ```rust
//! use datmo_tmo::display::{DisplayFunction, DisplaySize};
//!
//! let df = DisplayFunction::from_type("lcd").unwrap();
//! assert!(df.max_luminance() > 199.0);
//! assert!((df.inv_display(df.display(0.5)) - 0.5).abs() < 1e-4);
//!
//! let ds = DisplaySize::new(30.0, 0.5).unwrap();
//! assert!(ds.pix_per_deg() > 10.0);
//! ```

use std::f32::consts::PI;
use std::fmt;

use crate::{TmoError, TmoResult};

/// Named parameter sets of the gamma-gain-black-ambient model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayPreset {
    /// Typical LCD in a bright office.
    LcdOffice,
    /// Typical LCD in a dim room.
    Lcd,
    /// Bright LCD in a dark room.
    LcdBright,
    /// CRT monitor.
    Crt,
}

impl DisplayPreset {
    /// All presets, in listing order.
    pub const ALL: [DisplayPreset; 4] = [
        DisplayPreset::LcdOffice,
        DisplayPreset::Lcd,
        DisplayPreset::LcdBright,
        DisplayPreset::Crt,
    ];

    /// Identifier accepted by [`DisplayFunction::from_type`].
    pub fn name(self) -> &'static str {
        match self {
            DisplayPreset::LcdOffice => "lcd_office",
            DisplayPreset::Lcd => "lcd",
            DisplayPreset::LcdBright => "lcd_bright",
            DisplayPreset::Crt => "crt",
        }
    }

    /// Looks up a preset by identifier (case-insensitive).
    pub fn from_name(name: &str) -> TmoResult<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| TmoError::UnknownDisplayType(name.to_string()))
    }

    /// Model parameters of this preset.
    pub fn params(self) -> Ggba {
        match self {
            DisplayPreset::LcdOffice => Ggba::new_unchecked(2.2, 100.0, 0.8, 400.0, 0.01),
            DisplayPreset::Lcd => Ggba::new_unchecked(2.2, 200.0, 0.8, 60.0, 0.01),
            DisplayPreset::LcdBright => Ggba::new_unchecked(2.6, 500.0, 0.5, 10.0, 0.01),
            DisplayPreset::Crt => Ggba::new_unchecked(2.2, 80.0, 1.0, 60.0, 0.02),
        }
    }
}

/// Gamma-gain-black-ambient display parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ggba {
    /// Display gamma.
    pub gamma: f32,
    /// Peak luminance in cd/m^2.
    pub l_max: f32,
    /// Black level in cd/m^2.
    pub l_black: f32,
    /// Ambient illuminance in lux.
    pub e_amb: f32,
    /// Screen reflectivity (fraction of ambient light reflected).
    pub screen_refl: f32,
}

impl Ggba {
    const fn new_unchecked(gamma: f32, l_max: f32, l_black: f32, e_amb: f32, screen_refl: f32) -> Self {
        Self {
            gamma,
            l_max,
            l_black,
            e_amb,
            screen_refl,
        }
    }

    /// Luminance of black including reflected ambient light.
    #[inline]
    pub fn l_offset(&self) -> f32 {
        self.l_black + self.screen_refl / PI * self.e_amb
    }

    fn validate(&self) -> TmoResult<()> {
        let ok = self.gamma.is_finite()
            && self.gamma > 0.0
            && self.l_black.is_finite()
            && self.l_black >= 0.0
            && self.l_max.is_finite()
            && self.l_max > self.l_black
            && self.e_amb.is_finite()
            && self.e_amb >= 0.0
            && self.screen_refl.is_finite()
            && self.screen_refl >= 0.0;
        // Black must be above zero or the display has an infinite log range
        if !ok || self.l_offset() <= 0.0 {
            return Err(TmoError::invalid_parameter(format!(
                "display parameters out of range: {self:?}"
            )));
        }
        Ok(())
    }
}

/// Display luminance response.
///
/// A closed set of models; currently only the gamma-gain-black-ambient
/// family, selected either by preset name or by explicit parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DisplayFunction {
    /// Gamma-gain-black-ambient model.
    Ggba(Ggba),
}

impl DisplayFunction {
    /// Creates the display function for a preset identifier such as `"lcd"`.
    ///
    /// # Errors
    ///
    /// [`TmoError::UnknownDisplayType`] for unknown identifiers.
    pub fn from_type(name: &str) -> TmoResult<Self> {
        Ok(DisplayFunction::Ggba(DisplayPreset::from_name(name)?.params()))
    }

    /// Creates a gamma-gain-black-ambient display from explicit parameters.
    pub fn ggba(gamma: f32, l_max: f32, l_black: f32, e_amb: f32, screen_refl: f32) -> TmoResult<Self> {
        let params = Ggba::new_unchecked(gamma, l_max, l_black, e_amb, screen_refl);
        params.validate()?;
        Ok(DisplayFunction::Ggba(params))
    }

    /// Parses a display specification.
    ///
    /// Accepted forms:
    /// - `lcd`, `pd=lcd_office` - a preset
    /// - `g=2.2:l=100:b=0.8:k=0.01:a=400` - explicit parameters; missing keys
    ///   take the `lcd` preset values
    pub fn parse(spec: &str) -> TmoResult<Self> {
        let spec = spec.trim();
        if !spec.contains('=') {
            return Self::from_type(spec);
        }
        if let Some(name) = spec.strip_prefix("pd=") {
            return Self::from_type(name);
        }

        let mut p = DisplayPreset::Lcd.params();
        for (key, value) in parse_pairs(spec)? {
            match key {
                "g" => p.gamma = value,
                "l" => p.l_max = value,
                "b" => p.l_black = value,
                "k" => p.screen_refl = value,
                "a" => p.e_amb = value,
                other => {
                    return Err(TmoError::invalid_parameter(format!(
                        "unknown display function key '{other}' in '{spec}'"
                    )));
                }
            }
        }
        p.validate()?;
        Ok(DisplayFunction::Ggba(p))
    }

    /// Luminance emitted for pixel value `p` (clamped to `[0, 1]`).
    pub fn display(&self, p: f32) -> f32 {
        match self {
            DisplayFunction::Ggba(m) => {
                let p = p.clamp(0.0, 1.0);
                p.powf(m.gamma) * (m.l_max - m.l_black) + m.l_offset()
            }
        }
    }

    /// Pixel value that produces luminance `l`, clamped to `[0, 1]`.
    pub fn inv_display(&self, l: f32) -> f32 {
        match self {
            DisplayFunction::Ggba(m) => {
                let l = l.clamp(self.min_luminance(), self.max_luminance());
                ((l - m.l_offset()) / (m.l_max - m.l_black))
                    .max(0.0)
                    .powf(1.0 / m.gamma)
                    .min(1.0)
            }
        }
    }

    /// Darkest achievable luminance (cd/m^2).
    pub fn min_luminance(&self) -> f32 {
        self.display(0.0)
    }

    /// Brightest achievable luminance (cd/m^2).
    pub fn max_luminance(&self) -> f32 {
        self.display(1.0)
    }

    /// Human-readable summary of the parameters, for logs.
    pub fn describe(&self) -> String {
        match self {
            DisplayFunction::Ggba(m) => format!(
                "Display function (gamma-gain-black-ambient): gamma = {}, L_max = {} cd/m^2, \
                 L_black = {} cd/m^2, reflectivity = {}, E_amb = {} lux",
                m.gamma, m.l_max, m.l_black, m.screen_refl, m.e_amb
            ),
        }
    }
}

impl Default for DisplayFunction {
    fn default() -> Self {
        DisplayFunction::Ggba(DisplayPreset::Lcd.params())
    }
}

impl fmt::Display for DisplayFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Default vertical resolution assumed when only physical size is known.
pub const DEFAULT_VRES: u32 = 1024;

const INCH_M: f32 = 0.0254;

/// Physical viewing geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplaySize {
    vres: u32,
    /// Viewing distance in screen heights.
    vd_screen_h: f32,
    /// Viewing distance in meters, when known.
    vd_meters: Option<f32>,
}

impl DisplaySize {
    /// Display of `diagonal_in` inches (4:3) viewed from `distance_m` meters,
    /// with [`DEFAULT_VRES`] vertical pixels.
    pub fn new(diagonal_in: f32, distance_m: f32) -> TmoResult<Self> {
        Self::with_resolution(diagonal_in, distance_m, DEFAULT_VRES)
    }

    /// Like [`DisplaySize::new`] with an explicit vertical resolution.
    pub fn with_resolution(diagonal_in: f32, distance_m: f32, vres: u32) -> TmoResult<Self> {
        if !(diagonal_in.is_finite() && diagonal_in > 0.0) {
            return Err(TmoError::invalid_parameter(format!(
                "display diagonal must be positive, got {diagonal_in}"
            )));
        }
        if !(distance_m.is_finite() && distance_m > 0.0) {
            return Err(TmoError::invalid_parameter(format!(
                "viewing distance must be positive, got {distance_m}"
            )));
        }
        if vres == 0 {
            return Err(TmoError::invalid_parameter("vertical resolution must be > 0"));
        }
        // 4:3 screen: height is 3/5 of the diagonal
        let height_m = diagonal_in * INCH_M * 0.6;
        Ok(Self {
            vres,
            vd_screen_h: distance_m / height_m,
            vd_meters: Some(distance_m),
        })
    }

    /// Geometry that yields `ppd` pixels per visual degree.
    pub fn from_ppd(ppd: f32) -> TmoResult<Self> {
        if !(ppd.is_finite() && ppd > 0.0) {
            return Err(TmoError::invalid_parameter(format!(
                "pixels per degree must be positive, got {ppd}"
            )));
        }
        // Solve vres / (2 atan(0.5 / vd) deg) = ppd for vd
        let half_angle = (DEFAULT_VRES as f32 / ppd / 2.0).to_radians();
        if half_angle >= PI / 2.0 {
            return Err(TmoError::invalid_parameter(format!(
                "{ppd} pixels per degree cannot be reached with {DEFAULT_VRES} pixels"
            )));
        }
        Ok(Self {
            vres: DEFAULT_VRES,
            vd_screen_h: 0.5 / half_angle.tan(),
            vd_meters: None,
        })
    }

    /// Parses `vd=<meters>:d=<inches>` or `ppd=<pixels per degree>`.
    pub fn parse(spec: &str) -> TmoResult<Self> {
        let mut ppd = None;
        let mut vd = None;
        let mut diag = None;
        for (key, value) in parse_pairs(spec)? {
            match key {
                "ppd" => ppd = Some(value),
                "vd" => vd = Some(value),
                "d" => diag = Some(value),
                other => {
                    return Err(TmoError::invalid_parameter(format!(
                        "unknown display size key '{other}' in '{spec}'"
                    )));
                }
            }
        }
        match (ppd, vd, diag) {
            (Some(ppd), None, None) => Self::from_ppd(ppd),
            (None, vd, diag) => Self::new(diag.unwrap_or(30.0), vd.unwrap_or(0.5)),
            _ => Err(TmoError::invalid_parameter(format!(
                "display size '{spec}' mixes ppd with vd/d"
            ))),
        }
    }

    /// Vertical field of view in degrees.
    pub fn field_of_view_deg(&self) -> f32 {
        (2.0 * (0.5 / self.vd_screen_h).atan()).to_degrees()
    }

    /// Pixels per visual degree.
    pub fn pix_per_deg(&self) -> f32 {
        self.vres as f32 / self.field_of_view_deg()
    }

    /// Visual angle subtended by one pixel, in degrees.
    pub fn pixel_visual_angle(&self) -> f32 {
        1.0 / self.pix_per_deg()
    }

    /// Area of the (4:3) screen in square visual degrees.
    pub fn field_area_deg2(&self) -> f32 {
        let h = self.field_of_view_deg();
        h * h * 4.0 / 3.0
    }

    /// Human-readable summary, for logs.
    pub fn describe(&self) -> String {
        match self.vd_meters {
            Some(m) => format!(
                "Display size: {} vertical pixels, viewing distance {} m ({:.3} screen heights), {:.2} pixels per degree",
                self.vres,
                m,
                self.vd_screen_h,
                self.pix_per_deg()
            ),
            None => format!(
                "Display size: {} vertical pixels, {:.3} screen heights, {:.2} pixels per degree",
                self.vres,
                self.vd_screen_h,
                self.pix_per_deg()
            ),
        }
    }
}

impl Default for DisplaySize {
    fn default() -> Self {
        let height_m = 30.0 * INCH_M * 0.6;
        Self {
            vres: DEFAULT_VRES,
            vd_screen_h: 0.5 / height_m,
            vd_meters: Some(0.5),
        }
    }
}

impl fmt::Display for DisplaySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Splits `a=1:b=2` into `(key, value)` pairs.
fn parse_pairs(spec: &str) -> TmoResult<Vec<(&str, f32)>> {
    spec.split(':')
        .filter(|s| !s.trim().is_empty())
        .map(|item| {
            let (key, value) = item.split_once('=').ok_or_else(|| {
                TmoError::invalid_parameter(format!("expected key=value, got '{item}'"))
            })?;
            let value = value.trim().parse::<f32>().map_err(|_| {
                TmoError::invalid_parameter(format!("'{value}' is not a number in '{item}'"))
            })?;
            Ok((key.trim(), value))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_lcd_preset_range() {
        let df = DisplayFunction::from_type("lcd").unwrap();
        // L_offset = 0.8 + 0.01 / pi * 60
        assert_relative_eq!(df.min_luminance(), 0.8 + 0.6 / PI, epsilon = 1e-5);
        assert_relative_eq!(df.max_luminance(), 200.0 + 0.6 / PI, epsilon = 1e-3);
    }

    #[test]
    fn test_unknown_type() {
        let err = DisplayFunction::from_type("oled_hdr").unwrap_err();
        assert!(matches!(err, TmoError::UnknownDisplayType(ref s) if s == "oled_hdr"));
    }

    #[test]
    fn test_inverse_clamps() {
        let df = DisplayFunction::from_type("crt").unwrap();
        assert_eq!(df.inv_display(0.0), 0.0);
        assert_eq!(df.inv_display(1e6), 1.0);
        for p in [0.1_f32, 0.5, 0.9] {
            assert_relative_eq!(df.inv_display(df.display(p)), p, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_parse_custom() {
        let df = DisplayFunction::parse("g=2.4:l=300:b=0.1:k=0:a=0").unwrap();
        assert_relative_eq!(df.min_luminance(), 0.1, epsilon = 1e-6);
        assert_relative_eq!(df.max_luminance(), 300.0, epsilon = 1e-3);

        assert_eq!(
            DisplayFunction::parse("pd=lcd_bright").unwrap(),
            DisplayFunction::from_type("LCD_BRIGHT").unwrap()
        );
        assert!(DisplayFunction::parse("g=2.2:x=4").is_err());
        assert!(DisplayFunction::parse("l=0.5:b=1").is_err());
    }

    #[test]
    fn test_display_size() {
        let ds = DisplaySize::new(30.0, 0.5).unwrap();
        // 30" 4:3 screen is 0.457 m tall, seen at 0.5 m: about 49 degrees
        assert_relative_eq!(ds.field_of_view_deg(), 49.14, epsilon = 0.05);
        assert_relative_eq!(ds.pix_per_deg(), 1024.0 / 49.14, epsilon = 0.05);
        assert_eq!(ds, DisplaySize::default());
        assert!(DisplaySize::new(-1.0, 0.5).is_err());
    }

    #[test]
    fn test_display_size_from_ppd() {
        let ds = DisplaySize::parse("ppd=40").unwrap();
        assert_relative_eq!(ds.pix_per_deg(), 40.0, epsilon = 1e-2);
        assert!(DisplaySize::parse("ppd=40:vd=1").is_err());
        let ds = DisplaySize::parse("vd=1.0:d=24").unwrap();
        assert!(ds.pix_per_deg() > DisplaySize::default().pix_per_deg());
    }
}
