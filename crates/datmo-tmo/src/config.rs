//! Tone mapping settings.
//!
//! Settings can be built in code or loaded from YAML. Every field has a
//! default, so a file only needs the keys it changes:
//!
//! ```yaml
//! saturation: 0.8
//! contrast_enhancement: 1.2
//! display: lcd_bright
//! display_size: "vd=0.7:d=24"
//! working_space: rec2020
//! optimizer:
//!   max_iterations: 500
//! ```

use std::path::Path;

use datmo_color::WorkingSpace;
use serde::{Deserialize, Serialize};

use crate::display::{DisplayFunction, DisplaySize};
use crate::optimize::OptimizerOptions;
use crate::{TmoError, TmoResult};

/// Settings of one tone mapping run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TonemapConfig {
    /// Color saturation factor in `[0, 2]`.
    pub saturation: f32,
    /// Contrast enhancement factor, `> 0`.
    pub contrast_enhancement: f32,
    /// Scene luminance that maps to the display peak.
    pub white_y: Option<f32>,
    /// Honor `white_y`. When off, or when `white_y` is unset, the frame's
    /// `WHITE_Y` tag is used if present.
    pub use_white_y: bool,
    /// Display type or parameter string, see [`DisplayFunction::parse`].
    pub display: String,
    /// Viewing geometry, see [`DisplaySize::parse`].
    pub display_size: String,
    /// RGB space the curve is applied in.
    pub working_space: WorkingSpace,
    /// Solver limits.
    pub optimizer: OptimizerOptions,
}

impl Default for TonemapConfig {
    fn default() -> Self {
        Self {
            saturation: 1.0,
            contrast_enhancement: 1.0,
            white_y: None,
            use_white_y: true,
            display: "lcd".into(),
            display_size: "vd=0.5:d=30".into(),
            working_space: WorkingSpace::Srgb,
            optimizer: OptimizerOptions::default(),
        }
    }
}

impl TonemapConfig {
    /// Parses YAML settings.
    pub fn from_yaml_str(yaml: &str) -> TmoResult<Self> {
        serde_yaml::from_str(yaml).map_err(|e| TmoError::Config(e.to_string()))
    }

    /// Loads YAML settings from a file.
    pub fn load(path: impl AsRef<Path>) -> TmoResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
            .map_err(|e| TmoError::Config(format!("{}: {e}", path.display())))
    }

    /// Serializes to YAML.
    pub fn to_yaml(&self) -> TmoResult<String> {
        serde_yaml::to_string(self).map_err(|e| TmoError::Config(e.to_string()))
    }

    /// Checks factor ranges and parses the display strings.
    pub fn validate(&self) -> TmoResult<()> {
        validate_factors(self.saturation, self.contrast_enhancement)?;
        if let Some(w) = self.white_y {
            if !w.is_finite() || w < 0.0 {
                return Err(TmoError::invalid_parameter(format!(
                    "white_y must be a non-negative luminance, got {w}"
                )));
            }
        }
        self.display_function()?;
        self.display_geometry()?;
        self.optimizer.validate()
    }

    /// Parsed display function.
    pub fn display_function(&self) -> TmoResult<DisplayFunction> {
        DisplayFunction::parse(&self.display)
    }

    /// Parsed viewing geometry.
    pub fn display_geometry(&self) -> TmoResult<DisplaySize> {
        DisplaySize::parse(&self.display_size)
    }
}

/// Checks the user-facing tone mapping factors.
pub(crate) fn validate_factors(saturation: f32, contrast: f32) -> TmoResult<()> {
    if !(contrast.is_finite() && contrast > 0.0) {
        return Err(TmoError::invalid_parameter(format!(
            "contrast enhancement factor must be positive, got {contrast}"
        )));
    }
    if !(0.0..=2.0).contains(&saturation) {
        return Err(TmoError::invalid_parameter(format!(
            "saturation factor must be within [0, 2], got {saturation}"
        )));
    }
    Ok(())
}
