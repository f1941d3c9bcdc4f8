//! Color space conversion utilities
//!
//! Provides the conversions the correction pipelines and accuracy reports need:
//! - Linear light to sRGB gamma encoding
//! - 8-bit RGB to CIE Lab (D65)
//! - Delta E between Lab colors
//! - Hex color representation

use palette::{FromColor, Lab, LinSrgb, Srgb};

use crate::RgbColor;

/// Color converter for sRGB encoding and Lab comparisons
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorConverter;

impl ColorConverter {
    /// Create a new color converter
    pub fn new() -> Self {
        Self
    }

    /// Apply the sRGB transfer curve to linear-light channels
    ///
    /// Negative input is floored at zero. Input above 1.0 follows the power
    /// curve rather than clipping, so callers can rescale overflow
    /// proportionally afterwards.
    ///
    /// # Arguments
    ///
    /// * `linear` - Linear RGB channels, nominally in [0, 1]
    ///
    /// # Returns
    ///
    /// Gamma-encoded channels
    pub fn encode_srgb(&self, linear: [f32; 3]) -> [f32; 3] {
        let [r, g, b] = linear.map(|c| if c.is_finite() { c.max(0.0) } else { 0.0 });
        let encoded: Srgb<f32> = Srgb::from_linear(LinSrgb::new(r, g, b));
        [encoded.red, encoded.green, encoded.blue]
    }

    /// Convert 8-bit RGB to Lab color space
    ///
    /// # Arguments
    ///
    /// * `rgb` - sRGB color
    ///
    /// # Returns
    ///
    /// Lab color in D65 illuminant
    pub fn rgb_to_lab(&self, rgb: RgbColor) -> Lab {
        let srgb = Srgb::new(
            rgb.r as f32 / 255.0,
            rgb.g as f32 / 255.0,
            rgb.b as f32 / 255.0,
        );
        Lab::from_color(srgb)
    }

    /// Compute Delta E (color difference) between two Lab colors
    ///
    /// Uses simple Euclidean distance (ΔE76)
    pub fn delta_e(&self, lab1: Lab, lab2: Lab) -> f32 {
        let dl = lab1.l - lab2.l;
        let da = lab1.a - lab2.a;
        let db = lab1.b - lab2.b;
        (dl * dl + da * da + db * db).sqrt()
    }

    /// Delta E between two 8-bit RGB colors
    pub fn rgb_delta_e(&self, a: RgbColor, b: RgbColor) -> f32 {
        self.delta_e(self.rgb_to_lab(a), self.rgb_to_lab(b))
    }
}
