//! 3x3 color correction matrix and its compensation pipelines
//!
//! A single [`CorrectionMatrix::apply`] entry point runs one of three
//! pipelines against a raw reading:
//!
//! | Level | Pipeline |
//! |-------|----------|
//! | [`CompensationLevel::None`] | normalize, multiply, proportional overflow rescale |
//! | [`CompensationLevel::BlackOnly`] | black-reference subtraction, multiply, self-normalize, sRGB gamma |
//! | [`CompensationLevel::Professional`] | dark-current and flare subtraction, multiply, sRGB gamma, overflow rescale |
//!
//! [`CompensationLevel::Auto`] picks the richest pipeline the supplied
//! dark-offset and black-reference records allow.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::calibration::point::{CalibrationPoint, RawReading};
use crate::calibration::tier::{fallback_rgb, CalibrationTier, Correction, CorrectionMethod};
use crate::color::ColorConverter;
use crate::constants::sensor;
use crate::RgbColor;

/// Compensation applied around the matrix multiply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CompensationLevel {
    /// Matrix only
    None,
    /// Black-reference subtraction and gamma encoding
    BlackOnly,
    /// Dark-current and flare subtraction and gamma encoding
    Professional,
    /// Best level the available records allow
    #[default]
    Auto,
}

impl CompensationLevel {
    /// Resolve the level actually runnable with the given records
    ///
    /// Never returns `Auto`. A level whose records are missing degrades to
    /// the next one down.
    pub fn resolve(self, has_dark_offset: bool, has_black_reference: bool) -> CompensationLevel {
        let best = if has_dark_offset && has_black_reference {
            CompensationLevel::Professional
        } else if has_black_reference {
            CompensationLevel::BlackOnly
        } else {
            CompensationLevel::None
        };

        match self {
            CompensationLevel::Auto => best,
            CompensationLevel::Professional => best,
            CompensationLevel::BlackOnly if has_black_reference => CompensationLevel::BlackOnly,
            _ => CompensationLevel::None,
        }
    }
}

/// Linear map from normalized sensor space to RGB
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrectionMatrix {
    /// Row `i` holds the X, Y, Z coefficients of output channel `i`
    pub m: [[f32; 3]; 3],
    pub determinant: f32,
    pub condition_number: f32,
    pub is_valid: bool,
}

impl Default for CorrectionMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl CorrectionMatrix {
    /// Identity matrix, not yet valid
    pub fn identity() -> Self {
        Self {
            m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            determinant: 1.0,
            condition_number: 3.0,
            is_valid: false,
        }
    }

    /// Build a matrix from rows, computing determinant and condition number
    ///
    /// The result is not marked valid; the solver decides that.
    pub fn from_rows(m: [[f32; 3]; 3]) -> Self {
        let wide = widen(&m);
        Self {
            m,
            determinant: determinant3(&wide) as f32,
            condition_number: condition_number3(&wide, 0.0) as f32,
            is_valid: false,
        }
    }

    /// Multiply a column vector by the matrix
    pub fn multiply(&self, v: [f32; 3]) -> [f32; 3] {
        let m = &self.m;
        [
            m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
            m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
            m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
        ]
    }

    /// Correct a raw reading
    ///
    /// # Arguments
    ///
    /// * `raw` - Current sensor reading
    /// * `level` - Requested compensation level
    /// * `dark_offset` - LED-off reading, needed for `Professional`
    /// * `black_reference` - Illuminated black sample, needed for `BlackOnly` and `Professional`
    ///
    /// # Returns
    ///
    /// The corrected color and the method that produced it. An invalid matrix
    /// yields the per-channel `raw / 256` fallback tagged
    /// [`CorrectionMethod::Fallback`]; an all-zero reading yields black
    /// without touching the matrix.
    pub fn apply(
        &self,
        raw: RawReading,
        level: CompensationLevel,
        dark_offset: Option<&CalibrationPoint>,
        black_reference: Option<&CalibrationPoint>,
    ) -> Correction {
        if !self.is_valid {
            warn!("correction matrix invalid, using fallback conversion");
            return Correction::new(fallback_rgb(raw), CorrectionMethod::Fallback);
        }

        if raw.is_zero() {
            return Correction::new(RgbColor::BLACK, CorrectionMethod::ZeroInput(CalibrationTier::Matrix));
        }

        let saturated = raw.is_saturated(sensor::SATURATION_THRESHOLD);
        if saturated {
            warn!(x = raw.x, y = raw.y, z = raw.z, "sensor reading near saturation");
        }

        let requested = level.resolve(dark_offset.is_some(), black_reference.is_some());
        let (applied, rgb) = match (requested, dark_offset, black_reference) {
            (CompensationLevel::Professional, Some(dark), Some(black)) => (
                CompensationLevel::Professional,
                self.apply_professional(raw, &dark.raw, &black.raw),
            ),
            (CompensationLevel::BlackOnly, _, Some(black)) => (
                CompensationLevel::BlackOnly,
                self.apply_black_compensated(raw, &black.raw),
            ),
            _ => (CompensationLevel::None, self.apply_basic(raw)),
        };

        Correction {
            rgb,
            method: CorrectionMethod::Matrix(applied),
            saturated,
        }
    }

    fn apply_basic(&self, raw: RawReading) -> RgbColor {
        let linear = self.multiply(raw.normalized());
        let scaled = rescale_overflow(linear.map(|c| c * 255.0));
        to_rgb(scaled)
    }

    /// Multiplies compensated counts; once the brightest channel exceeds 255
    /// counts it is normalized to full scale
    fn apply_black_compensated(&self, raw: RawReading, black: &RawReading) -> RgbColor {
        let compensated = subtract_floor(&raw.channels().map(f32::from), &black.channels().map(f32::from));
        let linear = self.multiply(compensated).map(|c| c / 255.0);

        let peak = linear.iter().copied().fold(1.0_f32, f32::max);
        let normalized = linear.map(|c| (c / peak).clamp(0.0, 1.0));

        let encoded = ColorConverter::new().encode_srgb(normalized);
        to_rgb(encoded.map(|c| c * 255.0))
    }

    fn apply_professional(&self, raw: RawReading, dark: &RawReading, black: &RawReading) -> RgbColor {
        let dark = dark.channels().map(f32::from);
        let dark_compensated = subtract_floor(&raw.channels().map(f32::from), &dark);
        let flare = subtract_floor(&black.channels().map(f32::from), &dark);
        let signal = subtract_floor(&dark_compensated, &flare);

        let linear = self.multiply(signal.map(|c| c / sensor::FULL_SCALE));
        let encoded = ColorConverter::new().encode_srgb(linear);
        let scaled = rescale_overflow(encoded.map(|c| c * 255.0));
        to_rgb(scaled)
    }
}

fn subtract_floor(a: &[f32; 3], b: &[f32; 3]) -> [f32; 3] {
    [
        (a[0] - b[0]).max(0.0),
        (a[1] - b[1]).max(0.0),
        (a[2] - b[2]).max(0.0),
    ]
}

/// Scale all channels by `255 / max` when any exceeds 255, keeping their ratios
fn rescale_overflow(channels: [f32; 3]) -> [f32; 3] {
    let peak = channels.iter().copied().fold(f32::MIN, f32::max);
    if peak > 255.0 {
        let factor = 255.0 / peak;
        debug!(factor, peak, "proportional RGB rescale");
        channels.map(|c| c * factor)
    } else {
        channels
    }
}

fn to_rgb(channels: [f32; 3]) -> RgbColor {
    let [r, g, b] = channels.map(|c| if c.is_finite() { c.clamp(0.0, 255.0) as u8 } else { 0 });
    RgbColor::new(r, g, b)
}

pub(crate) fn widen(m: &[[f32; 3]; 3]) -> [[f64; 3]; 3] {
    m.map(|row| row.map(f64::from))
}

/// Determinant by cofactor expansion along the first row
pub fn determinant3(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// Analytic inverse via the adjugate; `None` when `|det| < epsilon` or det is zero
pub fn invert3(m: &[[f64; 3]; 3], epsilon: f64) -> Option<[[f64; 3]; 3]> {
    let det = determinant3(m);
    if !det.is_finite() || det == 0.0 || det.abs() < epsilon {
        return None;
    }
    let inv_det = 1.0 / det;

    Some([
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
        ],
    ])
}

pub fn frobenius_norm(m: &[[f64; 3]; 3]) -> f64 {
    m.iter().flatten().map(|v| v * v).sum::<f64>().sqrt()
}

/// Condition number estimate `‖M‖_F · ‖M⁻¹‖_F`; infinite when `M` is singular
pub fn condition_number3(m: &[[f64; 3]; 3], epsilon: f64) -> f64 {
    match invert3(m, epsilon) {
        Some(inverse) => frobenius_norm(m) * frobenius_norm(&inverse),
        None => f64::INFINITY,
    }
}
