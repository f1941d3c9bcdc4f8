//! Precision tiers and the tagged correction result

use serde::{Deserialize, Serialize};

use crate::calibration::matrix::CompensationLevel;
use crate::calibration::point::{CalibrationPoint, RawReading};
use crate::constants::sensor;
use crate::RgbColor;

/// Correction quality levels, best first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationTier {
    /// Valid matrix fitted from at least five points
    Matrix,
    /// Linear black/white interpolation per channel
    TwoPoint,
    /// Uncalibrated `raw / 256`
    Fallback,
}

impl CalibrationTier {
    pub fn name(&self) -> &'static str {
        match self {
            CalibrationTier::Matrix => "matrix",
            CalibrationTier::TwoPoint => "two-point",
            CalibrationTier::Fallback => "fallback",
        }
    }
}

/// How a corrected color was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionMethod {
    /// Matrix pipeline at the given effective compensation level
    Matrix(CompensationLevel),
    TwoPoint,
    /// Uncalibrated conversion; reported as a failed correction
    Fallback,
    /// All-zero input mapped straight to black under the given active tier
    ZeroInput(CalibrationTier),
}

/// Result of correcting one raw reading
///
/// Always carries a color. `method` says which path produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    pub rgb: RgbColor,
    pub method: CorrectionMethod,
    /// Input was at or above the saturation threshold
    pub saturated: bool,
}

impl Correction {
    pub fn new(rgb: RgbColor, method: CorrectionMethod) -> Self {
        Self {
            rgb,
            method,
            saturated: false,
        }
    }

    /// False when produced by, or under, the uncalibrated fallback
    pub fn is_calibrated(&self) -> bool {
        self.tier() != CalibrationTier::Fallback
    }

    /// Tier that produced this correction
    pub fn tier(&self) -> CalibrationTier {
        match self.method {
            CorrectionMethod::Matrix(_) => CalibrationTier::Matrix,
            CorrectionMethod::TwoPoint => CalibrationTier::TwoPoint,
            CorrectionMethod::Fallback => CalibrationTier::Fallback,
            CorrectionMethod::ZeroInput(tier) => tier,
        }
    }
}

/// Integer linear re-map with truncating division
///
/// A degenerate input span maps everything to `out_min`.
pub fn map_range(x: i64, in_min: i64, in_max: i64, out_min: i64, out_max: i64) -> i64 {
    if in_max == in_min {
        return out_min;
    }
    (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}

/// Per-channel map from `[black.raw, white.raw]` onto `[black.target, white.target]`, clamped to 0..=255
///
/// Readings equal to the stored black or white raw values reproduce the
/// stored targets exactly.
pub fn two_point_rgb(raw: RawReading, black: &CalibrationPoint, white: &CalibrationPoint) -> RgbColor {
    let channel = |value: u16, black_raw: u16, white_raw: u16, black_target: u8, white_target: u8| -> u8 {
        map_range(
            i64::from(value),
            i64::from(black_raw),
            i64::from(white_raw),
            i64::from(black_target),
            i64::from(white_target),
        )
        .clamp(0, 255) as u8
    };

    RgbColor::new(
        channel(raw.x, black.raw.x, white.raw.x, black.target.r, white.target.r),
        channel(raw.y, black.raw.y, white.raw.y, black.target.g, white.target.g),
        channel(raw.z, black.raw.z, white.raw.z, black.target.b, white.target.b),
    )
}

/// Uncalibrated conversion, `raw / 256` per channel
pub fn fallback_rgb(raw: RawReading) -> RgbColor {
    let [r, g, b] = raw
        .channels()
        .map(|c| (f32::from(c) / sensor::FALLBACK_DIVISOR).clamp(0.0, 255.0) as u8);
    RgbColor::new(r, g, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn black() -> CalibrationPoint {
        CalibrationPoint::with_timestamp(RawReading::new(500, 600, 400), RgbColor::new(5, 5, 5), 0, 1.0)
    }

    fn white() -> CalibrationPoint {
        CalibrationPoint::with_timestamp(
            RawReading::new(45000, 50000, 35000),
            RgbColor::new(247, 248, 244),
            0,
            1.0,
        )
    }

    #[test]
    fn test_two_point_midpoint() {
        let rgb = two_point_rgb(RawReading::new(22750, 25300, 17700), &black(), &white());
        assert_eq!(rgb, RgbColor::new(126, 126, 124));
    }

    #[test]
    fn test_two_point_boundaries_exact() {
        assert_eq!(two_point_rgb(black().raw, &black(), &white()), black().target);
        assert_eq!(two_point_rgb(white().raw, &black(), &white()), white().target);
    }

    #[test]
    fn test_two_point_extrapolates_below_black() {
        // (0 - 500) * 242 / 44500 = -2.7, truncated to -2
        let below = two_point_rgb(RawReading::new(0, 0, 0), &black(), &white());
        assert_eq!(below, RgbColor::new(3, 3, 3));
    }

    #[test]
    fn test_two_point_clamps_out_of_range() {
        let bright_black =
            CalibrationPoint::with_timestamp(RawReading::new(10000, 10000, 10000), RgbColor::new(200, 200, 200), 0, 1.0);
        let bright_white =
            CalibrationPoint::with_timestamp(RawReading::new(20000, 20000, 20000), RgbColor::new(250, 250, 250), 0, 1.0);

        // (0 - 10000) * 50 / 10000 + 200 = 150
        let low = RawReading::new(0, 0, 0);
        assert_eq!(two_point_rgb(low, &bright_black, &bright_white), RgbColor::new(150, 150, 150));
        let steep_white =
            CalibrationPoint::with_timestamp(RawReading::new(10100, 10100, 10100), RgbColor::new(250, 250, 250), 0, 1.0);
        // (0 - 10000) * 50 / 100 + 200 = -4800
        assert_eq!(two_point_rgb(low, &bright_black, &steep_white), RgbColor::new(0, 0, 0));

        // (65535 - 10000) * 50 / 10000 + 200 = 477
        let high = RawReading::new(65535, 65535, 65535);
        assert_eq!(two_point_rgb(high, &bright_black, &bright_white), RgbColor::new(255, 255, 255));
    }

    #[test]
    fn test_map_range_degenerate_span() {
        assert_eq!(map_range(1234, 800, 800, 5, 247), 5);
    }

    #[test]
    fn test_map_range_truncates_toward_zero() {
        // 24700 * 243 / 49400 = 121.5
        assert_eq!(map_range(25300, 600, 50000, 5, 248), 126);
        // negative intermediate truncates toward zero like C integer division
        assert_eq!(map_range(499, 500, 45000, 5, 247), 5);
    }

    #[test]
    fn test_fallback_divides_by_256() {
        assert_eq!(fallback_rgb(RawReading::new(25600, 255, 65535)), RgbColor::new(100, 0, 255));
    }

    #[test]
    fn test_correction_flags() {
        assert!(!Correction::new(RgbColor::BLACK, CorrectionMethod::Fallback).is_calibrated());
        let two = Correction::new(RgbColor::BLACK, CorrectionMethod::TwoPoint);
        assert!(two.is_calibrated());
        assert_eq!(two.tier(), CalibrationTier::TwoPoint);
    }

    #[test]
    fn test_zero_input_reports_active_tier() {
        let uncalibrated = Correction::new(RgbColor::BLACK, CorrectionMethod::ZeroInput(CalibrationTier::Fallback));
        assert_eq!(uncalibrated.tier(), CalibrationTier::Fallback);
        assert!(!uncalibrated.is_calibrated());

        let matrix = Correction::new(RgbColor::BLACK, CorrectionMethod::ZeroInput(CalibrationTier::Matrix));
        assert_eq!(matrix.tier(), CalibrationTier::Matrix);
        assert!(matrix.is_calibrated());
    }

    #[test]
    fn test_tier_ordering() {
        assert!(CalibrationTier::Matrix < CalibrationTier::TwoPoint);
        assert!(CalibrationTier::TwoPoint < CalibrationTier::Fallback);
    }
}
