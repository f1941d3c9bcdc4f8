//! Residual error of the active correction against stored targets

use serde::{Deserialize, Serialize};

use crate::calibration::point::CalibrationPoint;
use crate::calibration::tier::{CalibrationTier, Correction};
use crate::color::ColorConverter;
use crate::RgbColor;

/// Correction error at one stored point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointResidual {
    pub target: RgbColor,
    pub corrected: RgbColor,
    /// CIE76 distance in Lab
    pub delta_e: f32,
}

/// Per-point residuals plus summary statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyReport {
    pub tier: CalibrationTier,
    pub residuals: Vec<PointResidual>,
    pub mean_delta_e: f32,
    pub max_delta_e: f32,
}

impl AccuracyReport {
    /// Build a report by running `correct` over every point's raw reading
    pub fn evaluate<F>(tier: CalibrationTier, points: &[CalibrationPoint], mut correct: F) -> Self
    where
        F: FnMut(&CalibrationPoint) -> Correction,
    {
        let converter = ColorConverter::new();
        let residuals: Vec<PointResidual> = points
            .iter()
            .map(|point| {
                let corrected = correct(point).rgb;
                PointResidual {
                    target: point.target,
                    corrected,
                    delta_e: converter.rgb_delta_e(point.target, corrected),
                }
            })
            .collect();

        let max_delta_e = residuals.iter().map(|r| r.delta_e).fold(0.0_f32, f32::max);
        let mean_delta_e = if residuals.is_empty() {
            0.0
        } else {
            residuals.iter().map(|r| r.delta_e).sum::<f32>() / residuals.len() as f32
        };

        Self {
            tier,
            residuals,
            mean_delta_e,
            max_delta_e,
        }
    }

    /// Every residual is at most `threshold`
    pub fn within(&self, threshold: f32) -> bool {
        self.max_delta_e <= threshold
    }
}
