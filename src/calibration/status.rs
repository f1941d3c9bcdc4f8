//! Calibration progress derived from the point set

use serde::{Deserialize, Serialize};

use crate::calibration::point::CalibrationPoint;
use crate::color::CalibrationColor;

/// Per-color completion flags and overall progress
///
/// Always computed from the current points, never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CalibrationStatus {
    pub black: bool,
    pub white: bool,
    pub red: bool,
    pub green: bool,
    pub blue: bool,
    pub yellow: bool,
    /// Stored points, including any whose target is not a registry color
    pub total_points: usize,
}

impl CalibrationStatus {
    pub fn from_points(points: &[CalibrationPoint]) -> Self {
        let has = |color: CalibrationColor| points.iter().any(|point| point.target == color.target());
        Self {
            black: has(CalibrationColor::Black),
            white: has(CalibrationColor::White),
            red: has(CalibrationColor::Red),
            green: has(CalibrationColor::Green),
            blue: has(CalibrationColor::Blue),
            yellow: has(CalibrationColor::Yellow),
            total_points: points.len(),
        }
    }

    /// Whether the given registry color has been captured
    pub fn has(&self, color: CalibrationColor) -> bool {
        match color {
            CalibrationColor::Black => self.black,
            CalibrationColor::White => self.white,
            CalibrationColor::Red => self.red,
            CalibrationColor::Green => self.green,
            CalibrationColor::Blue => self.blue,
            CalibrationColor::Yellow => self.yellow,
        }
    }

    /// Number of registry colors captured
    pub fn completed(&self) -> usize {
        CalibrationColor::SEQUENCE.iter().filter(|color| self.has(**color)).count()
    }

    /// Percentage of registry colors captured, 0-100
    pub fn progress(&self) -> u8 {
        (self.completed() * 100 / CalibrationColor::SEQUENCE.len()) as u8
    }

    /// Black and white are both present
    pub fn is_complete(&self) -> bool {
        self.black && self.white
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::point::RawReading;
    use crate::RgbColor;

    fn point(color: CalibrationColor) -> CalibrationPoint {
        CalibrationPoint::with_timestamp(RawReading::new(1000, 1000, 1000), color.target(), 0, 1.0)
    }

    #[test]
    fn test_empty_status() {
        let status = CalibrationStatus::from_points(&[]);
        assert_eq!(status.progress(), 0);
        assert!(!status.is_complete());
        assert_eq!(status.total_points, 0);
    }

    #[test]
    fn test_black_and_white_complete() {
        let status = CalibrationStatus::from_points(&[
            point(CalibrationColor::Black),
            point(CalibrationColor::White),
        ]);
        assert!(status.is_complete());
        assert_eq!(status.completed(), 2);
        assert_eq!(status.progress(), 33);
    }

    #[test]
    fn test_complete_requires_white() {
        let status = CalibrationStatus::from_points(&[
            point(CalibrationColor::Black),
            point(CalibrationColor::Red),
            point(CalibrationColor::Green),
        ]);
        assert!(!status.is_complete());
        assert!(status.red && status.green);
        assert_eq!(status.progress(), 50);
    }

    #[test]
    fn test_all_colors_full_progress() {
        let points: Vec<_> = CalibrationColor::SEQUENCE.iter().map(|c| point(*c)).collect();
        let status = CalibrationStatus::from_points(&points);
        assert_eq!(status.progress(), 100);
    }

    #[test]
    fn test_custom_targets_counted_but_not_flagged() {
        let custom = CalibrationPoint::with_timestamp(RawReading::new(1, 2, 3), RgbColor::new(1, 2, 3), 0, 1.0);
        let status = CalibrationStatus::from_points(&[custom]);
        assert_eq!(status.total_points, 1);
        assert_eq!(status.completed(), 0);
    }
}
