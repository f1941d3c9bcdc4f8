//! Least-squares color correction matrix solver
//!
//! Fits `rgb / 255 ≈ M · (raw / 65535)` over a point set, one output channel
//! at a time, using the regularized normal equations
//! `(AᵗA + λI) x = Aᵗb` and an analytic 3x3 inverse.

use tracing::{debug, info, warn};

use crate::calibration::matrix::{condition_number3, determinant3, invert3, CorrectionMatrix};
use crate::calibration::point::CalibrationPoint;
use crate::color::reference::find_by_target;
use crate::config::SolverConfig;
use crate::constants::solver::MIN_SOLVER_POINTS;
use crate::{CalibrationError, Result};

/// Matrix solver with retained last-error text
#[derive(Debug, Clone, Default)]
pub struct MatrixSolver {
    config: SolverConfig,
    last_error: Option<String>,
}

impl MatrixSolver {
    /// Create a solver with the given thresholds
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            last_error: None,
        }
    }

    /// Text of the most recent failure, cleared on success
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Fit a correction matrix to a point set
    ///
    /// # Arguments
    ///
    /// * `points` - Captured points with distinct targets
    ///
    /// # Returns
    ///
    /// A matrix marked valid, or the first validation or stability check
    /// that failed. The failure text is also kept in [`Self::last_error`].
    pub fn calculate_ccm(&mut self, points: &[CalibrationPoint]) -> Result<CorrectionMatrix> {
        match self.solve(points) {
            Ok(matrix) => {
                self.last_error = None;
                info!(
                    points = points.len(),
                    determinant = matrix.determinant,
                    condition_number = matrix.condition_number,
                    "correction matrix solved"
                );
                Ok(matrix)
            }
            Err(err) => {
                warn!(points = points.len(), error = %err, "correction matrix rejected");
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    fn solve(&self, points: &[CalibrationPoint]) -> Result<CorrectionMatrix> {
        self.validate(points)?;

        let mut rows = [[0.0_f64; 3]; 3];
        for (channel, row) in rows.iter_mut().enumerate() {
            *row = self.solve_channel(points, channel)?;
        }

        let determinant = determinant3(&rows);
        if !determinant.is_finite() || determinant.abs() < self.config.determinant_epsilon {
            return Err(CalibrationError::SingularMatrix { determinant });
        }

        let condition_number = condition_number3(&rows, 0.0);
        if !condition_number.is_finite() || condition_number > self.config.max_condition_number {
            return Err(CalibrationError::IllConditioned {
                condition_number,
                limit: self.config.max_condition_number,
            });
        }

        Ok(CorrectionMatrix {
            m: rows.map(|row| row.map(|v| v as f32)),
            determinant: determinant as f32,
            condition_number: condition_number as f32,
            is_valid: true,
        })
    }

    /// Coefficients of one output channel
    fn solve_channel(&self, points: &[CalibrationPoint], channel: usize) -> Result<[f64; 3]> {
        let mut ata = [[0.0_f64; 3]; 3];
        let mut atb = [0.0_f64; 3];

        for point in points {
            let a = point.raw.channels().map(|c| f64::from(c) / 65535.0);
            let target = [point.target.r, point.target.g, point.target.b][channel];
            let b = f64::from(target) / 255.0;

            for i in 0..3 {
                for j in 0..3 {
                    ata[i][j] += a[i] * a[j];
                }
                atb[i] += a[i] * b;
            }
        }

        for (i, row) in ata.iter_mut().enumerate() {
            row[i] += self.config.regularization;
        }

        let inverse = invert3(&ata, 0.0).ok_or(CalibrationError::SingularMatrix {
            determinant: determinant3(&ata),
        })?;

        let mut coefficients = [0.0_f64; 3];
        for (i, coefficient) in coefficients.iter_mut().enumerate() {
            *coefficient = (0..3).map(|j| inverse[i][j] * atb[j]).sum();
        }
        debug!(channel, ?coefficients, "channel coefficients");
        Ok(coefficients)
    }

    fn validate(&self, points: &[CalibrationPoint]) -> Result<()> {
        if points.is_empty() {
            return Err(CalibrationError::EmptyPointSet);
        }
        if points.len() < MIN_SOLVER_POINTS {
            return Err(CalibrationError::InsufficientPoints {
                have: points.len(),
                need: MIN_SOLVER_POINTS,
            });
        }

        for (i, point) in points.iter().enumerate() {
            if point.raw.is_zero() {
                return Err(CalibrationError::ZeroReading);
            }
            for other in &points[i + 1..] {
                if point.target == other.target {
                    let color = find_by_target(point.target)
                        .map(|reference| reference.name.to_string())
                        .unwrap_or_else(|| point.target.hex());
                    return Err(CalibrationError::DuplicateTarget { color });
                }
                if point.raw == other.raw {
                    warn!(first = %point.target.hex(), second = %other.target.hex(), "identical raw readings for different targets");
                }
            }
        }

        const CHANNELS: [&str; 3] = ["red", "green", "blue"];
        for (channel, name) in CHANNELS.iter().enumerate() {
            let values = points.iter().map(|p| [p.target.r, p.target.g, p.target.b][channel]);
            let range = spread(values.map(u32::from));
            if range < u32::from(self.config.min_target_range) {
                return Err(CalibrationError::InsufficientDiversity {
                    reason: format!(
                        "{} target range {} below {}",
                        name, range, self.config.min_target_range
                    ),
                });
            }
        }

        const SENSOR_CHANNELS: [&str; 3] = ["X", "Y", "Z"];
        for (channel, name) in SENSOR_CHANNELS.iter().enumerate() {
            let range = spread(points.iter().map(|p| u32::from(p.raw.channels()[channel])));
            if range < u32::from(self.config.min_raw_range) {
                return Err(CalibrationError::InsufficientDiversity {
                    reason: format!(
                        "{} raw range {} below {}",
                        name, range, self.config.min_raw_range
                    ),
                });
            }
        }

        Ok(())
    }
}

fn spread(values: impl Iterator<Item = u32>) -> u32 {
    let (min, max) = values.fold((u32::MAX, 0), |(lo, hi), v| (lo.min(v), hi.max(v)));
    max.saturating_sub(min)
}
