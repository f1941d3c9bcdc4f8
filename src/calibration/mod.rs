//! Sensor calibration module
//!
//! This module fits and applies the color correction matrix, selects the
//! precision tier for each correction and drives the guided capture
//! workflow that collects the reference samples.

pub mod accuracy;
pub mod manager;
pub mod matrix;
pub mod point;
pub mod session;
pub mod solver;
pub mod status;
pub mod tier;

pub use accuracy::{AccuracyReport, PointResidual};
pub use manager::{CalibrationManager, SensorSettings};
pub use matrix::{CompensationLevel, CorrectionMatrix};
pub use point::{CalibrationPoint, IrReading, RawReading};
pub use session::{AutoCalibrationState, AutoCalibrationStatus};
pub use solver::MatrixSolver;
pub use status::CalibrationStatus;
pub use tier::{CalibrationTier, Correction, CorrectionMethod};
