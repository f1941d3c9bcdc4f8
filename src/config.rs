//! Configuration structures for the colorsense calibration pipeline.
//!
//! This module defines the tunable parameters of the solver, the raw-sample
//! averaging, the illumination defaults and infrared compensation.
//!
//! # Configuration Loading
//!
//! Configuration can be loaded from JSON files or constructed programmatically:
//!
//! ```no_run
//! use colorsense::CalibrationConfig;
//! use std::path::Path;
//!
//! // Load from file
//! let config = CalibrationConfig::from_json_file(Path::new("calibration.json"))?;
//!
//! // Or use defaults
//! let config = CalibrationConfig::default();
//! # Ok::<(), colorsense::CalibrationError>(())
//! ```
//!
//! # Configuration Sections
//!
//! - [`SolverConfig`]: Matrix tier activation and numerical-stability limits
//! - [`SamplingConfig`]: Raw sample averaging and settling delays
//! - [`IlluminationConfig`]: LED brightness defaults
//! - [`SensorConfig`]: Sensor range characteristics
//! - [`IrCompensationConfig`]: Infrared leakage subtraction

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::calibration::point::{IrReading, RawReading};
use crate::constants::{illumination, ir, sampling, sensor, solver};
use crate::{CalibrationError, Result};

/// Complete calibration configuration.
///
/// Can be serialized to/from JSON so a device keeps its tuning across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Matrix solver configuration
    #[serde(default)]
    pub solver: SolverConfig,

    /// Sample averaging configuration
    #[serde(default)]
    pub sampling: SamplingConfig,

    /// Illumination configuration
    #[serde(default)]
    pub illumination: IlluminationConfig,

    /// Sensor configuration
    #[serde(default)]
    pub sensor: SensorConfig,

    /// Infrared compensation configuration
    #[serde(default)]
    pub ir_compensation: IrCompensationConfig,
}

/// Matrix solver parameters.
///
/// The diversity thresholds keep the normal equations away from
/// ill-conditioned point sets; the determinant and condition limits reject
/// fits that would amplify sensor noise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Stored points required before the matrix tier is attempted
    pub min_matrix_points: usize,

    /// Diagonal regularization of each normal-equation matrix
    pub regularization: f64,

    /// Smallest accepted |determinant| of the fitted matrix
    pub determinant_epsilon: f64,

    /// Largest accepted condition-number estimate
    pub max_condition_number: f64,

    /// Minimum target spread per RGB channel (0-255)
    pub min_target_range: u8,

    /// Minimum raw spread per sensor channel (0-65535)
    pub min_raw_range: u16,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            min_matrix_points: solver::MIN_MATRIX_POINTS,
            regularization: solver::REGULARIZATION,
            determinant_epsilon: solver::DETERMINANT_EPSILON,
            max_condition_number: solver::MAX_CONDITION_NUMBER,
            min_target_range: solver::MIN_TARGET_RANGE,
            min_raw_range: solver::MIN_RAW_RANGE,
        }
    }
}

/// Raw sample averaging parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Reads averaged per measurement
    pub sample_count: usize,

    /// Delay between consecutive reads in milliseconds
    pub settle_delay_ms: u64,

    /// Delay after switching the LED off before a dark measurement
    pub dark_settle_delay_ms: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sample_count: sampling::DEFAULT_SAMPLE_COUNT,
            settle_delay_ms: sampling::DEFAULT_SETTLE_DELAY_MS,
            dark_settle_delay_ms: sampling::DARK_SETTLE_DELAY_MS,
        }
    }
}

impl SamplingConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn dark_settle_delay(&self) -> Duration {
        Duration::from_millis(self.dark_settle_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IlluminationConfig {
    /// Brightness set when a session completes with the LED off
    pub safe_default_brightness: u8,
}

impl Default for IlluminationConfig {
    fn default() -> Self {
        Self {
            safe_default_brightness: illumination::SAFE_DEFAULT_BRIGHTNESS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Captures at or above this count are logged as saturated
    pub saturation_threshold: u16,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            saturation_threshold: sensor::SATURATION_THRESHOLD,
        }
    }
}

/// Infrared leakage factors.
///
/// Each tri-stimulus channel is reduced by `factor1 · ir1 + factor2 · ir2`.
/// Both factors default to zero, which leaves readings untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IrCompensationConfig {
    pub factor1: f32,
    pub factor2: f32,
}

impl IrCompensationConfig {
    /// Subtract IR leakage from every channel, floored at zero
    pub fn apply(&self, reading: &IrReading) -> RawReading {
        let leakage = self.factor1 * f32::from(reading.ir1) + self.factor2 * f32::from(reading.ir2);
        let [x, y, z] = reading
            .raw()
            .channels()
            .map(|c| (f32::from(c) - leakage).clamp(0.0, 65535.0) as u16);
        RawReading::new(x, y, z)
    }

    pub fn is_enabled(&self) -> bool {
        self.factor1 != 0.0 || self.factor2 != 0.0
    }
}

impl CalibrationConfig {
    /// Check every parameter is inside its usable range
    pub fn validate(&self) -> Result<()> {
        let invalid = |parameter: &str, value: String| {
            Err(CalibrationError::InvalidParameter {
                parameter: parameter.to_string(),
                value,
            })
        };

        if self.solver.min_matrix_points < solver::MIN_SOLVER_POINTS {
            return invalid("solver.min_matrix_points", self.solver.min_matrix_points.to_string());
        }
        if !(self.solver.regularization >= 0.0) {
            return invalid("solver.regularization", self.solver.regularization.to_string());
        }
        if !(self.solver.determinant_epsilon > 0.0) {
            return invalid("solver.determinant_epsilon", self.solver.determinant_epsilon.to_string());
        }
        if !(self.solver.max_condition_number >= 3.0) {
            return invalid(
                "solver.max_condition_number",
                self.solver.max_condition_number.to_string(),
            );
        }
        if self.sampling.sample_count == 0 {
            return invalid("sampling.sample_count", "0".to_string());
        }
        if self.illumination.safe_default_brightness == 0 {
            return invalid("illumination.safe_default_brightness", "0".to_string());
        }
        for (name, factor) in [
            ("ir_compensation.factor1", self.ir_compensation.factor1),
            ("ir_compensation.factor2", self.ir_compensation.factor2),
        ] {
            if !(0.0..=ir::MAX_FACTOR).contains(&factor) {
                return invalid(name, factor.to_string());
            }
        }
        Ok(())
    }

    /// Load configuration from JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CalibrationError::config(format!("cannot read {}", path.display()), e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| CalibrationError::config(format!("cannot parse {}", path.display()), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn to_json_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CalibrationError::config("cannot serialize configuration", e))?;
        std::fs::write(path, json)
            .map_err(|e| CalibrationError::config(format!("cannot write {}", path.display()), e))?;
        Ok(())
    }
}
