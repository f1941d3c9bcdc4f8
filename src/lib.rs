//! # Colorsense
//!
//! A Rust crate for calibrating tri-stimulus reflective color sensors.
//!
//! This library turns raw X, Y, Z sensor counts into device-independent RGB by:
//! - Fitting a 3x3 color correction matrix to captured reference samples
//! - Removing dark current, flare and infrared leakage
//! - Falling back to two-point or uncalibrated conversion when the matrix is unavailable
//! - Guiding an operator through capturing the six reference samples
//!
//! ## Example
//!
//! ```rust,no_run
//! use colorsense::hardware::FixedIllumination;
//! use colorsense::storage::JsonFileStore;
//! use colorsense::{CalibrationManager, ColorSensor, IrReading, RawReading};
//!
//! struct Sensor;
//!
//! impl ColorSensor for Sensor {
//!     fn read_averaged(&mut self) -> colorsense::Result<RawReading> {
//!         Ok(RawReading::new(22750, 25300, 17700))
//!     }
//!     fn read_with_ir(&mut self) -> colorsense::Result<IrReading> {
//!         Ok(IrReading::new(22750, 25300, 17700, 0, 0))
//!     }
//! }
//!
//! let store = JsonFileStore::open("calibration.json")?;
//! let mut manager = CalibrationManager::new(Sensor, FixedIllumination::new(128), store);
//! manager.initialize()?;
//!
//! let correction = manager.read_and_correct()?;
//! println!("{} via {:?}", correction.rgb.hex(), correction.method);
//! # Ok::<(), colorsense::CalibrationError>(())
//! ```

use palette::Srgb;
use serde::{Deserialize, Serialize};

pub mod calibration;
pub mod color;
pub mod config;
pub mod constants;
pub mod error;
pub mod hardware;
pub mod storage;

pub use calibration::{
    AutoCalibrationState, AutoCalibrationStatus, CalibrationManager, CalibrationPoint, CalibrationStatus,
    CalibrationTier, CompensationLevel, Correction, CorrectionMatrix, CorrectionMethod, IrReading, MatrixSolver,
    RawReading,
};
pub use color::{CalibrationColor, ReferenceColor, REFERENCE_COLORS};
pub use config::CalibrationConfig;
pub use error::{CalibrationError, Result};
pub use hardware::{ColorSensor, Illumination};
pub use storage::KeyValueStore;

/// 8-bit sRGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    pub const BLACK: RgbColor = RgbColor::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Hexadecimal representation, `#RRGGBB`
    pub fn hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl From<RgbColor> for Srgb<u8> {
    fn from(color: RgbColor) -> Self {
        Srgb::new(color.r, color.g, color.b)
    }
}

impl From<Srgb<u8>> for RgbColor {
    fn from(color: Srgb<u8>) -> Self {
        RgbColor::new(color.red, color.green, color.blue)
    }
}
