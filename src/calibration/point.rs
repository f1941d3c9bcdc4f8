//! Raw sensor readings and captured calibration points

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::constants::sensor;
use crate::RgbColor;

/// Tri-stimulus counts from the X, Y and Z channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RawReading {
    pub x: u16,
    pub y: u16,
    pub z: u16,
}

impl RawReading {
    pub const fn new(x: u16, y: u16, z: u16) -> Self {
        Self { x, y, z }
    }

    /// All three channels read zero
    pub fn is_zero(&self) -> bool {
        self.x == 0 && self.y == 0 && self.z == 0
    }

    /// Any channel at or above `threshold`
    pub fn is_saturated(&self, threshold: u16) -> bool {
        self.x >= threshold || self.y >= threshold || self.z >= threshold
    }

    pub fn channels(&self) -> [u16; 3] {
        [self.x, self.y, self.z]
    }

    /// Channels scaled to [0, 1] by the 16-bit full scale
    pub fn normalized(&self) -> [f32; 3] {
        self.channels().map(|c| c as f32 / sensor::FULL_SCALE)
    }
}

impl From<[u16; 3]> for RawReading {
    fn from(channels: [u16; 3]) -> Self {
        Self::new(channels[0], channels[1], channels[2])
    }
}

/// Tri-stimulus counts plus the two infrared leakage channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct IrReading {
    pub x: u16,
    pub y: u16,
    pub z: u16,
    pub ir1: u16,
    pub ir2: u16,
}

impl IrReading {
    pub const fn new(x: u16, y: u16, z: u16, ir1: u16, ir2: u16) -> Self {
        Self { x, y, z, ir1, ir2 }
    }

    /// The tri-stimulus part, IR channels dropped
    pub fn raw(&self) -> RawReading {
        RawReading::new(self.x, self.y, self.z)
    }
}

/// A captured reference sample: what the sensor read and what it should map to
///
/// Points are keyed by `target`; re-capturing the same target replaces the
/// earlier point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPoint {
    pub raw: RawReading,
    pub target: RgbColor,
    /// Unix timestamp (seconds) of the capture
    pub timestamp: u32,
    /// Capture quality in [0, 1]
    pub quality: f32,
}

impl CalibrationPoint {
    /// Create a point stamped with the current time
    pub fn new(raw: RawReading, target: RgbColor, quality: f32) -> Self {
        Self {
            raw,
            target,
            timestamp: unix_timestamp(),
            quality,
        }
    }

    /// Create a point with an explicit timestamp
    pub fn with_timestamp(raw: RawReading, target: RgbColor, timestamp: u32, quality: f32) -> Self {
        Self {
            raw,
            target,
            timestamp,
            quality,
        }
    }
}

impl Default for CalibrationPoint {
    fn default() -> Self {
        Self {
            raw: RawReading::default(),
            target: RgbColor::default(),
            timestamp: 0,
            quality: 0.0,
        }
    }
}

/// Seconds since the Unix epoch, saturating into `u32`
pub fn unix_timestamp() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u32::try_from(elapsed.as_secs()).unwrap_or(u32::MAX))
        .unwrap_or(0)
}
