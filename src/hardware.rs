//! Sensor and illumination collaborators
//!
//! The calibration manager talks to hardware only through these traits, so
//! a device driver, a simulator or a test fake can stand behind it.

use std::thread;
use std::time::Duration;

use tracing::trace;

use crate::calibration::point::{IrReading, RawReading};
use crate::config::SamplingConfig;
use crate::{CalibrationError, Result};

/// Source of averaged tri-stimulus readings
pub trait ColorSensor {
    /// Averaged X, Y, Z counts
    fn read_averaged(&mut self) -> Result<RawReading>;

    /// Averaged X, Y, Z counts plus both IR channels
    fn read_with_ir(&mut self) -> Result<IrReading>;
}

/// Controllable sample illumination
pub trait Illumination {
    /// Current brightness, 0 is off
    fn brightness(&self) -> u8;

    fn set_brightness(&mut self, level: u8) -> Result<()>;
}

/// One unaveraged read of all five channels
pub trait SampleSource {
    fn read_sample(&mut self) -> Result<IrReading>;
}

/// Averages a fixed number of reads from a [`SampleSource`]
///
/// Each channel is the integer mean of the reads, with `settle_delay`
/// between consecutive reads.
#[derive(Debug)]
pub struct AveragingSensor<S> {
    source: S,
    sample_count: usize,
    settle_delay: Duration,
}

impl<S: SampleSource> AveragingSensor<S> {
    pub fn new(source: S, sample_count: usize, settle_delay: Duration) -> Self {
        Self {
            source,
            sample_count: sample_count.max(1),
            settle_delay,
        }
    }

    pub fn from_config(source: S, config: &SamplingConfig) -> Self {
        Self::new(source, config.sample_count, config.settle_delay())
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    fn average(&mut self) -> Result<IrReading> {
        let mut sums = [0_u64; 5];
        for i in 0..self.sample_count {
            if i > 0 && !self.settle_delay.is_zero() {
                thread::sleep(self.settle_delay);
            }
            let sample = self.source.read_sample()?;
            for (sum, value) in sums
                .iter_mut()
                .zip([sample.x, sample.y, sample.z, sample.ir1, sample.ir2])
            {
                *sum += u64::from(value);
            }
        }

        let count = self.sample_count as u64;
        let [x, y, z, ir1, ir2] = sums.map(|sum| u16::try_from(sum / count).unwrap_or(u16::MAX));
        trace!(x, y, z, ir1, ir2, samples = self.sample_count, "averaged sensor reading");
        Ok(IrReading::new(x, y, z, ir1, ir2))
    }
}

impl<S: SampleSource> ColorSensor for AveragingSensor<S> {
    fn read_averaged(&mut self) -> Result<RawReading> {
        Ok(self.average()?.raw())
    }

    fn read_with_ir(&mut self) -> Result<IrReading> {
        self.average()
    }
}

/// Illumination that only remembers its level, for devices without a dimmable LED
#[derive(Debug, Clone, Default)]
pub struct FixedIllumination {
    level: u8,
}

impl FixedIllumination {
    pub fn new(level: u8) -> Self {
        Self { level }
    }
}

impl Illumination for FixedIllumination {
    fn brightness(&self) -> u8 {
        self.level
    }

    fn set_brightness(&mut self, level: u8) -> Result<()> {
        self.level = level;
        Ok(())
    }
}

/// Wait for the sensor to settle; zero durations return immediately
pub(crate) fn settle(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}

/// Error for a source that produced no data
pub fn no_data(device: &str) -> CalibrationError {
    CalibrationError::hardware(format!("{} returned no data", device))
}
