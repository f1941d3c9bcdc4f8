//! Fakes shared by the integration tests
#![allow(dead_code)]

use std::collections::VecDeque;

use colorsense::calibration::CalibrationManager;
use colorsense::storage::{KeyValueStore, MemoryStore, StoredValue};
use colorsense::{
    CalibrationColor, CalibrationConfig, CalibrationError, ColorSensor, Illumination, IrReading, RawReading,
    Result, RgbColor,
};

/// Channel crosstalk of the simulated sensor, raw = S · rgb
pub const SENSOR: [[f64; 3]; 3] = [[0.6, 0.25, 0.1], [0.3, 0.6, 0.1], [0.05, 0.15, 0.7]];

/// Reading the simulated sensor produces for a sample of `target` color
pub fn simulate(target: RgbColor) -> RawReading {
    let rgb = [target.r, target.g, target.b].map(|c| f64::from(c) / 255.0);
    let [x, y, z] = SENSOR.map(|row| {
        let v = row[0] * rgb[0] + row[1] * rgb[1] + row[2] * rgb[2];
        (v * 65535.0).round().clamp(0.0, 65535.0) as u16
    });
    RawReading::new(x, y, z)
}

pub fn simulate_color(color: CalibrationColor) -> RawReading {
    simulate(color.target())
}

/// Sensor replaying queued readings; an empty queue is a read failure
#[derive(Debug, Default)]
pub struct ScriptedSensor {
    readings: VecDeque<RawReading>,
}

impl ScriptedSensor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, raw: RawReading) {
        self.readings.push_back(raw);
    }

    pub fn remaining(&self) -> usize {
        self.readings.len()
    }
}

impl ColorSensor for ScriptedSensor {
    fn read_averaged(&mut self) -> Result<RawReading> {
        self.readings
            .pop_front()
            .ok_or_else(|| CalibrationError::hardware("no sample queued"))
    }

    fn read_with_ir(&mut self) -> Result<IrReading> {
        let raw = self.read_averaged()?;
        Ok(IrReading::new(raw.x, raw.y, raw.z, 0, 0))
    }
}

/// LED that records every level it is set to
#[derive(Debug, Default)]
pub struct FakeLed {
    pub level: u8,
    pub history: Vec<u8>,
}

impl FakeLed {
    pub fn new(level: u8) -> Self {
        Self {
            level,
            history: Vec::new(),
        }
    }
}

impl Illumination for FakeLed {
    fn brightness(&self) -> u8 {
        self.level
    }

    fn set_brightness(&mut self, level: u8) -> Result<()> {
        self.level = level;
        self.history.push(level);
        Ok(())
    }
}

/// Memory store whose writes can be made to fail
#[derive(Debug, Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_writes: bool,
}

impl KeyValueStore for FlakyStore {
    fn put(&mut self, key: &str, value: StoredValue) -> Result<()> {
        if self.fail_writes {
            return Err(CalibrationError::Storage {
                message: format!("write of {} refused", key),
                source: None,
            });
        }
        self.inner.put(key, value)
    }

    fn get(&self, key: &str) -> Option<StoredValue> {
        self.inner.get(key)
    }

    fn clear(&mut self) -> Result<()> {
        self.inner.clear()
    }
}

/// Default configuration without the dark settling wait
pub fn test_config() -> CalibrationConfig {
    let mut config = CalibrationConfig::default();
    config.sampling.dark_settle_delay_ms = 0;
    config
}

pub type TestManager<K> = CalibrationManager<ScriptedSensor, FakeLed, K>;

/// Initialized manager over a fresh in-memory store
pub fn manager_with_led(level: u8) -> TestManager<MemoryStore> {
    let mut manager = CalibrationManager::with_config(
        ScriptedSensor::new(),
        FakeLed::new(level),
        MemoryStore::new(),
        test_config(),
    );
    manager.initialize().expect("initialize");
    manager
}

pub fn manager() -> TestManager<MemoryStore> {
    manager_with_led(200)
}
