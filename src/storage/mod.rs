//! Persistent key/value storage for calibration state
//!
//! Calibration is written field by field to a flat key/value store, so a
//! small flash-backed preferences store and a JSON file serve equally well.

pub mod json_file;
pub mod memory;
pub mod persist;

use serde::{Deserialize, Serialize};

use crate::Result;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use persist::StoredCalibration;

/// A typed value held under one key
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum StoredValue {
    Bool(bool),
    U32(u32),
    U8(u8),
    F32(f32),
}

/// Flat key/value persistence
///
/// Typed getters return `default` when the key is absent or holds a value
/// of another type.
pub trait KeyValueStore {
    fn put(&mut self, key: &str, value: StoredValue) -> Result<()>;

    fn get(&self, key: &str) -> Option<StoredValue>;

    /// Remove every key
    fn clear(&mut self) -> Result<()>;

    fn put_bool(&mut self, key: &str, value: bool) -> Result<()> {
        self.put(key, StoredValue::Bool(value))
    }

    fn put_u32(&mut self, key: &str, value: u32) -> Result<()> {
        self.put(key, StoredValue::U32(value))
    }

    fn put_u8(&mut self, key: &str, value: u8) -> Result<()> {
        self.put(key, StoredValue::U8(value))
    }

    fn put_f32(&mut self, key: &str, value: f32) -> Result<()> {
        self.put(key, StoredValue::F32(value))
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(StoredValue::Bool(v)) => v,
            _ => default,
        }
    }

    fn get_u32(&self, key: &str, default: u32) -> u32 {
        match self.get(key) {
            Some(StoredValue::U32(v)) => v,
            _ => default,
        }
    }

    fn get_u8(&self, key: &str, default: u8) -> u8 {
        match self.get(key) {
            Some(StoredValue::U8(v)) => v,
            _ => default,
        }
    }

    fn get_f32(&self, key: &str, default: f32) -> f32 {
        match self.get(key) {
            Some(StoredValue::F32(v)) => v,
            _ => default,
        }
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &mut T {
    fn put(&mut self, key: &str, value: StoredValue) -> Result<()> {
        (**self).put(key, value)
    }

    fn get(&self, key: &str) -> Option<StoredValue> {
        (**self).get(key)
    }

    fn clear(&mut self) -> Result<()> {
        (**self).clear()
    }
}
