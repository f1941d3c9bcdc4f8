//! In-memory store

use std::collections::HashMap;

use super::{KeyValueStore, StoredValue};
use crate::Result;

/// HashMap-backed store; contents are lost when dropped
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, StoredValue>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }
}

impl KeyValueStore for MemoryStore {
    fn put(&mut self, key: &str, value: StoredValue) -> Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn get(&self, key: &str) -> Option<StoredValue> {
        self.values.get(key).copied()
    }

    fn clear(&mut self) -> Result<()> {
        self.values.clear();
        Ok(())
    }
}
