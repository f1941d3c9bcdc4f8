//! Store persisted as a single JSON object on disk

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{KeyValueStore, StoredValue};
use crate::{CalibrationError, Result};

/// File-backed store, rewritten synchronously on every change
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, StoredValue>,
}

impl JsonFileStore {
    /// Open a store, loading existing contents if the file exists
    ///
    /// # Errors
    ///
    /// Returns [`CalibrationError::Storage`] if the file exists but cannot
    /// be read or parsed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| CalibrationError::storage(format!("cannot read {}", path.display()), e))?;
            serde_json::from_str(&content)
                .map_err(|e| CalibrationError::storage(format!("cannot parse {}", path.display()), e))?
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), keys = values.len(), "opened calibration store");
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.values)
            .map_err(|e| CalibrationError::storage("cannot serialize calibration store", e))?;
        std::fs::write(&self.path, json)
            .map_err(|e| CalibrationError::storage(format!("cannot write {}", self.path.display()), e))
    }
}

impl KeyValueStore for JsonFileStore {
    fn put(&mut self, key: &str, value: StoredValue) -> Result<()> {
        self.values.insert(key.to_string(), value);
        self.flush()
    }

    fn get(&self, key: &str) -> Option<StoredValue> {
        self.values.get(key).copied()
    }

    fn clear(&mut self) -> Result<()> {
        self.values.clear();
        self.flush()
    }
}
