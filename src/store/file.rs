//! File-backed key-value store with atomic writes.
//!
//! Stores flags as JSON in `dirs::data_dir()/<namespace>/prefs.json`.
//! Uses temp file + rename for atomic writes.

use crate::store::KeyValueStore;
use crate::AdwardenError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

const PREFS_FILE: &str = "prefs.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct Prefs {
    #[serde(default)]
    flags: BTreeMap<String, bool>,
}

/// File-backed key-value store.
pub struct FileKeyValueStore {
    /// Directory holding the prefs file.
    dir: PathBuf,
    prefs: Mutex<Prefs>,
}

impl FileKeyValueStore {
    /// Open the store for `namespace`.
    ///
    /// The file lives under `dirs::data_dir()/<namespace>/`.
    pub fn new(namespace: &str) -> Result<Self, AdwardenError> {
        let base_dir = dirs::data_dir()
            .ok_or_else(|| AdwardenError::StoreIO("Could not find data directory".to_string()))?;
        Self::in_base_dir(&base_dir, namespace)
    }

    /// Open the store for `namespace` under `base_dir` instead of the
    /// platform data directory.
    pub fn in_base_dir(base_dir: &Path, namespace: &str) -> Result<Self, AdwardenError> {
        Self::with_path(base_dir.join(namespace))
    }

    /// Open a store in a specific directory.
    pub fn with_path(dir: PathBuf) -> Result<Self, AdwardenError> {
        fs::create_dir_all(&dir)
            .map_err(|e| AdwardenError::StoreIO(format!("Failed to create store dir: {}", e)))?;
        let prefs = load_prefs(&dir.join(PREFS_FILE))?;
        Ok(Self {
            dir,
            prefs: Mutex::new(prefs),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> PathBuf {
        self.dir.join(PREFS_FILE)
    }

    fn persist(&self, prefs: &Prefs) -> Result<(), AdwardenError> {
        let temp_path = self.dir.join(format!("{}.tmp", PREFS_FILE));
        let json = serde_json::to_string_pretty(prefs)
            .map_err(|e| AdwardenError::StoreIO(format!("Failed to encode prefs: {}", e)))?;

        fs::write(&temp_path, json)
            .map_err(|e| AdwardenError::StoreIO(format!("Failed to write temp file: {}", e)))?;

        fs::rename(&temp_path, self.path())
            .map_err(|e| AdwardenError::StoreIO(format!("Failed to rename prefs file: {}", e)))?;

        Ok(())
    }
}

fn load_prefs(path: &Path) -> Result<Prefs, AdwardenError> {
    if !path.exists() {
        return Ok(Prefs::default());
    }
    let json = fs::read_to_string(path)
        .map_err(|e| AdwardenError::StoreIO(format!("Failed to read prefs file: {}", e)))?;
    match serde_json::from_str(&json) {
        Ok(prefs) => Ok(prefs),
        Err(e) => {
            // Flags are re-derivable from the billing service; start clean.
            warn!(path = %path.display(), error = %e, "Discarding unreadable prefs file");
            Ok(Prefs::default())
        }
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.prefs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flags
            .get(key)
            .copied()
            .unwrap_or(default)
    }

    fn put_bool(&self, key: &str, value: bool) -> Result<(), AdwardenError> {
        let mut prefs = self.prefs.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = prefs.flags.insert(key.to_string(), value);
        if let Err(e) = self.persist(&prefs) {
            match previous {
                Some(old) => prefs.flags.insert(key.to_string(), old),
                None => prefs.flags.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }
}

impl std::fmt::Debug for FileKeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileKeyValueStore")
            .field("path", &self.path())
            .finish()
    }
}
