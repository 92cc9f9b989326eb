//! Persistent key-value store for small flags.

pub mod file;

pub use file::FileKeyValueStore;

use crate::AdwardenError;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// A persistent boolean store, the shape of platform shared preferences.
pub trait KeyValueStore: Send + Sync {
    /// Read `key`, or `default` if it was never written.
    fn get_bool(&self, key: &str, default: bool) -> bool;

    /// Write `key`.
    fn put_bool(&self, key: &str, value: bool) -> Result<(), AdwardenError>;
}

/// Process-local store. Values are lost on exit.
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    values: Mutex<HashMap<String, bool>>,
}

impl InMemoryKeyValueStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
            .unwrap_or(default)
    }

    fn put_bool(&self, key: &str, value: bool) -> Result<(), AdwardenError> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
        Ok(())
    }
}
