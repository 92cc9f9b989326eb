//! Best-effort override of the process-visible application identifier.
//!
//! The ad SDK reads its application identifier from platform metadata when it
//! initializes. Overriding it means writing to a surface the platform does not
//! document, so every failure here degrades to "keep the identifier we had".
//! The override must run before the SDK initializes;
//! [`MonetizationManager`](crate::MonetizationManager) passes the identifier it
//! reads back to the SDK explicitly, so it does not rely on call order.

use crate::AdwardenError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Mutex;
use tracing::{debug, info, warn};

static APP_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^ca-app-pub-[0-9]{16}~[0-9]{10}$").expect("app id pattern is a valid regex")
});

/// Process-visible storage for the application identifier.
pub trait IdentifierStore: Send + Sync {
    /// Current identifier, if any.
    fn read(&self) -> Option<String>;

    /// Replace the identifier.
    fn write(&self, value: &str) -> Result<(), AdwardenError>;
}

/// Check the structural pattern: publisher prefix, a 16-digit segment,
/// `~`, and a 10-digit segment.
pub fn is_valid_app_id(candidate: &str) -> bool {
    APP_ID_PATTERN.is_match(candidate)
}

/// Try to replace the identifier in `store` with `candidate`.
///
/// Returns `true` only when a re-read confirms the store now holds
/// `candidate`. Blank or malformed candidates return `false` without touching
/// the store. Never panics, even when the store does.
pub fn apply_app_id_override(store: &dyn IdentifierStore, candidate: &str) -> bool {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        debug!("No app id override configured");
        return false;
    }
    if !is_valid_app_id(candidate) {
        warn!(candidate, "Rejecting app id override with invalid format");
        return false;
    }

    let attempt = catch_unwind(AssertUnwindSafe(|| -> Result<bool, AdwardenError> {
        let current = store.read();
        if current.as_deref() == Some(candidate) {
            debug!("App id already matches override");
            return Ok(true);
        }

        store.write(candidate)?;
        Ok(store.read().as_deref() == Some(candidate))
    }));

    match attempt {
        Ok(Ok(true)) => {
            info!(app_id = candidate, "App id override applied");
            true
        }
        Ok(Ok(false)) => {
            warn!("App id override did not stick; keeping previous identifier");
            false
        }
        Ok(Err(e)) => {
            warn!(error = %e, "App id override failed; keeping previous identifier");
            false
        }
        Err(_) => {
            warn!("Identifier store panicked; keeping previous identifier");
            false
        }
    }
}

/// Identifier store held in memory.
///
/// Stands in for the platform metadata bundle on hosts where the identifier
/// is not stored anywhere else.
#[derive(Debug, Default)]
pub struct InMemoryIdentifierStore {
    value: Mutex<Option<String>>,
    writes: Mutex<usize>,
}

impl InMemoryIdentifierStore {
    /// Store seeded with the identifier the application shipped with.
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(Some(initial.into())),
            writes: Mutex::new(0),
        }
    }

    /// Number of successful writes.
    pub fn write_count(&self) -> usize {
        self.writes.lock().map(|w| *w).unwrap_or(0)
    }
}

impl IdentifierStore for InMemoryIdentifierStore {
    fn read(&self) -> Option<String> {
        self.value.lock().ok().and_then(|v| v.clone())
    }

    fn write(&self, value: &str) -> Result<(), AdwardenError> {
        let mut slot = self
            .value
            .lock()
            .map_err(|_| AdwardenError::IdentifierStore("identifier lock poisoned".to_string()))?;
        *slot = Some(value.to_string());
        if let Ok(mut writes) = self.writes.lock() {
            *writes += 1;
        }
        Ok(())
    }
}
