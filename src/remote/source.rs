//! Remote configuration source seam.

use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Why a remote fetch produced no values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The source gave up waiting on the backend.
    #[error("Remote fetch timed out")]
    Timeout,

    /// The source refused to fetch again so soon.
    #[error("Remote fetch throttled")]
    Throttled,

    /// Any other backend or transport failure.
    #[error("Remote fetch failed: {0}")]
    Failed(String),
}

/// Completion handler for a fetch; invoked exactly once.
pub type FetchCallback = Box<dyn FnOnce(Result<HashMap<String, String>, FetchError>) + Send>;

/// A remote configuration backend.
///
/// Values are delivered as strings; typed interpretation belongs to the
/// resolver. Implementations may complete on any thread, and may complete
/// inline.
pub trait RemoteConfigSource: Send + Sync {
    /// Fetch and activate the latest values.
    fn fetch(&self, timeout: Duration, done: FetchCallback);
}

/// Source that never has remote values, for builds without a backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopConfigSource;

impl RemoteConfigSource for NoopConfigSource {
    fn fetch(&self, _timeout: Duration, done: FetchCallback) {
        done(Err(FetchError::Failed("no remote source configured".to_string())));
    }
}
