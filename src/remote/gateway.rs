//! Remote fetch gateway.
//!
//! Wraps an inherently asynchronous [`RemoteConfigSource`] in two modes:
//! - [`fetch_blocking`](RemoteFetchGateway::fetch_blocking) waits for the
//!   result up to a timeout. A result that lands after the wait gave up still
//!   updates the cache for the next lookup; nobody is woken for it.
//! - [`fetch_async`](RemoteFetchGateway::fetch_async) returns immediately and
//!   delivers the outcome once through the scheduler.

use crate::clock::Clock;
use crate::remote::source::{FetchError, RemoteConfigSource};
use crate::scheduler::Scheduler;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of the most recent fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// Nothing has been fetched in this process.
    NoFetchYet,
    /// The last fetch delivered values.
    Success,
    /// The last fetch failed.
    Failure,
    /// A blocking fetch stopped waiting before the source answered.
    TimedOut,
}

/// Fetches are numbered when issued so that a slow answer never replaces
/// the outcome of a newer fetch.
#[derive(Debug)]
struct FetchState {
    status: FetchStatus,
    last_success: Option<DateTime<Utc>>,
    issued: u64,
    // Newest fetch whose outcome set `status`.
    status_seq: u64,
    // Newest fetch whose values are in the cache.
    values_seq: u64,
}

struct GatewayInner {
    source: Arc<dyn RemoteConfigSource>,
    scheduler: Arc<dyn Scheduler>,
    clock: Arc<dyn Clock>,
    fetch_timeout: Duration,
    fetched: RwLock<HashMap<String, String>>,
    state: Mutex<FetchState>,
    // Serializes blocking fetches.
    fetch_lock: Mutex<()>,
}

/// Gateway to the remote configuration source.
///
/// Cheap to clone; clones share the same cache.
#[derive(Clone)]
pub struct RemoteFetchGateway {
    inner: Arc<GatewayInner>,
}

impl RemoteFetchGateway {
    /// Create a gateway. `fetch_timeout` bounds asynchronous fetches.
    pub fn new(
        source: Arc<dyn RemoteConfigSource>,
        scheduler: Arc<dyn Scheduler>,
        clock: Arc<dyn Clock>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                source,
                scheduler,
                clock,
                fetch_timeout,
                fetched: RwLock::new(HashMap::new()),
                state: Mutex::new(FetchState {
                    status: FetchStatus::NoFetchYet,
                    last_success: None,
                    issued: 0,
                    status_seq: 0,
                    values_seq: 0,
                }),
                fetch_lock: Mutex::new(()),
            }),
        }
    }

    /// Fetch and wait for the result, at most `timeout`.
    ///
    /// Returns whether fresh values were applied. Concurrent callers are
    /// serialized.
    pub fn fetch_blocking(&self, timeout: Duration) -> bool {
        let _serial = self
            .inner
            .fetch_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let seq = self.inner.next_seq();
        let (tx, rx) = mpsc::sync_channel::<bool>(1);
        let inner = Arc::clone(&self.inner);

        debug!(timeout_ms = timeout.as_millis() as u64, "Starting blocking remote fetch");
        self.inner.source.fetch(
            timeout,
            Box::new(move |outcome| {
                let applied = inner.apply(seq, outcome);
                // The waiter may have given up already.
                let _ = tx.send(applied);
            }),
        );

        match rx.recv_timeout(timeout) {
            Ok(applied) => applied,
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Remote fetch timed out; continuing with cached values"
                );
                let mut state = self.inner.state();
                if state.status_seq < seq {
                    state.status = FetchStatus::TimedOut;
                }
                false
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!("Remote source dropped the fetch callback");
                false
            }
        }
    }

    /// Fetch without blocking; `done` receives whether values were applied.
    pub fn fetch_async<F>(&self, done: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        let seq = self.inner.next_seq();
        let inner = Arc::clone(&self.inner);
        self.inner.source.fetch(
            self.inner.fetch_timeout,
            Box::new(move |outcome| {
                let applied = inner.apply(seq, outcome);
                inner.scheduler.post(Box::new(move || done(applied)));
            }),
        );
    }

    /// Last fetched value for `key`, if any.
    pub fn remote_value(&self, key: &str) -> Option<String> {
        self.inner
            .fetched
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Status of the most recent fetch.
    pub fn status(&self) -> FetchStatus {
        self.inner.state().status
    }

    /// When values were last applied.
    pub fn last_successful_fetch(&self) -> Option<DateTime<Utc>> {
        self.inner.state().last_success
    }
}

impl GatewayInner {
    fn state(&self) -> std::sync::MutexGuard<'_, FetchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_seq(&self) -> u64 {
        let mut state = self.state();
        state.issued += 1;
        state.issued
    }

    fn apply(&self, seq: u64, outcome: Result<HashMap<String, String>, FetchError>) -> bool {
        let mut state = self.state();
        match outcome {
            Ok(values) => {
                if seq < state.values_seq {
                    debug!(seq, newer = state.values_seq, "Discarding stale remote config");
                    return false;
                }
                let count = values.len();
                *self.fetched.write().unwrap_or_else(PoisonError::into_inner) = values;
                state.values_seq = seq;
                state.last_success = Some(self.clock.now_utc());
                if seq > state.status_seq {
                    state.status = FetchStatus::Success;
                    state.status_seq = seq;
                }
                info!(values = count, "Remote config fetched and activated");
                true
            }
            Err(e) => {
                if seq > state.status_seq {
                    state.status = FetchStatus::Failure;
                    state.status_seq = seq;
                }
                warn!(error = %e, "Remote config fetch failed; falling back to defaults");
                false
            }
        }
    }
}

impl std::fmt::Debug for RemoteFetchGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFetchGateway")
            .field("status", &self.status())
            .finish()
    }
}
