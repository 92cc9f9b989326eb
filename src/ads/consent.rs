//! Consent gathering before ad requests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Error reported by the consent SDK.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("consent error {code}: {message}")]
pub struct ConsentError {
    /// Vendor error code.
    pub code: i32,
    /// Vendor message.
    pub message: String,
}

/// Completion handler for consent SDK calls.
pub type ConsentCallback = Box<dyn FnOnce(Result<(), ConsentError>) + Send>;

/// A consent-management SDK.
pub trait ConsentProvider: Send + Sync {
    /// Refresh the consent requirements for this user.
    fn request_info_update(&self, done: ConsentCallback);

    /// Whether ads may be requested under the consent gathered so far.
    fn can_request_ads(&self) -> bool;

    /// Show the consent form if the user still has to answer it.
    fn load_and_show_form_if_required(&self, done: ConsentCallback);
}

/// Sequences the consent SDK: info update, then form, then verdict.
///
/// Gathering runs once per process. Errors from either step are logged and
/// the provider's current verdict is used.
pub struct ConsentCoordinator {
    provider: Arc<dyn ConsentProvider>,
    started: AtomicBool,
}

impl ConsentCoordinator {
    /// Wrap a consent provider.
    pub fn new(provider: Arc<dyn ConsentProvider>) -> Self {
        Self {
            provider,
            started: AtomicBool::new(false),
        }
    }

    /// Whether ads may be requested right now.
    pub fn can_request_ads(&self) -> bool {
        self.provider.can_request_ads()
    }

    /// Gather consent and report whether ads may be requested.
    pub fn gather<F>(&self, done: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        if self.started.swap(true, Ordering::AcqRel) {
            debug!("Consent already gathered this session");
            done(self.provider.can_request_ads());
            return;
        }

        let provider = Arc::clone(&self.provider);
        self.provider.request_info_update(Box::new(move |update| {
            if let Err(e) = update {
                warn!(error = %e, "Consent info update failed");
                done(provider.can_request_ads());
                return;
            }

            let form_provider = Arc::clone(&provider);
            provider.load_and_show_form_if_required(Box::new(move |form| {
                if let Err(e) = form {
                    warn!(error = %e, "Consent form failed");
                }
                let allowed = form_provider.can_request_ads();
                info!(can_request_ads = allowed, "Consent gathering finished");
                done(allowed);
            }));
        }));
    }
}

impl std::fmt::Debug for ConsentCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsentCoordinator")
            .field("started", &self.started.load(Ordering::Acquire))
            .finish()
    }
}
