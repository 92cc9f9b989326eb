//! Adwarden error types.

use thiserror::Error;

/// Errors returned by constructors and lifecycle operations.
///
/// Ad and billing outcomes are not reported through this type: they are
/// delivered to callbacks as [`AdFailure`](crate::ads::AdFailure) and
/// [`PurchaseError`](crate::billing::PurchaseError) values.
#[derive(Debug, Error)]
pub enum AdwardenError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A component was used before `init` completed.
    #[error("{component} used before initialization")]
    NotInitialized {
        /// Name of the component that was accessed.
        component: &'static str,
    },

    /// `init` was called more than once, or after `shutdown`.
    #[error("Manager already initialized or shut down")]
    AlreadyInitialized,

    /// Persistent key-value store I/O error.
    #[error("Store I/O error: {0}")]
    StoreIO(String),

    /// The process-visible identifier store rejected a write.
    #[error("Identifier store error: {0}")]
    IdentifierStore(String),

    /// No async runtime is available to drive scheduled work.
    #[error("Runtime unavailable: {0}")]
    Runtime(String),
}
