//! # Adwarden
//!
//! **Remote-configured ads and subscription gating for Rust hosts.**
//!
//! Adwarden sits between an application and three vendor services: a remote
//! configuration backend, an ad network SDK and a billing SDK. It decides
//! which ad units to use, when ads may be shown, and whether the user has
//! paid to have them removed.
//!
//! ## Features
//!
//! - **Three-tier configuration**: remote value, then application default,
//!   then library fallback, with a bounded blocking fetch at startup
//! - **App id override**: a validated remote identifier replaces the shipped
//!   one before the ad SDK starts
//! - **Ad lifecycle**: preload, frequency cap, exactly-once show outcomes,
//!   show timeouts and app-open expiry
//! - **Subscriptions**: connection retry with backoff, purchase, acknowledge,
//!   restore and a persisted subscription record
//! - **Premium gate**: one answer for "direct access, paywall or ad unlock"
//!
//! ## Quickstart
//!
//! ```no_run
//! use adwarden::{AdwardenConfig, AppDefaults, Collaborators, MonetizationManager};
//! use adwarden::ads::AdSlot;
//!
//! fn start(collaborators: Collaborators) -> Result<(), adwarden::AdwardenError> {
//!     let config = AdwardenConfig::new("premium_monthly").with_defaults(AppDefaults {
//!         ad_frequency_seconds: Some(45),
//!         ..Default::default()
//!     });
//!
//!     // Must be created inside a tokio runtime.
//!     let manager = MonetizationManager::new(config, collaborators)?;
//!     let report = manager.init()?;
//!     println!("ads initialized with {}", report.app_id);
//!
//!     if manager.premium()?.should_show_ad_for_feature() {
//!         manager.show_ad(AdSlot::Rewarded, |outcome| {
//!             println!("unlocked: {}", outcome.is_completed());
//!         })?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Concurrency
//!
//! Vendor SDK callbacks may arrive on any thread. Every component keeps its
//! state behind a lock and never holds it while calling into a vendor SDK or
//! a host callback. Deferred work (timeouts, retries, settle delays) runs on
//! a [`Scheduler`], normally the tokio runtime.
//!
//! See [`AdwardenConfig`] for configuration options.

#![deny(warnings)]
#![deny(missing_docs)]
#![doc(html_root_url = "https://docs.rs/adwarden/0.1.0")]

// Core modules
pub mod clock;
pub mod config;
pub mod errors;
pub mod scheduler;

// Configuration layer
pub mod identity;
pub mod remote;

// Persistence
pub mod store;

// Monetization layer
pub mod ads;
pub mod billing;
pub mod premium;

// Manager (main public API)
pub mod manager;

#[cfg(test)]
mod testing;

// Re-exports for public API
pub use clock::{Clock, SystemClock};
pub use config::{AdUnits, AdwardenConfig, AppDefaults};
pub use errors::AdwardenError;
pub use manager::{Collaborators, MonetizationManager, StartupReport};
pub use premium::{FeatureAccess, PremiumGate};
pub use remote::{ConfigResolver, FetchStatus, RemoteFetchGateway};
pub use scheduler::{Scheduler, TokioScheduler};
pub use store::{FileKeyValueStore, InMemoryKeyValueStore, KeyValueStore};

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
#[cfg(any(test, feature = "test-seams"))]
pub use scheduler::ManualScheduler;
