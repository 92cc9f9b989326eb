//! Adwarden configuration.
//!
//! Configuration values resolve through three tiers: the remote source, the
//! application-supplied [`AppDefaults`], and the library constants in
//! [`AdUnits`] and friends. This module owns the last two tiers and the
//! validation that keeps the middle tier honest.

use crate::billing::RetryPolicy;
use crate::identity::is_valid_app_id;
use crate::AdwardenError;
use std::time::Duration;

/// Library built-in ad identifiers, the last resolution tier.
///
/// These are the publicly documented test identifiers, so an application
/// that never configures anything still gets fillable (test) ads.
#[derive(Debug, Clone, Copy)]
pub struct AdUnits;

impl AdUnits {
    /// Application identifier.
    pub const APP_ID: &'static str = "ca-app-pub-3940256099942544~3347511713";
    /// App-open unit.
    pub const OPEN: &'static str = "ca-app-pub-3940256099942544/9257395921";
    /// Interstitial unit.
    pub const INTERSTITIAL: &'static str = "ca-app-pub-3940256099942544/1033173712";
    /// Rewarded unit.
    pub const REWARDED: &'static str = "ca-app-pub-3940256099942544/5224354917";
    /// Native advanced unit.
    pub const NATIVE: &'static str = "ca-app-pub-3940256099942544/2247696110";
}

/// Minimum seconds between two app-open or interstitial displays.
pub const DEFAULT_AD_FREQUENCY_SECONDS: u32 = 30;

/// Upper bound on a blocking remote fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_millis(5000);

/// How long a show request may wait for the ad to appear.
pub const DEFAULT_SHOW_TIMEOUT: Duration = Duration::from_secs(10);

/// Delay between re-querying purchases and judging a restore.
pub const DEFAULT_RESTORE_SETTLE_DELAY: Duration = Duration::from_millis(1500);

/// Application-supplied defaults, the middle resolution tier.
///
/// Every field is optional. A field left `None` falls through to the
/// library constant; a field that is provided must be usable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppDefaults {
    /// Application identifier override.
    pub app_id: Option<String>,
    /// App-open unit identifier.
    pub open_ad_unit: Option<String>,
    /// Interstitial unit identifier.
    pub inter_ad_unit: Option<String>,
    /// Rewarded unit identifier.
    pub reward_ad_unit: Option<String>,
    /// Native unit identifier.
    pub native_ad_unit: Option<String>,
    /// Frequency cap interval in seconds.
    pub ad_frequency_seconds: Option<u32>,
    /// Paywall (`true`) versus watch-ad-to-unlock (`false`) gating.
    pub premium_mode: Option<bool>,
    /// Global ads kill switch.
    pub ads_mode: Option<bool>,
}

impl AppDefaults {
    /// Validate defaults for obvious errors.
    pub fn validate(&self) -> Result<(), AdwardenError> {
        let units = [
            ("open_ad_unit", &self.open_ad_unit),
            ("inter_ad_unit", &self.inter_ad_unit),
            ("reward_ad_unit", &self.reward_ad_unit),
            ("native_ad_unit", &self.native_ad_unit),
        ];
        for (name, value) in units {
            if matches!(value, Some(v) if v.trim().is_empty()) {
                return Err(AdwardenError::ConfigError(format!(
                    "{} cannot be blank",
                    name
                )));
            }
        }

        if let Some(app_id) = &self.app_id {
            if !is_valid_app_id(app_id) {
                return Err(AdwardenError::ConfigError(format!(
                    "app_id has an invalid format: {:?}",
                    app_id
                )));
            }
        }

        if self.ad_frequency_seconds == Some(0) {
            return Err(AdwardenError::ConfigError(
                "ad_frequency_seconds must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// Top-level configuration for a [`MonetizationManager`](crate::MonetizationManager).
#[derive(Debug, Clone)]
pub struct AdwardenConfig {
    /// Application defaults for the resolver's middle tier.
    pub defaults: AppDefaults,

    /// Bound on the blocking fetch performed during `init`.
    pub fetch_timeout: Duration,

    /// Default show timeout for ad display requests.
    pub show_timeout: Duration,

    /// Subscription product identifier in the billing catalogue.
    pub subscription_product_id: String,

    /// Settle delay before a restore is judged.
    pub restore_settle_delay: Duration,

    /// Namespace for persisted flags.
    /// Each application should use a unique namespace to avoid collisions.
    pub store_namespace: String,

    /// Billing connection retry policy.
    pub retry: RetryPolicy,
}

impl AdwardenConfig {
    /// Configuration with library defaults for everything but the product.
    pub fn new(subscription_product_id: impl Into<String>) -> Self {
        Self {
            defaults: AppDefaults::default(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            show_timeout: DEFAULT_SHOW_TIMEOUT,
            subscription_product_id: subscription_product_id.into(),
            restore_settle_delay: DEFAULT_RESTORE_SETTLE_DELAY,
            store_namespace: "adwarden".to_string(),
            retry: RetryPolicy::default(),
        }
    }

    /// Replace the application defaults.
    pub fn with_defaults(mut self, defaults: AppDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), AdwardenError> {
        self.defaults.validate()?;

        if self.subscription_product_id.trim().is_empty() {
            return Err(AdwardenError::ConfigError(
                "subscription_product_id cannot be empty".to_string(),
            ));
        }
        if self.store_namespace.trim().is_empty() {
            return Err(AdwardenError::ConfigError(
                "store_namespace cannot be empty".to_string(),
            ));
        }
        if self.fetch_timeout.is_zero() {
            return Err(AdwardenError::ConfigError(
                "fetch_timeout must be positive".to_string(),
            ));
        }
        if self.show_timeout.is_zero() {
            return Err(AdwardenError::ConfigError(
                "show_timeout must be positive".to_string(),
            ));
        }
        self.retry.validate()
    }
}
