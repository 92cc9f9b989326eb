//! Premium access gating.
//!
//! Combines the persisted subscription flag with the remote premium mode:
//! - subscribed: direct access, no ads, no paywall
//! - premium mode on, not subscribed: paywall
//! - premium mode off, not subscribed: watch an ad to unlock

use crate::remote::ConfigResolver;
use crate::store::KeyValueStore;
use crate::AdwardenError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Store key of the persisted subscription flag.
pub const SUBSCRIPTION_KEY: &str = "has_active_subscription";

/// How a gated feature is unlocked for the current user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureAccess {
    /// The user is subscribed.
    Direct,
    /// Show the subscription paywall.
    Paywall,
    /// Show a rewarded ad to unlock.
    WatchAd,
}

impl FeatureAccess {
    /// Decide access for a (premium mode, subscription) pair.
    ///
    /// # Arguments
    /// * `premium_mode` - Remote flag selecting paywall over ad-unlock
    /// * `subscribed` - Whether the user has an active subscription
    pub fn decide(premium_mode: bool, subscribed: bool) -> Self {
        // 1. Subscribers always get in
        if subscribed {
            return FeatureAccess::Direct;
        }

        // 2. Otherwise the remote mode picks the unlock path
        if premium_mode {
            FeatureAccess::Paywall
        } else {
            FeatureAccess::WatchAd
        }
    }
}

/// Owns the subscription record and answers premium questions.
pub struct PremiumGate {
    store: Arc<dyn KeyValueStore>,
    resolver: Arc<ConfigResolver>,
    subscribed: AtomicBool,
}

impl PremiumGate {
    /// Load the subscription record from `store`.
    pub fn new(store: Arc<dyn KeyValueStore>, resolver: Arc<ConfigResolver>) -> Self {
        let subscribed = store.get_bool(SUBSCRIPTION_KEY, false);
        Self {
            store,
            resolver,
            subscribed: AtomicBool::new(subscribed),
        }
    }

    /// Whether the user has an active subscription.
    pub fn has_premium_access(&self) -> bool {
        self.subscribed.load(Ordering::Acquire)
    }

    /// Whether gated features should show the paywall.
    pub fn should_show_paywall(&self) -> bool {
        self.feature_access() == FeatureAccess::Paywall
    }

    /// Whether gated features should offer an ad unlock.
    pub fn should_show_ad_for_feature(&self) -> bool {
        self.feature_access() == FeatureAccess::WatchAd
    }

    /// Access decision for the current state.
    pub fn feature_access(&self) -> FeatureAccess {
        FeatureAccess::decide(self.resolver.premium_mode(), self.has_premium_access())
    }

    /// Update the subscription record.
    ///
    /// The in-memory flag changes even if persisting fails.
    pub(crate) fn set_subscription_active(&self, active: bool) -> Result<(), AdwardenError> {
        let previous = self.subscribed.swap(active, Ordering::AcqRel);
        if previous != active {
            info!(active, "Subscription status changed");
        }
        self.store.put_bool(SUBSCRIPTION_KEY, active)
    }
}

impl std::fmt::Debug for PremiumGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PremiumGate")
            .field("subscribed", &self.has_premium_access())
            .finish()
    }
}
