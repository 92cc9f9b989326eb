//! Remote configuration schema.

use std::fmt;

/// Keys understood by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    /// Application identifier override (empty means no override).
    AppId,
    /// App-open unit identifier.
    OpenAdUnit,
    /// Interstitial unit identifier.
    InterAdUnit,
    /// Rewarded unit identifier.
    RewardAdUnit,
    /// Native unit identifier.
    NativeAdUnit,
    /// Frequency cap interval in seconds.
    AdFrequencySeconds,
    /// Paywall versus watch-ad-to-unlock gating.
    PremiumMode,
    /// Global ads kill switch.
    AdsMode,
}

impl ConfigKey {
    /// Every key, in schema order.
    pub const ALL: [ConfigKey; 8] = [
        ConfigKey::AppId,
        ConfigKey::OpenAdUnit,
        ConfigKey::InterAdUnit,
        ConfigKey::RewardAdUnit,
        ConfigKey::NativeAdUnit,
        ConfigKey::AdFrequencySeconds,
        ConfigKey::PremiumMode,
        ConfigKey::AdsMode,
    ];

    /// The parameter name in the remote source.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::AppId => "admob_app_id",
            ConfigKey::OpenAdUnit => "open_ad_unit",
            ConfigKey::InterAdUnit => "inter_ad_unit",
            ConfigKey::RewardAdUnit => "reward_ad_unit",
            ConfigKey::NativeAdUnit => "native_ad_unit",
            ConfigKey::AdFrequencySeconds => "ad_frequency_seconds",
            ConfigKey::PremiumMode => "premium_mode",
            ConfigKey::AdsMode => "ads_mode",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
