//! Three-tier configuration resolution.
//!
//! Every lookup walks the same chain and always yields a value:
//! 1. the last successfully fetched remote value, when present, non-blank and
//!    well-formed for the key's type;
//! 2. the application default, when one was supplied;
//! 3. the library constant.

use crate::ads::{AdSlot, FrequencyPolicy};
use crate::config::{AdUnits, AppDefaults, DEFAULT_AD_FREQUENCY_SECONDS};
use crate::remote::gateway::RemoteFetchGateway;
use crate::remote::keys::ConfigKey;
use crate::AdwardenError;
use tracing::trace;

/// Which tier a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// Fetched from the remote source.
    RemoteSource,
    /// Supplied by the application at construction.
    AppDefault,
    /// Built into the library.
    LibraryFallback,
}

/// A resolved value with its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValue<T> {
    /// The value.
    pub value: T,
    /// Where it came from.
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

const TRUTHY: [&str; 6] = ["1", "true", "t", "yes", "y", "on"];
const FALSY: [&str; 6] = ["0", "false", "f", "no", "n", "off"];

/// Resolves configuration values through the three tiers.
#[derive(Debug)]
pub struct ConfigResolver {
    defaults: AppDefaults,
    gateway: RemoteFetchGateway,
}

impl ConfigResolver {
    /// Create a resolver.
    ///
    /// # Errors
    /// Returns `ConfigError` if the application defaults fail validation.
    pub fn new(defaults: AppDefaults, gateway: RemoteFetchGateway) -> Result<Self, AdwardenError> {
        defaults.validate()?;
        Ok(Self { defaults, gateway })
    }

    /// The gateway feeding the remote tier.
    pub fn gateway(&self) -> &RemoteFetchGateway {
        &self.gateway
    }

    /// Resolve a string-typed key.
    pub fn resolve_string(&self, key: ConfigKey) -> ConfigValue<String> {
        self.resolve_with(key, parse_string, library_string(key).to_string())
    }

    /// Resolve a positive-integer key.
    pub fn resolve_u32(&self, key: ConfigKey) -> ConfigValue<u32> {
        self.resolve_with(key, parse_positive, library_u32(key))
    }

    /// Resolve a boolean key.
    pub fn resolve_bool(&self, key: ConfigKey) -> ConfigValue<bool> {
        self.resolve_with(key, parse_bool, library_bool(key))
    }

    /// Unit identifier for an ad slot.
    pub fn unit_id(&self, slot: AdSlot) -> String {
        let key = match slot {
            AdSlot::AppOpen => ConfigKey::OpenAdUnit,
            AdSlot::Interstitial => ConfigKey::InterAdUnit,
            AdSlot::Rewarded => ConfigKey::RewardAdUnit,
            AdSlot::Native => ConfigKey::NativeAdUnit,
        };
        self.resolve_string(key).value
    }

    /// App-open unit identifier.
    pub fn open_ad_unit(&self) -> String {
        self.unit_id(AdSlot::AppOpen)
    }

    /// Interstitial unit identifier.
    pub fn inter_ad_unit(&self) -> String {
        self.unit_id(AdSlot::Interstitial)
    }

    /// Rewarded unit identifier.
    pub fn reward_ad_unit(&self) -> String {
        self.unit_id(AdSlot::Rewarded)
    }

    /// Native unit identifier.
    pub fn native_ad_unit(&self) -> String {
        self.unit_id(AdSlot::Native)
    }

    /// Frequency cap interval in seconds.
    pub fn ad_frequency_seconds(&self) -> u32 {
        self.resolve_u32(ConfigKey::AdFrequencySeconds).value
    }

    /// Frequency policy built from the resolved interval.
    pub fn frequency_policy(&self) -> FrequencyPolicy {
        // The resolved interval is positive on every tier.
        FrequencyPolicy::new(self.ad_frequency_seconds())
            .unwrap_or_else(|_| FrequencyPolicy::default())
    }

    /// Application identifier override, if any tier supplies one.
    pub fn app_id_override(&self) -> Option<String> {
        let resolved = self.resolve_string(ConfigKey::AppId);
        match resolved.source {
            ConfigSource::LibraryFallback => None,
            _ => Some(resolved.value),
        }
    }

    /// Whether features are gated behind the paywall.
    pub fn premium_mode(&self) -> bool {
        self.resolve_bool(ConfigKey::PremiumMode).value
    }

    /// Global ads kill switch; `false` disables every ad surface.
    pub fn ads_mode(&self) -> bool {
        self.resolve_bool(ConfigKey::AdsMode).value
    }

    fn resolve_with<T>(
        &self,
        key: ConfigKey,
        parse: fn(&str) -> Option<T>,
        fallback: T,
    ) -> ConfigValue<T> {
        if let Some(value) = self
            .gateway
            .remote_value(key.as_str())
            .as_deref()
            .and_then(parse)
        {
            trace!(%key, "Resolved from remote");
            return ConfigValue::new(value, ConfigSource::RemoteSource);
        }

        if let Some(value) = self.app_default(key).as_deref().and_then(parse) {
            trace!(%key, "Resolved from app default");
            return ConfigValue::new(value, ConfigSource::AppDefault);
        }

        trace!(%key, "Resolved from library fallback");
        ConfigValue::new(fallback, ConfigSource::LibraryFallback)
    }

    fn app_default(&self, key: ConfigKey) -> Option<String> {
        let d = &self.defaults;
        match key {
            ConfigKey::AppId => d.app_id.clone(),
            ConfigKey::OpenAdUnit => d.open_ad_unit.clone(),
            ConfigKey::InterAdUnit => d.inter_ad_unit.clone(),
            ConfigKey::RewardAdUnit => d.reward_ad_unit.clone(),
            ConfigKey::NativeAdUnit => d.native_ad_unit.clone(),
            ConfigKey::AdFrequencySeconds => d.ad_frequency_seconds.map(|v| v.to_string()),
            ConfigKey::PremiumMode => d.premium_mode.map(|v| v.to_string()),
            ConfigKey::AdsMode => d.ads_mode.map(|v| v.to_string()),
        }
    }
}

fn library_string(key: ConfigKey) -> &'static str {
    match key {
        ConfigKey::AppId => "",
        ConfigKey::OpenAdUnit => AdUnits::OPEN,
        ConfigKey::InterAdUnit => AdUnits::INTERSTITIAL,
        ConfigKey::RewardAdUnit => AdUnits::REWARDED,
        ConfigKey::NativeAdUnit => AdUnits::NATIVE,
        ConfigKey::AdFrequencySeconds | ConfigKey::PremiumMode | ConfigKey::AdsMode => "",
    }
}

fn library_u32(key: ConfigKey) -> u32 {
    match key {
        ConfigKey::AdFrequencySeconds => DEFAULT_AD_FREQUENCY_SECONDS,
        _ => 0,
    }
}

fn library_bool(key: ConfigKey) -> bool {
    matches!(key, ConfigKey::AdsMode)
}

fn parse_string(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse_positive(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|v| *v > 0)
}

fn parse_bool(raw: &str) -> Option<bool> {
    let raw = raw.trim();
    if TRUTHY.iter().any(|t| raw.eq_ignore_ascii_case(t)) {
        Some(true)
    } else if FALSY.iter().any(|f| raw.eq_ignore_ascii_case(f)) {
        Some(false)
    } else {
        None
    }
}
