//! Frequency cap enforcement.
//!
//! App-open and interstitial displays must be spaced by at least the
//! configured interval, measured from the previous dismissal.

use crate::config::DEFAULT_AD_FREQUENCY_SECONDS;
use crate::AdwardenError;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Minimum spacing between displays of a capped slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrequencyPolicy {
    interval_seconds: u32,
}

/// Result of a frequency check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyCheck {
    /// The slot may be shown.
    Allowed,
    /// The slot is capped for `remaining` more time.
    Capped {
        /// Time until the cap lifts.
        remaining: Duration,
    },
}

impl FrequencyPolicy {
    /// Create a policy.
    ///
    /// # Errors
    /// Returns `ConfigError` for a zero interval.
    pub fn new(interval_seconds: u32) -> Result<Self, AdwardenError> {
        if interval_seconds == 0 {
            return Err(AdwardenError::ConfigError(
                "frequency interval must be positive".to_string(),
            ));
        }
        Ok(Self { interval_seconds })
    }

    /// Interval in seconds.
    pub fn interval_seconds(&self) -> u32 {
        self.interval_seconds
    }

    /// Check whether a display at `now` is allowed.
    ///
    /// # Arguments
    /// * `last_dismissed_at` - When the previous ad of this slot was closed
    /// * `now` - Current time
    pub fn check(&self, last_dismissed_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> FrequencyCheck {
        let Some(dismissed) = last_dismissed_at else {
            return FrequencyCheck::Allowed;
        };

        let interval = chrono::Duration::seconds(i64::from(self.interval_seconds));
        let elapsed = now - dismissed;
        if elapsed >= interval {
            return FrequencyCheck::Allowed;
        }

        // A clock that moved backwards still caps for at most one interval.
        let remaining = (interval - elapsed.max(chrono::Duration::zero()))
            .to_std()
            .unwrap_or_default();
        FrequencyCheck::Capped { remaining }
    }
}

impl Default for FrequencyPolicy {
    fn default() -> Self {
        Self {
            interval_seconds: DEFAULT_AD_FREQUENCY_SECONDS,
        }
    }
}
