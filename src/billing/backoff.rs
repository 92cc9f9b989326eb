//! Retry policy for billing service connections.
//!
//! Delays grow exponentially from a base chosen by the failure class and are
//! capped per class: `min(base * factor^retry, cap)` where `retry` counts
//! from zero.

use crate::billing::client::BillingResponseCode;
use crate::AdwardenError;
use std::time::Duration;

/// Exponential backoff parameters for one failure class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    /// Delay before the first retry.
    pub base: Duration,
    /// Upper bound on any delay.
    pub max_backoff: Duration,
    /// Growth factor per retry.
    pub factor: f64,
}

impl BackoffConfig {
    /// Delay before retry number `retry` (zero-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let exponent = retry.min(32) as i32;
        let secs = self.base.as_secs_f64() * self.factor.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_backoff.as_secs_f64()))
    }
}

/// What to do after a failed connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Connect again after `delay`.
    Retry {
        /// Number of the failed attempt (1-based).
        attempt: u32,
        /// Wait before the next attempt.
        delay: Duration,
    },
    /// Stop retrying.
    GiveUp,
}

/// Connection retry policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total connection attempts, including the first.
    pub max_attempts: u32,
    /// Backoff for network errors.
    pub network: BackoffConfig,
    /// Backoff for service-unavailable and disconnection errors.
    pub service: BackoffConfig,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            network: BackoffConfig {
                base: Duration::from_secs(1),
                max_backoff: Duration::from_secs(8),
                factor: 2.0,
            },
            service: BackoffConfig {
                base: Duration::from_secs(2),
                max_backoff: Duration::from_secs(30),
                factor: 2.0,
            },
        }
    }
}

impl RetryPolicy {
    /// Validate the policy.
    ///
    /// # Errors
    /// Returns `ConfigError` when no attempt is allowed or a backoff is degenerate.
    pub fn validate(&self) -> Result<(), AdwardenError> {
        if self.max_attempts == 0 {
            return Err(AdwardenError::ConfigError(
                "retry max_attempts must be at least 1".to_string(),
            ));
        }
        for (name, backoff) in [("network", &self.network), ("service", &self.service)] {
            if backoff.factor < 1.0 || !backoff.factor.is_finite() {
                return Err(AdwardenError::ConfigError(format!(
                    "{name} backoff factor must be finite and >= 1"
                )));
            }
            if backoff.max_backoff < backoff.base {
                return Err(AdwardenError::ConfigError(format!(
                    "{name} backoff cap is below its base delay"
                )));
            }
        }
        Ok(())
    }

    /// Whether a connection failure with `code` may be retried.
    pub fn is_retryable(code: BillingResponseCode) -> bool {
        code.is_network_class()
    }

    /// Delay after failed attempt `attempt` (1-based) with `code`.
    pub fn delay_for(&self, code: BillingResponseCode, attempt: u32) -> Duration {
        let backoff = match code {
            BillingResponseCode::NetworkError => &self.network,
            _ => &self.service,
        };
        backoff.delay(attempt.saturating_sub(1))
    }

    /// Decide what follows failed attempt `attempt` (1-based).
    pub fn decide(&self, code: BillingResponseCode, attempt: u32) -> RetryDecision {
        if !Self::is_retryable(code) || attempt >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry {
            attempt,
            delay: self.delay_for(code, attempt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_allows_three_attempts() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_delays_grow_and_cap() {
        let backoff = BackoffConfig {
            base: Duration::from_secs(1),
            max_backoff: Duration::from_secs(5),
            factor: 2.0,
        };
        assert_eq!(backoff.delay(0), Duration::from_secs(1));
        assert_eq!(backoff.delay(1), Duration::from_secs(2));
        assert_eq!(backoff.delay(2), Duration::from_secs(4));
        assert_eq!(backoff.delay(3), Duration::from_secs(5));
        assert_eq!(backoff.delay(500), Duration::from_secs(5));
    }

    #[test]
    fn test_network_errors_cap_lower_than_service_errors() {
        let policy = RetryPolicy::default();
        let network = policy.delay_for(BillingResponseCode::NetworkError, 20);
        let service = policy.delay_for(BillingResponseCode::ServiceUnavailable, 20);
        assert_eq!(network, Duration::from_secs(8));
        assert_eq!(service, Duration::from_secs(30));
        assert!(network < service);
    }

    #[test]
    fn test_only_connectivity_failures_retry() {
        assert!(RetryPolicy::is_retryable(BillingResponseCode::NetworkError));
        assert!(RetryPolicy::is_retryable(BillingResponseCode::ServiceUnavailable));
        assert!(!RetryPolicy::is_retryable(BillingResponseCode::BillingUnavailable));
        assert!(!RetryPolicy::is_retryable(BillingResponseCode::DeveloperError));
    }

    #[test]
    fn test_gives_up_at_max_attempts() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.decide(BillingResponseCode::NetworkError, 1),
            RetryDecision::Retry {
                attempt: 1,
                delay: Duration::from_secs(1)
            }
        );
        assert_eq!(
            policy.decide(BillingResponseCode::NetworkError, 2),
            RetryDecision::Retry {
                attempt: 2,
                delay: Duration::from_secs(2)
            }
        );
        assert_eq!(
            policy.decide(BillingResponseCode::NetworkError, 3),
            RetryDecision::GiveUp
        );
    }

    #[test]
    fn test_non_retryable_gives_up_immediately() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.decide(BillingResponseCode::BillingUnavailable, 1),
            RetryDecision::GiveUp
        );
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };
        assert!(matches!(policy.validate(), Err(AdwardenError::ConfigError(_))));
    }
}
