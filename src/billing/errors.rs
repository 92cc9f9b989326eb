//! User-facing classification of billing failures.

use crate::billing::client::BillingResponseCode;
use thiserror::Error;

/// Broad class of a purchase failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseErrorCategory {
    /// The user backed out.
    UserCancelled,
    /// Connectivity or service availability.
    Network,
    /// Billing or the product is unavailable or misconfigured.
    Configuration,
    /// The user already owns the product.
    AlreadyOwned,
    /// Anything else.
    Unknown,
}

/// A classified billing failure with a message suitable for display.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PurchaseError {
    /// Failure class.
    pub category: PurchaseErrorCategory,
    /// Response code that produced this error.
    pub code: BillingResponseCode,
    /// Message for the user.
    pub message: String,
    /// What the user can do about it.
    pub suggestion: Option<String>,
    /// Whether offering a retry makes sense.
    pub retryable: bool,
}

impl PurchaseError {
    fn new(
        category: PurchaseErrorCategory,
        code: BillingResponseCode,
        message: &str,
        suggestion: Option<&str>,
        retryable: bool,
    ) -> Self {
        Self {
            category,
            code,
            message: message.to_string(),
            suggestion: suggestion.map(str::to_string),
            retryable,
        }
    }

    /// Classify a billing response code.
    pub fn from_code(code: BillingResponseCode) -> Self {
        use BillingResponseCode as C;
        use PurchaseErrorCategory as Cat;

        match code {
            C::UserCanceled => Self::new(Cat::UserCancelled, code, "Purchase cancelled", None, false),
            C::NetworkError => Self::new(
                Cat::Network,
                code,
                "Network error. Please check your connection.",
                Some("Check your internet connection and try again."),
                true,
            ),
            C::ServiceUnavailable | C::ServiceDisconnected => Self::new(
                Cat::Network,
                code,
                "Billing service is temporarily unavailable.",
                Some("Please try again in a few minutes."),
                true,
            ),
            C::BillingUnavailable => Self::new(
                Cat::Configuration,
                code,
                "Billing is not available on this device.",
                Some("Make sure the store app is installed and you are signed in."),
                false,
            ),
            C::ItemUnavailable => Self::new(
                Cat::Configuration,
                code,
                "This subscription is not available right now.",
                Some("Please try again later."),
                false,
            ),
            C::FeatureNotSupported => Self::new(
                Cat::Configuration,
                code,
                "Subscriptions are not supported on this device.",
                Some("Update the store app and try again."),
                false,
            ),
            C::DeveloperError => Self::new(
                Cat::Configuration,
                code,
                "The purchase could not be started.",
                None,
                false,
            ),
            C::ItemAlreadyOwned => Self::new(
                Cat::AlreadyOwned,
                code,
                "You already own this subscription.",
                Some("Use Restore Purchases to activate it."),
                false,
            ),
            C::ItemNotOwned => Self::new(
                Cat::Unknown,
                code,
                "This subscription is not owned by your account.",
                None,
                false,
            ),
            C::Error | C::Unknown(_) | C::Ok => Self::new(
                Cat::Unknown,
                code,
                "An unexpected error occurred.",
                Some("Please try again."),
                true,
            ),
        }
    }

    /// Error for a purchase attempted before the product was loaded.
    pub fn product_unavailable() -> Self {
        Self::new(
            PurchaseErrorCategory::Configuration,
            BillingResponseCode::ItemUnavailable,
            "Subscription details are not loaded yet.",
            Some("Please try again in a moment."),
            true,
        )
    }

    /// Message with the suggestion appended, for single-line display.
    pub fn display_message(&self) -> String {
        match &self.suggestion {
            Some(suggestion) => format!("{} {}", self.message, suggestion),
            None => self.message.clone(),
        }
    }
}
