//! Observable billing states.

use crate::billing::errors::PurchaseError;

/// Progress of a purchase or restore, as shown by the purchase dialog.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PurchaseFlowState {
    /// Nothing in progress.
    #[default]
    Idle,
    /// A purchase or restore is running.
    Processing,
    /// Completed. Carries a message for the user.
    Success(String),
    /// The user cancelled.
    Cancelled,
    /// Connectivity failure.
    NetworkError(String),
    /// Payment is awaiting completion outside the app.
    Pending(String),
    /// Any other failure.
    Error(String),
}

impl PurchaseFlowState {
    /// Whether the state ends a flow.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Idle | Self::Processing)
    }
}

/// Connection to the billing service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BillingConnectionState {
    /// Not connected.
    #[default]
    Disconnected,
    /// A connection attempt is running.
    Connecting,
    /// Connected.
    Connected,
    /// Attempt `n` failed; another will follow after a delay.
    FailedRetrying(u32),
    /// Retries exhausted or the failure was not retryable.
    FailedTerminal,
}

/// Subscription as last determined from the store.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubscriptionStatus {
    /// Not determined yet.
    #[default]
    Unknown,
    /// An active, purchased subscription exists.
    Active,
    /// No subscription.
    Inactive,
    /// A purchase is awaiting payment.
    Pending,
    /// The billing service could not be reached.
    Error(PurchaseError),
}

impl SubscriptionStatus {
    /// Whether the subscription is active.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}
