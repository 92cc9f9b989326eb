//! Subscription billing: connection retries, purchase flows, restore and pricing.

pub mod backoff;
pub mod client;
pub mod errors;
pub mod orchestrator;
pub mod pricing;
pub mod state;

pub use backoff::{BackoffConfig, RetryDecision, RetryPolicy};
pub use client::{
    AckCallback, BillingClient, BillingFlowParams, BillingResponseCode, BillingResult,
    ConnectCallback, PricingPhase, ProductDetails, ProductsCallback, Purchase, PurchaseState,
    PurchasesCallback, SubscriptionOffer,
};
pub use errors::{PurchaseError, PurchaseErrorCategory};
pub use orchestrator::{token_fingerprint, ActivationSource, SubscriptionOrchestrator};
pub use pricing::{BillingPeriod, PeriodUnit, PricingSummary};
pub use state::{BillingConnectionState, PurchaseFlowState, SubscriptionStatus};
