//! Billing SDK seam.
//!
//! Mirrors the store billing library's surface: an async connection, product
//! and purchase queries, a synchronous flow launch and acknowledgement.
//! Purchase updates are pushed by the host into
//! [`SubscriptionOrchestrator::on_purchases_updated`](crate::billing::SubscriptionOrchestrator::on_purchases_updated).

use std::fmt;

/// Response codes reported by the billing SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BillingResponseCode {
    /// Success.
    Ok,
    /// The user backed out of the flow.
    UserCanceled,
    /// The billing service is temporarily unreachable.
    ServiceUnavailable,
    /// Billing is not available on this device or account.
    BillingUnavailable,
    /// The requested product is not available for purchase.
    ItemUnavailable,
    /// Invalid arguments were passed to the SDK.
    DeveloperError,
    /// Fatal error during the API action.
    Error,
    /// The user already owns the item.
    ItemAlreadyOwned,
    /// The item is not owned by the user.
    ItemNotOwned,
    /// A network error occurred during the operation.
    NetworkError,
    /// The connection to the billing service was lost.
    ServiceDisconnected,
    /// The requested feature is not supported by the store app.
    FeatureNotSupported,
    /// A code this crate does not know about.
    Unknown(i32),
}

impl BillingResponseCode {
    /// Map a raw SDK code.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Ok,
            1 => Self::UserCanceled,
            2 => Self::ServiceUnavailable,
            3 => Self::BillingUnavailable,
            4 => Self::ItemUnavailable,
            5 => Self::DeveloperError,
            6 => Self::Error,
            7 => Self::ItemAlreadyOwned,
            8 => Self::ItemNotOwned,
            12 => Self::NetworkError,
            -1 => Self::ServiceDisconnected,
            -2 => Self::FeatureNotSupported,
            other => Self::Unknown(other),
        }
    }

    /// The raw SDK code.
    pub fn code(&self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::UserCanceled => 1,
            Self::ServiceUnavailable => 2,
            Self::BillingUnavailable => 3,
            Self::ItemUnavailable => 4,
            Self::DeveloperError => 5,
            Self::Error => 6,
            Self::ItemAlreadyOwned => 7,
            Self::ItemNotOwned => 8,
            Self::NetworkError => 12,
            Self::ServiceDisconnected => -1,
            Self::FeatureNotSupported => -2,
            Self::Unknown(code) => *code,
        }
    }

    /// Whether this is a transient connectivity failure.
    pub fn is_network_class(&self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::ServiceUnavailable | Self::ServiceDisconnected
        )
    }
}

impl fmt::Display for BillingResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

/// Result of a billing SDK call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingResult {
    /// Response code.
    pub code: BillingResponseCode,
    /// Vendor debug message.
    pub debug_message: String,
}

impl BillingResult {
    /// A successful result.
    pub fn ok() -> Self {
        Self::new(BillingResponseCode::Ok, "")
    }

    /// Create a result.
    pub fn new(code: BillingResponseCode, debug_message: impl Into<String>) -> Self {
        Self {
            code,
            debug_message: debug_message.into(),
        }
    }

    /// Whether the call succeeded.
    pub fn is_ok(&self) -> bool {
        self.code == BillingResponseCode::Ok
    }
}

/// State of a purchase as reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseState {
    /// Paid for.
    Purchased,
    /// Awaiting payment (e.g. cash at a store).
    Pending,
    /// Anything else.
    Unspecified,
}

/// A purchase record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Purchase {
    /// Products covered by this purchase.
    pub product_ids: Vec<String>,
    /// Opaque token identifying the purchase.
    pub purchase_token: String,
    /// Store order identifier.
    pub order_id: Option<String>,
    /// Purchase state.
    pub state: PurchaseState,
    /// Whether the purchase has been acknowledged.
    pub acknowledged: bool,
    /// Whether the subscription renews automatically.
    pub auto_renewing: bool,
}

/// One phase of a subscription offer (trial, intro price, recurring price).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingPhase {
    /// Price formatted for display, e.g. `"$4.99"`.
    pub formatted_price: String,
    /// Price in micro-units. Zero for a free trial.
    pub price_micros: i64,
    /// ISO 4217 currency code.
    pub currency_code: String,
    /// ISO 8601 billing period, e.g. `"P1M"`.
    pub billing_period: String,
    /// Number of cycles this phase lasts. Zero for an infinite recurring phase.
    pub billing_cycle_count: u32,
}

/// A purchasable offer of a subscription product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionOffer {
    /// Token passed back when launching the flow.
    pub offer_token: String,
    /// Base plan identifier.
    pub base_plan_id: String,
    /// Offer identifier, absent for the base plan itself.
    pub offer_id: Option<String>,
    /// Ordered pricing phases.
    pub pricing_phases: Vec<PricingPhase>,
}

/// A subscription product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDetails {
    /// Product identifier.
    pub product_id: String,
    /// Display title.
    pub title: String,
    /// Available offers.
    pub offers: Vec<SubscriptionOffer>,
}

/// Parameters for a purchase flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingFlowParams {
    /// Product to buy.
    pub product_id: String,
    /// Offer to buy it under.
    pub offer_token: String,
}

/// Completion handler for the connection.
pub type ConnectCallback = Box<dyn FnOnce(BillingResult) + Send>;

/// Completion handler for product queries.
pub type ProductsCallback = Box<dyn FnOnce(BillingResult, Vec<ProductDetails>) + Send>;

/// Completion handler for purchase queries.
pub type PurchasesCallback = Box<dyn FnOnce(BillingResult, Vec<Purchase>) + Send>;

/// Completion handler for acknowledgement.
pub type AckCallback = Box<dyn FnOnce(BillingResult) + Send>;

/// A billing SDK client.
pub trait BillingClient: Send + Sync {
    /// Connect to the billing service.
    fn start_connection(&self, done: ConnectCallback);

    /// Drop the connection.
    fn end_connection(&self);

    /// Query subscription products.
    fn query_product_details(&self, product_ids: &[String], done: ProductsCallback);

    /// Query the user's current subscription purchases.
    fn query_purchases(&self, done: PurchasesCallback);

    /// Start the store's purchase UI. Returns the immediate result; the
    /// outcome arrives later as a purchase update.
    fn launch_billing_flow(&self, params: &BillingFlowParams) -> BillingResult;

    /// Acknowledge a purchase.
    fn acknowledge_purchase(&self, purchase_token: &str, done: AckCallback);
}
