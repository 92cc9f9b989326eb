//! Subscription orchestration over the billing SDK.
//!
//! Connection lifecycle:
//!
//! ```text
//! Disconnected --connect--> Connecting --ok--> Connected
//! Connecting --retryable failure, attempt < max--> FailedRetrying(n) --delay--> Connecting
//! Connecting --otherwise--> FailedTerminal
//! ```
//!
//! Once connected, the product catalogue and the user's purchases are
//! queried. Purchases drive the persisted subscription flag through
//! [`SubscriptionOrchestrator::activate_subscription`] and
//! [`SubscriptionOrchestrator::clear_status`], the only two writers of it.

use crate::billing::backoff::{RetryDecision, RetryPolicy};
use crate::billing::client::{
    BillingClient, BillingFlowParams, BillingResponseCode, BillingResult, ProductDetails, Purchase,
    PurchaseState,
};
use crate::billing::errors::PurchaseError;
use crate::billing::pricing::{select_offer, PricingSummary};
use crate::billing::state::{BillingConnectionState, PurchaseFlowState, SubscriptionStatus};
use crate::config::AdwardenConfig;
use crate::premium::PremiumGate;
use crate::scheduler::Scheduler;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

const PURCHASE_SUCCESS_MESSAGE: &str = "Welcome to Premium! Your subscription is now active.";
const RESTORE_SUCCESS_MESSAGE: &str = "Your subscription has been restored.";
const PENDING_MESSAGE: &str =
    "Your payment is being processed. Premium will unlock once it completes.";
const NO_SUBSCRIPTION_MESSAGE: &str = "No active subscription found.";
const NO_OFFER_MESSAGE: &str = "No subscription offer is available.";

/// Why a subscription is being activated. Controls the message shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationSource {
    /// A purchase made through the flow.
    Purchase,
    /// A user-initiated restore.
    Restore,
    /// Background sync at connection time. No message is shown.
    Sync,
}

/// Short, stable fingerprint of a purchase token for logs.
pub fn token_fingerprint(token: &str) -> String {
    let hash = Sha256::digest(token.as_bytes());
    let mut hex = hex::encode(hash);
    hex.truncate(12);
    hex
}

#[derive(Default)]
struct BillingState {
    connection: BillingConnectionState,
    attempts: u32,
    generation: u64,
    product: Option<ProductDetails>,
    restoring: bool,
}

struct BillingInner {
    client: Arc<dyn BillingClient>,
    premium: Arc<PremiumGate>,
    scheduler: Arc<dyn Scheduler>,
    product_id: String,
    retry: RetryPolicy,
    restore_settle_delay: Duration,
    shut_down: AtomicBool,
    state: Mutex<BillingState>,
    flow: watch::Sender<PurchaseFlowState>,
    status: watch::Sender<SubscriptionStatus>,
    connection: watch::Sender<BillingConnectionState>,
}

/// Connects to the billing service, runs purchase and restore flows, and
/// keeps the premium flag in sync with the store.
#[derive(Clone)]
pub struct SubscriptionOrchestrator {
    inner: Arc<BillingInner>,
}

impl SubscriptionOrchestrator {
    /// Create an orchestrator for `config.subscription_product_id`.
    pub fn new(
        client: Arc<dyn BillingClient>,
        premium: Arc<PremiumGate>,
        scheduler: Arc<dyn Scheduler>,
        config: &AdwardenConfig,
    ) -> Self {
        let (flow, _) = watch::channel(PurchaseFlowState::Idle);
        let (status, _) = watch::channel(SubscriptionStatus::Unknown);
        let (connection, _) = watch::channel(BillingConnectionState::Disconnected);
        Self {
            inner: Arc::new(BillingInner {
                client,
                premium,
                scheduler,
                product_id: config.subscription_product_id.clone(),
                retry: config.retry,
                restore_settle_delay: config.restore_settle_delay,
                shut_down: AtomicBool::new(false),
                state: Mutex::new(BillingState::default()),
                flow,
                status,
                connection,
            }),
        }
    }

    /// Connect to the billing service and sync purchases.
    pub fn start(&self) {
        self.inner.shut_down.store(false, Ordering::Release);
        self.inner.ensure_connected();
    }

    /// Report that the billing service dropped the connection.
    ///
    /// The next purchase launch or restore reconnects.
    pub fn on_service_disconnected(&self) {
        {
            let mut state = self.inner.state();
            state.connection = BillingConnectionState::Disconnected;
            state.attempts = 0;
            state.generation += 1;
        }
        warn!("Billing service disconnected");
        self.inner.publish_connection(BillingConnectionState::Disconnected);
    }

    /// Start the store's purchase flow for the cached product.
    pub fn launch_purchase_flow(&self) {
        self.inner.launch_purchase_flow();
    }

    /// Handle a purchase update pushed by the billing SDK.
    pub fn on_purchases_updated(&self, result: BillingResult, purchases: Vec<Purchase>) {
        self.inner.on_purchases_updated(result, purchases);
    }

    /// Re-query purchases and report whether a subscription was found.
    pub fn restore_purchases(&self) {
        self.inner.restore_purchases();
    }

    /// Mark the subscription active.
    pub fn activate_subscription(&self, source: ActivationSource) {
        self.inner.activate_subscription(source);
    }

    /// Mark the subscription inactive.
    pub fn clear_status(&self) {
        self.inner.clear_status();
    }

    /// Return the purchase flow to `Idle`, e.g. when the dialog opens.
    pub fn reset_flow(&self) {
        self.inner.emit_flow(PurchaseFlowState::Idle);
    }

    /// Current purchase flow state.
    pub fn flow_state(&self) -> PurchaseFlowState {
        self.inner.flow.borrow().clone()
    }

    /// Watch purchase flow changes.
    pub fn subscribe_flow(&self) -> watch::Receiver<PurchaseFlowState> {
        self.inner.flow.subscribe()
    }

    /// Current subscription status.
    pub fn status(&self) -> SubscriptionStatus {
        self.inner.status.borrow().clone()
    }

    /// Watch subscription status changes.
    pub fn subscribe_status(&self) -> watch::Receiver<SubscriptionStatus> {
        self.inner.status.subscribe()
    }

    /// Current connection state.
    pub fn connection_state(&self) -> BillingConnectionState {
        self.inner.state().connection
    }

    /// Watch connection state changes.
    pub fn subscribe_connection(&self) -> watch::Receiver<BillingConnectionState> {
        self.inner.connection.subscribe()
    }

    /// The cached subscription product.
    pub fn product(&self) -> Option<ProductDetails> {
        self.inner.state().product.clone()
    }

    /// Display pricing for the offer that would be purchased.
    pub fn pricing_summary(&self) -> Option<PricingSummary> {
        let state = self.inner.state();
        let product = state.product.as_ref()?;
        select_offer(product).map(PricingSummary::from_offer)
    }

    /// Disconnect and ignore any callbacks still in flight.
    pub fn shutdown(&self) {
        self.inner.shut_down.store(true, Ordering::Release);
        {
            let mut state = self.inner.state();
            state.generation += 1;
            state.connection = BillingConnectionState::Disconnected;
            state.attempts = 0;
            state.restoring = false;
        }
        self.inner.client.end_connection();
        self.inner.publish_connection(BillingConnectionState::Disconnected);
        info!("Billing orchestrator shut down");
    }
}

impl BillingInner {
    fn state(&self) -> MutexGuard<'_, BillingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    fn emit_flow(&self, next: PurchaseFlowState) {
        debug!(state = ?next, "Purchase flow state");
        self.flow.send_replace(next);
    }

    fn emit_status(&self, next: SubscriptionStatus) {
        debug!(status = ?next, "Subscription status");
        self.status.send_replace(next);
    }

    fn publish_connection(&self, next: BillingConnectionState) {
        self.connection.send_replace(next);
    }

    fn ensure_connected(self: &Arc<Self>) {
        let generation = {
            let mut state = self.state();
            match state.connection {
                BillingConnectionState::Disconnected | BillingConnectionState::FailedTerminal => {}
                other => {
                    debug!(connection = ?other, "Billing connection already active");
                    return;
                }
            }
            state.attempts = 0;
            state.generation
        };
        self.attempt_connection(generation);
    }

    fn attempt_connection(self: &Arc<Self>, generation: u64) {
        let attempt = {
            let mut state = self.state();
            if state.generation != generation {
                return;
            }
            state.attempts += 1;
            state.connection = BillingConnectionState::Connecting;
            state.attempts
        };
        self.publish_connection(BillingConnectionState::Connecting);
        debug!(attempt, "Connecting to billing service");

        let inner = Arc::clone(self);
        self.client.start_connection(Box::new(move |result| {
            inner.on_connection_result(generation, result)
        }));
    }

    fn on_connection_result(self: &Arc<Self>, generation: u64, result: BillingResult) {
        if self.is_shut_down() {
            return;
        }

        let (next, decision) = {
            let mut state = self.state();
            if state.generation != generation {
                debug!("Discarding stale connection result");
                return;
            }
            if result.is_ok() {
                state.attempts = 0;
                state.connection = BillingConnectionState::Connected;
                (BillingConnectionState::Connected, None)
            } else {
                let decision = self.retry.decide(result.code, state.attempts);
                state.connection = match decision {
                    RetryDecision::Retry { attempt, .. } => {
                        BillingConnectionState::FailedRetrying(attempt)
                    }
                    RetryDecision::GiveUp => BillingConnectionState::FailedTerminal,
                };
                (state.connection, Some(decision))
            }
        };
        self.publish_connection(next);

        match decision {
            None => {
                info!("Billing service connected");
                self.on_connected();
            }
            Some(RetryDecision::Retry { attempt, delay }) => {
                warn!(
                    attempt,
                    code = %result.code,
                    delay_ms = delay.as_millis() as u64,
                    "Billing connection failed, retrying"
                );
                let inner = Arc::clone(self);
                self.scheduler.post_delayed(
                    delay,
                    Box::new(move || inner.attempt_connection(generation)),
                );
            }
            Some(RetryDecision::GiveUp) => {
                error!(code = %result.code, message = %result.debug_message, "Billing connection failed");
                self.emit_status(SubscriptionStatus::Error(PurchaseError::from_code(result.code)));
            }
        }
    }

    fn on_connected(self: &Arc<Self>) {
        if self.state().product.is_none() {
            let inner = Arc::clone(self);
            self.client.query_product_details(
                &[self.product_id.clone()],
                Box::new(move |result, products| inner.on_product_details(result, products)),
            );
        }
        self.query_purchases();
    }

    fn on_product_details(&self, result: BillingResult, products: Vec<ProductDetails>) {
        if !result.is_ok() {
            warn!(code = %result.code, "Product details query failed");
            return;
        }
        match products.into_iter().find(|p| p.product_id == self.product_id) {
            Some(product) => {
                info!(product_id = %product.product_id, offers = product.offers.len(), "Product details loaded");
                self.state().product = Some(product);
            }
            None => warn!(product_id = %self.product_id, "Subscription product not found"),
        }
    }

    fn query_purchases(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        self.client.query_purchases(Box::new(move |result, purchases| {
            inner.on_purchases_queried(result, purchases)
        }));
    }

    fn on_purchases_queried(self: &Arc<Self>, result: BillingResult, purchases: Vec<Purchase>) {
        if self.is_shut_down() {
            return;
        }
        if !result.is_ok() {
            warn!(code = %result.code, "Purchase query failed");
            return;
        }

        let source = if self.state().restoring {
            ActivationSource::Restore
        } else {
            ActivationSource::Sync
        };
        let relevant: Vec<Purchase> = purchases
            .into_iter()
            .filter(|p| self.covers(p))
            .filter(|p| matches!(p.state, PurchaseState::Purchased | PurchaseState::Pending))
            .collect();

        if relevant.is_empty() {
            debug!("No purchased or pending subscription found");
            self.clear_status();
            return;
        }
        self.process_purchases(relevant, source);
    }

    fn covers(&self, purchase: &Purchase) -> bool {
        purchase.product_ids.iter().any(|id| *id == self.product_id)
    }

    fn process_purchases(self: &Arc<Self>, purchases: Vec<Purchase>, source: ActivationSource) {
        for purchase in purchases {
            let token = token_fingerprint(&purchase.purchase_token);
            if !self.covers(&purchase) {
                debug!(token = %token, "Ignoring purchase for another product");
                continue;
            }
            match purchase.state {
                PurchaseState::Purchased if purchase.acknowledged => {
                    debug!(token = %token, "Purchase already acknowledged");
                    self.activate_subscription(source);
                }
                PurchaseState::Purchased => self.acknowledge(purchase, source),
                PurchaseState::Pending => {
                    info!(token = %token, "Purchase pending");
                    self.emit_status(SubscriptionStatus::Pending);
                    if source != ActivationSource::Sync {
                        self.emit_flow(PurchaseFlowState::Pending(PENDING_MESSAGE.to_string()));
                    }
                }
                PurchaseState::Unspecified => {
                    debug!(token = %token, "Ignoring purchase in unspecified state");
                }
            }
        }
    }

    fn acknowledge(self: &Arc<Self>, purchase: Purchase, source: ActivationSource) {
        let token = token_fingerprint(&purchase.purchase_token);
        debug!(token = %token, "Acknowledging purchase");
        let inner = Arc::clone(self);
        self.client.acknowledge_purchase(
            &purchase.purchase_token,
            Box::new(move |result| {
                if inner.is_shut_down() {
                    return;
                }
                if result.is_ok() {
                    info!(token = %token, "Purchase acknowledged");
                    inner.activate_subscription(source);
                    return;
                }
                let err = PurchaseError::from_code(result.code);
                warn!(token = %token, code = %result.code, "Purchase acknowledgement failed");
                if source != ActivationSource::Sync {
                    inner.emit_flow(PurchaseFlowState::Error(err.display_message()));
                }
            }),
        );
    }

    fn activate_subscription(&self, source: ActivationSource) {
        if let Err(e) = self.premium.set_subscription_active(true) {
            warn!(error = %e, "Failed to persist subscription status");
        }
        self.emit_status(SubscriptionStatus::Active);
        info!(source = ?source, "Subscription active");
        match source {
            ActivationSource::Purchase => {
                self.emit_flow(PurchaseFlowState::Success(PURCHASE_SUCCESS_MESSAGE.to_string()))
            }
            ActivationSource::Restore => {
                self.emit_flow(PurchaseFlowState::Success(RESTORE_SUCCESS_MESSAGE.to_string()))
            }
            ActivationSource::Sync => {}
        }
    }

    fn clear_status(&self) {
        if let Err(e) = self.premium.set_subscription_active(false) {
            warn!(error = %e, "Failed to persist subscription status");
        }
        self.emit_status(SubscriptionStatus::Inactive);
    }

    fn launch_purchase_flow(self: &Arc<Self>) {
        let product = self.state().product.clone();
        let Some(product) = product else {
            warn!("Purchase requested before product details loaded");
            self.emit_flow(PurchaseFlowState::Error(
                PurchaseError::product_unavailable().display_message(),
            ));
            self.ensure_connected();
            return;
        };
        let Some(offer) = select_offer(&product) else {
            warn!(product_id = %product.product_id, "Product has no offers");
            self.emit_flow(PurchaseFlowState::Error(NO_OFFER_MESSAGE.to_string()));
            return;
        };

        if self.state().connection != BillingConnectionState::Connected {
            info!("Billing service not connected, reconnecting before launch");
            self.ensure_connected();
            if self.state().connection != BillingConnectionState::Connected {
                let err = PurchaseError::from_code(BillingResponseCode::ServiceDisconnected);
                self.emit_flow(PurchaseFlowState::NetworkError(err.display_message()));
                return;
            }
        }

        let params = BillingFlowParams {
            product_id: product.product_id.clone(),
            offer_token: offer.offer_token.clone(),
        };
        self.state().restoring = false;
        self.emit_flow(PurchaseFlowState::Processing);
        info!(product_id = %params.product_id, "Launching purchase flow");

        let result = self.client.launch_billing_flow(&params);
        if !result.is_ok() {
            let err = PurchaseError::from_code(result.code);
            warn!(code = %result.code, message = %result.debug_message, "Purchase flow failed to launch");
            self.emit_flow(PurchaseFlowState::Error(err.display_message()));
        }
    }

    fn on_purchases_updated(self: &Arc<Self>, result: BillingResult, purchases: Vec<Purchase>) {
        if self.is_shut_down() {
            return;
        }
        match result.code {
            BillingResponseCode::Ok if purchases.is_empty() => {
                warn!("Purchase update reported success without purchases");
            }
            BillingResponseCode::Ok => self.process_purchases(purchases, ActivationSource::Purchase),
            BillingResponseCode::UserCanceled => {
                info!("Purchase cancelled by user");
                self.emit_flow(PurchaseFlowState::Cancelled);
            }
            code if code.is_network_class() => {
                warn!(code = %code, "Purchase failed with a network error");
                self.emit_flow(PurchaseFlowState::NetworkError(
                    PurchaseError::from_code(code).display_message(),
                ));
            }
            code => {
                warn!(code = %code, message = %result.debug_message, "Purchase failed");
                self.emit_flow(PurchaseFlowState::Error(
                    PurchaseError::from_code(code).display_message(),
                ));
            }
        }
    }

    fn restore_purchases(self: &Arc<Self>) {
        let connected = {
            let mut state = self.state();
            state.restoring = true;
            state.connection == BillingConnectionState::Connected
        };
        self.emit_flow(PurchaseFlowState::Processing);
        info!("Restoring purchases");

        if connected {
            self.query_purchases();
        } else {
            self.ensure_connected();
        }

        let inner = Arc::clone(self);
        self.scheduler.post_delayed(
            self.restore_settle_delay,
            Box::new(move || inner.finish_restore()),
        );
    }

    fn finish_restore(&self) {
        if self.is_shut_down() {
            return;
        }
        let was_restoring = std::mem::replace(&mut self.state().restoring, false);
        if !was_restoring || *self.flow.borrow() != PurchaseFlowState::Processing {
            return;
        }
        if self.status.borrow().is_active() {
            self.emit_flow(PurchaseFlowState::Success(RESTORE_SUCCESS_MESSAGE.to_string()));
        } else {
            info!("Restore found no active subscription");
            self.emit_flow(PurchaseFlowState::Error(NO_SUBSCRIPTION_MESSAGE.to_string()));
        }
    }
}

impl std::fmt::Debug for SubscriptionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionOrchestrator")
            .field("product_id", &self.inner.product_id)
            .field("connection", &self.connection_state())
            .field("status", &self.status())
            .finish()
    }
}
