//! Shared fakes for integration tests. Every vendor call completes inline.

#![allow(dead_code)]

use adwarden::ads::{
    AdHandle, AdNetwork, AdSlot, InitCallback, LoadCallback, ResponseInfo, RewardItem, ShowEvent,
    ShowEventSink,
};
use adwarden::billing::{
    AckCallback, BillingClient, BillingFlowParams, BillingResult, ConnectCallback, PricingPhase,
    ProductDetails, ProductsCallback, Purchase, PurchaseState, PurchasesCallback, SubscriptionOffer,
};
use adwarden::identity::InMemoryIdentifierStore;
use adwarden::remote::{FetchCallback, FetchError, RemoteConfigSource};
use adwarden::{AdUnits, Collaborators, InMemoryKeyValueStore, KeyValueStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const PRODUCT: &str = "premium_monthly";

/// Remote source answering every fetch with the same values, or failing.
pub struct StaticRemote {
    values: Option<HashMap<String, String>>,
}

impl StaticRemote {
    pub fn with(pairs: &[(&str, &str)]) -> Self {
        Self {
            values: Some(
                pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
        }
    }

    pub fn unreachable() -> Self {
        Self { values: None }
    }
}

impl RemoteConfigSource for StaticRemote {
    fn fetch(&self, _timeout: Duration, done: FetchCallback) {
        match &self.values {
            Some(values) => done(Ok(values.clone())),
            None => done(Err(FetchError::Failed("offline".to_string()))),
        }
    }
}

/// Ad network that fills every load and plays every show to dismissal.
#[derive(Default)]
pub struct InstantAdNetwork {
    next_id: AtomicU64,
    pub initialized_with: Mutex<Vec<String>>,
    pub loads: Mutex<Vec<(AdSlot, String)>>,
}

impl InstantAdNetwork {
    pub fn loads_for(&self, slot: AdSlot) -> Vec<String> {
        self.loads
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| *s == slot)
            .map(|(_, unit)| unit.clone())
            .collect()
    }
}

impl AdNetwork for InstantAdNetwork {
    fn initialize(&self, app_id: &str, done: InitCallback) {
        self.initialized_with
            .lock()
            .unwrap()
            .push(app_id.to_string());
        done(Ok(()));
    }

    fn load(&self, slot: AdSlot, unit_id: &str, done: LoadCallback) {
        self.loads.lock().unwrap().push((slot, unit_id.to_string()));
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        done(Ok(AdHandle::new(id, slot, ResponseInfo::default())));
    }

    fn show(&self, ad: AdHandle, events: ShowEventSink) {
        events(ShowEvent::Shown);
        events(ShowEvent::Impression);
        if ad.slot() == AdSlot::Rewarded {
            events(ShowEvent::Rewarded(RewardItem {
                amount: 1,
                kind: "unlock".to_string(),
            }));
        }
        events(ShowEvent::Dismissed);
    }
}

/// Billing client with a fixed catalogue and a purchase list the test edits.
pub struct StubBilling {
    connect: BillingResult,
    pub purchases: Mutex<Vec<Purchase>>,
    pub launches: Mutex<Vec<BillingFlowParams>>,
}

impl StubBilling {
    pub fn connected() -> Self {
        Self::with_connect(BillingResult::ok())
    }

    pub fn with_connect(connect: BillingResult) -> Self {
        Self {
            connect,
            purchases: Mutex::new(Vec::new()),
            launches: Mutex::new(Vec::new()),
        }
    }
}

impl BillingClient for StubBilling {
    fn start_connection(&self, done: ConnectCallback) {
        done(self.connect.clone());
    }

    fn end_connection(&self) {}

    fn query_product_details(&self, product_ids: &[String], done: ProductsCallback) {
        let products = if product_ids.iter().any(|id| id == PRODUCT) {
            vec![monthly_product()]
        } else {
            Vec::new()
        };
        done(BillingResult::ok(), products);
    }

    fn query_purchases(&self, done: PurchasesCallback) {
        let purchases = self.purchases.lock().unwrap().clone();
        done(BillingResult::ok(), purchases);
    }

    fn launch_billing_flow(&self, params: &BillingFlowParams) -> BillingResult {
        self.launches.lock().unwrap().push(params.clone());
        BillingResult::ok()
    }

    fn acknowledge_purchase(&self, _purchase_token: &str, done: AckCallback) {
        done(BillingResult::ok());
    }
}

pub fn monthly_product() -> ProductDetails {
    ProductDetails {
        product_id: PRODUCT.to_string(),
        title: "Premium".to_string(),
        offers: vec![SubscriptionOffer {
            offer_token: "monthly-offer".to_string(),
            base_plan_id: "monthly".to_string(),
            offer_id: None,
            pricing_phases: vec![PricingPhase {
                formatted_price: "$4.99".to_string(),
                price_micros: 4_990_000,
                currency_code: "USD".to_string(),
                billing_period: "P1M".to_string(),
                billing_cycle_count: 0,
            }],
        }],
    }
}

pub fn purchase(token: &str, acknowledged: bool) -> Purchase {
    Purchase {
        product_ids: vec![PRODUCT.to_string()],
        purchase_token: token.to_string(),
        order_id: None,
        state: PurchaseState::Purchased,
        acknowledged,
        auto_renewing: true,
    }
}

/// Handles to the fakes behind a [`Collaborators`] set.
pub struct Harness {
    pub network: Arc<InstantAdNetwork>,
    pub billing: Arc<StubBilling>,
    pub identifiers: Arc<InMemoryIdentifierStore>,
    pub collaborators: Collaborators,
}

pub fn harness(remote: StaticRemote, billing: StubBilling) -> Harness {
    harness_with_store(remote, billing, Arc::new(InMemoryKeyValueStore::new()))
}

pub fn harness_with_store(
    remote: StaticRemote,
    billing: StubBilling,
    store: Arc<dyn KeyValueStore>,
) -> Harness {
    let network = Arc::new(InstantAdNetwork::default());
    let billing = Arc::new(billing);
    let identifiers = Arc::new(InMemoryIdentifierStore::new(AdUnits::APP_ID));
    let collaborators = Collaborators {
        remote: Arc::new(remote),
        ad_network: network.clone(),
        consent: None,
        billing: billing.clone(),
        identifier_store: identifiers.clone(),
        store: Some(store),
    };
    Harness {
        network,
        billing,
        identifiers,
        collaborators,
    }
}
