//! In-crate fakes for the vendor SDK seams.

use crate::ads::{
    AdError, AdHandle, AdNetwork, AdSlot, ConsentCallback, ConsentError, ConsentProvider,
    InitCallback, LoadCallback, ResponseInfo, ShowEvent, ShowEventSink,
};
use crate::billing::{
    AckCallback, BillingClient, BillingFlowParams, BillingResult, ConnectCallback, PricingPhase,
    ProductDetails, ProductsCallback, Purchase, PurchaseState, PurchasesCallback,
    SubscriptionOffer,
};
use crate::clock::MockClock;
use crate::config::AppDefaults;
use crate::remote::{
    ConfigResolver, FetchCallback, FetchError, NoopConfigSource, RemoteConfigSource,
    RemoteFetchGateway,
};
use crate::scheduler::ManualScheduler;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn values(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[derive(Clone)]
enum Mode {
    Immediate(Result<HashMap<String, String>, FetchError>),
    Deferred,
    Threaded(Duration, HashMap<String, String>),
}

/// Scriptable remote config source.
pub(crate) struct FakeRemoteSource {
    mode: Mutex<Mode>,
    pending: Mutex<Vec<FetchCallback>>,
    calls: AtomicUsize,
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl FakeRemoteSource {
    fn with_mode(mode: Mode) -> Self {
        Self {
            mode: Mutex::new(mode),
            pending: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Answers inline with `pairs`.
    pub(crate) fn succeeding(pairs: &[(&str, &str)]) -> Self {
        Self::with_mode(Mode::Immediate(Ok(values(pairs))))
    }

    /// Fails inline.
    pub(crate) fn failing() -> Self {
        Self::with_mode(Mode::Immediate(Err(FetchError::Failed(
            "backend unreachable".to_string(),
        ))))
    }

    /// Holds callbacks until [`complete_pending`](Self::complete_pending).
    pub(crate) fn deferred() -> Self {
        Self::with_mode(Mode::Deferred)
    }

    /// Answers from a background thread after `delay`.
    pub(crate) fn threaded(delay: Duration, pairs: &[(&str, &str)]) -> Self {
        Self::with_mode(Mode::Threaded(delay, values(pairs)))
    }

    /// Answer future fetches inline with `result`.
    pub(crate) fn respond_with(&self, result: Result<HashMap<String, String>, FetchError>) {
        *self.mode.lock().unwrap() = Mode::Immediate(result);
    }

    /// Complete every held fetch with `result`.
    pub(crate) fn complete_pending(
        &self,
        result: Result<HashMap<String, String>, FetchError>,
    ) -> usize {
        let pending: Vec<FetchCallback> = std::mem::take(&mut *self.pending.lock().unwrap());
        let count = pending.len();
        for done in pending {
            done(result.clone());
        }
        count
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

impl RemoteConfigSource for FakeRemoteSource {
    fn fetch(&self, _timeout: Duration, done: FetchCallback) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mode = self.mode.lock().unwrap().clone();
        match mode {
            Mode::Immediate(result) => done(result),
            Mode::Deferred => self.pending.lock().unwrap().push(done),
            Mode::Threaded(delay, values) => {
                let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_active.fetch_max(now_active, Ordering::SeqCst);
                let active = Arc::clone(&self.active);
                std::thread::spawn(move || {
                    std::thread::sleep(delay);
                    active.fetch_sub(1, Ordering::SeqCst);
                    done(Ok(values));
                });
            }
        }
    }
}

/// Resolver over `defaults`; when `remote` is given, one blocking fetch
/// has already run against it.
pub(crate) fn resolver_with(
    defaults: AppDefaults,
    remote: Option<FakeRemoteSource>,
) -> Arc<ConfigResolver> {
    let clock = Arc::new(MockClock::from_rfc3339("2025-01-15T12:00:00Z"));
    let scheduler = Arc::new(ManualScheduler::new(Arc::clone(&clock)));
    let fetch = remote.is_some();
    let source: Arc<dyn RemoteConfigSource> = match remote {
        Some(source) => Arc::new(source),
        None => Arc::new(NoopConfigSource),
    };
    let gateway = RemoteFetchGateway::new(source, scheduler, clock, Duration::from_secs(5));
    if fetch {
        gateway.fetch_blocking(Duration::from_secs(1));
    }
    Arc::new(ConfigResolver::new(defaults, gateway).unwrap())
}

/// Consent provider answering inline.
pub(crate) struct FakeConsent {
    allowed: bool,
    update_fails: AtomicBool,
    updates: AtomicUsize,
    forms: AtomicUsize,
}

impl FakeConsent {
    fn new(allowed: bool) -> Self {
        Self {
            allowed,
            update_fails: AtomicBool::new(false),
            updates: AtomicUsize::new(0),
            forms: AtomicUsize::new(0),
        }
    }

    pub(crate) fn allowing() -> Self {
        Self::new(true)
    }

    pub(crate) fn denying() -> Self {
        Self::new(false)
    }

    pub(crate) fn fail_update(&self) {
        self.update_fails.store(true, Ordering::SeqCst);
    }

    pub(crate) fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub(crate) fn forms(&self) -> usize {
        self.forms.load(Ordering::SeqCst)
    }
}

impl ConsentProvider for FakeConsent {
    fn request_info_update(&self, done: ConsentCallback) {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if self.update_fails.load(Ordering::SeqCst) {
            done(Err(ConsentError {
                code: 2,
                message: "network".to_string(),
            }));
        } else {
            done(Ok(()));
        }
    }

    fn can_request_ads(&self) -> bool {
        self.allowed
    }

    fn load_and_show_form_if_required(&self, done: ConsentCallback) {
        self.forms.fetch_add(1, Ordering::SeqCst);
        done(Ok(()));
    }
}

/// Ad network whose loads complete on demand and whose show events are
/// emitted by the test.
pub(crate) struct FakeAdNetwork {
    initialized_with: Mutex<Vec<String>>,
    loads: Mutex<Vec<(AdSlot, String)>>,
    pending: Mutex<Vec<(AdSlot, LoadCallback)>>,
    shows: Mutex<Vec<(u64, ShowEventSink)>>,
    next_id: AtomicU64,
}

impl FakeAdNetwork {
    pub(crate) fn new() -> Self {
        Self {
            initialized_with: Mutex::new(Vec::new()),
            loads: Mutex::new(Vec::new()),
            pending: Mutex::new(Vec::new()),
            shows: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn take_pending(&self, slot: AdSlot) -> Option<LoadCallback> {
        let mut pending = self.pending.lock().unwrap();
        let index = pending.iter().position(|(s, _)| *s == slot)?;
        Some(pending.remove(index).1)
    }

    /// Fill the oldest outstanding load for `slot`.
    pub(crate) fn complete_load(&self, slot: AdSlot) -> bool {
        let Some(done) = self.take_pending(slot) else {
            return false;
        };
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let response = ResponseInfo {
            adapter: Some("FakeAdapter".to_string()),
            latency: Some(Duration::from_millis(120)),
            response_id: Some(format!("resp-{id}")),
        };
        done(Ok(AdHandle::new(id, slot, response)));
        true
    }

    /// Fail the oldest outstanding load for `slot`.
    pub(crate) fn fail_load(&self, slot: AdSlot, code: i32) -> bool {
        let Some(done) = self.take_pending(slot) else {
            return false;
        };
        done(Err(AdError::new(code, "No fill", "fake")));
        true
    }

    /// Deliver `event` to the most recent show.
    pub(crate) fn emit(&self, event: ShowEvent) {
        let sink = self.shows.lock().unwrap().last().map(|(_, s)| Arc::clone(s));
        if let Some(sink) = sink {
            sink(event);
        }
    }

    pub(crate) fn load_requests(&self, slot: AdSlot) -> usize {
        self.loads.lock().unwrap().iter().filter(|(s, _)| *s == slot).count()
    }

    pub(crate) fn total_loads(&self) -> usize {
        self.loads.lock().unwrap().len()
    }

    pub(crate) fn last_unit(&self, slot: AdSlot) -> Option<String> {
        self.loads
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(s, _)| *s == slot)
            .map(|(_, unit)| unit.clone())
    }

    pub(crate) fn show_count(&self) -> usize {
        self.shows.lock().unwrap().len()
    }

    pub(crate) fn initialized_with(&self) -> Vec<String> {
        self.initialized_with.lock().unwrap().clone()
    }
}

impl AdNetwork for FakeAdNetwork {
    fn initialize(&self, app_id: &str, done: InitCallback) {
        self.initialized_with.lock().unwrap().push(app_id.to_string());
        done(Ok(()));
    }

    fn load(&self, slot: AdSlot, unit_id: &str, done: LoadCallback) {
        self.loads.lock().unwrap().push((slot, unit_id.to_string()));
        self.pending.lock().unwrap().push((slot, done));
    }

    fn show(&self, ad: AdHandle, events: ShowEventSink) {
        self.shows.lock().unwrap().push((ad.id(), events));
    }
}

/// Billing client answering inline from scripted results.
pub(crate) struct FakeBillingClient {
    connect_results: Mutex<VecDeque<BillingResult>>,
    products: Mutex<Vec<ProductDetails>>,
    purchases: Mutex<Vec<Purchase>>,
    launch_result: Mutex<BillingResult>,
    ack_result: Mutex<BillingResult>,
    launches: Mutex<Vec<BillingFlowParams>>,
    acknowledged: Mutex<Vec<String>>,
    connection_attempts: AtomicUsize,
    purchase_queries: AtomicUsize,
    end_calls: AtomicUsize,
}

impl FakeBillingClient {
    pub(crate) fn new() -> Self {
        Self {
            connect_results: Mutex::new(VecDeque::new()),
            products: Mutex::new(Vec::new()),
            purchases: Mutex::new(Vec::new()),
            launch_result: Mutex::new(BillingResult::ok()),
            ack_result: Mutex::new(BillingResult::ok()),
            launches: Mutex::new(Vec::new()),
            acknowledged: Mutex::new(Vec::new()),
            connection_attempts: AtomicUsize::new(0),
            purchase_queries: AtomicUsize::new(0),
            end_calls: AtomicUsize::new(0),
        }
    }

    /// Results for the next connection attempts; later attempts succeed.
    pub(crate) fn push_connect_results(&self, results: Vec<BillingResult>) {
        self.connect_results.lock().unwrap().extend(results);
    }

    pub(crate) fn set_products(&self, products: Vec<ProductDetails>) {
        *self.products.lock().unwrap() = products;
    }

    pub(crate) fn set_purchases(&self, purchases: Vec<Purchase>) {
        *self.purchases.lock().unwrap() = purchases;
    }

    pub(crate) fn set_launch_result(&self, result: BillingResult) {
        *self.launch_result.lock().unwrap() = result;
    }

    pub(crate) fn set_ack_result(&self, result: BillingResult) {
        *self.ack_result.lock().unwrap() = result;
    }

    pub(crate) fn launches(&self) -> Vec<BillingFlowParams> {
        self.launches.lock().unwrap().clone()
    }

    pub(crate) fn acknowledged(&self) -> Vec<String> {
        self.acknowledged.lock().unwrap().clone()
    }

    pub(crate) fn connection_attempts(&self) -> usize {
        self.connection_attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn purchase_queries(&self) -> usize {
        self.purchase_queries.load(Ordering::SeqCst)
    }

    pub(crate) fn end_calls(&self) -> usize {
        self.end_calls.load(Ordering::SeqCst)
    }
}

impl BillingClient for FakeBillingClient {
    fn start_connection(&self, done: ConnectCallback) {
        self.connection_attempts.fetch_add(1, Ordering::SeqCst);
        let result = self
            .connect_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(BillingResult::ok);
        done(result);
    }

    fn end_connection(&self) {
        self.end_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn query_product_details(&self, product_ids: &[String], done: ProductsCallback) {
        let products: Vec<ProductDetails> = self
            .products
            .lock()
            .unwrap()
            .iter()
            .filter(|p| product_ids.contains(&p.product_id))
            .cloned()
            .collect();
        done(BillingResult::ok(), products);
    }

    fn query_purchases(&self, done: PurchasesCallback) {
        self.purchase_queries.fetch_add(1, Ordering::SeqCst);
        let purchases = self.purchases.lock().unwrap().clone();
        done(BillingResult::ok(), purchases);
    }

    fn launch_billing_flow(&self, params: &BillingFlowParams) -> BillingResult {
        self.launches.lock().unwrap().push(params.clone());
        self.launch_result.lock().unwrap().clone()
    }

    fn acknowledge_purchase(&self, purchase_token: &str, done: AckCallback) {
        self.acknowledged
            .lock()
            .unwrap()
            .push(purchase_token.to_string());
        let result = self.ack_result.lock().unwrap().clone();
        done(result);
    }
}

fn phase(price_micros: i64, formatted: &str, period: &str) -> PricingPhase {
    PricingPhase {
        formatted_price: formatted.to_string(),
        price_micros,
        currency_code: "USD".to_string(),
        billing_period: period.to_string(),
        billing_cycle_count: if price_micros == 0 { 1 } else { 0 },
    }
}

/// A monthly product with a base offer and a 7-day trial offer.
pub(crate) fn monthly_product(product_id: &str) -> ProductDetails {
    ProductDetails {
        product_id: product_id.to_string(),
        title: "Premium".to_string(),
        offers: vec![
            SubscriptionOffer {
                offer_token: "base-offer".to_string(),
                base_plan_id: "monthly".to_string(),
                offer_id: None,
                pricing_phases: vec![phase(4_990_000, "$4.99", "P1M")],
            },
            SubscriptionOffer {
                offer_token: "trial-offer".to_string(),
                base_plan_id: "monthly".to_string(),
                offer_id: Some("free-week".to_string()),
                pricing_phases: vec![
                    phase(0, "Free", "P7D"),
                    phase(4_990_000, "$4.99", "P1M"),
                ],
            },
        ],
    }
}

/// A purchase of `product_id`.
pub(crate) fn purchase(
    product_id: &str,
    token: &str,
    state: PurchaseState,
    acknowledged: bool,
) -> Purchase {
    Purchase {
        product_ids: vec![product_id.to_string()],
        purchase_token: token.to_string(),
        order_id: Some(format!("GPA.{token}")),
        state,
        acknowledged,
        auto_renewing: true,
    }
}
