//! Ad lifecycle orchestration.
//!
//! One state machine per full-screen slot:
//!
//! ```text
//! Idle --preload--> Loading --loaded--> Loaded --show--> Showing --dismissed--> Idle
//!                   Loading --failed--> Idle             Showing --failed/timeout--> Idle
//! ```
//!
//! Across slots, only one ad may be on screen at a time. Every show request
//! resolves its callback exactly once: the timeout timer and the vendor's
//! events race for a single claim flag, and the loser is discarded.
//!
//! Loads are never retried inside a call. The next preload (usually the
//! next lifecycle event, or the reload after a dismissal) tries again.

use crate::ads::frequency::FrequencyCheck;
use crate::ads::network::{AdError, AdHandle, AdNetwork, AdSlot, RewardItem, ShowEvent, ShowEventSink};
use crate::ads::slot::{LoadState, LoadedAd, SlotSnapshot, SlotState};
use crate::clock::Clock;
use crate::premium::PremiumGate;
use crate::remote::ConfigResolver;
use crate::scheduler::Scheduler;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why an ad could not be loaded or shown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdFailure {
    /// Ads are switched off remotely or the user has premium access.
    #[error("Ads are disabled")]
    AdsDisabled,

    /// The ad SDK has not been initialized yet.
    #[error("Ad SDK is not initialized")]
    SdkNotReady,

    /// Another full-screen ad is on screen.
    #[error("Another ad ({showing}) is already showing")]
    AnotherAdShowing {
        /// The slot currently on screen.
        showing: AdSlot,
    },

    /// The slot was shown too recently.
    #[error("Frequency capped, next ad in {}s", ceil_secs(.remaining))]
    FrequencyCapped {
        /// Time until the cap lifts.
        remaining: Duration,
    },

    /// No ad is loaded for the slot.
    #[error("No {slot} ad is ready")]
    NotReady {
        /// The requested slot.
        slot: AdSlot,
    },

    /// The slot is not shown through the full-screen flow.
    #[error("{slot} ads cannot be shown full-screen")]
    Unsupported {
        /// The requested slot.
        slot: AdSlot,
    },

    /// The ad did not appear in time.
    #[error("Ad did not appear within {}ms", .timeout.as_millis())]
    TimedOut {
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// A rewarded ad was closed before the reward was earned.
    #[error("Ad closed before the reward was earned")]
    NotRewarded,

    /// The SDK could not fill the request.
    #[error("Ad failed to load: {0}")]
    LoadFailed(AdError),

    /// The SDK could not present the ad.
    #[error("Ad failed to show: {0}")]
    ShowFailed(AdError),
}

fn ceil_secs(d: &Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

/// Terminal result of a show request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShowOutcome {
    /// The user finished viewing the ad.
    Completed {
        /// Reward earned, for rewarded ads.
        reward: Option<RewardItem>,
    },
    /// The ad was not (fully) shown.
    Failed(AdFailure),
}

impl ShowOutcome {
    /// Whether the show completed.
    pub fn is_completed(&self) -> bool {
        matches!(self, ShowOutcome::Completed { .. })
    }
}

/// Show completion handler.
pub type ShowCallback = Box<dyn FnOnce(ShowOutcome) + Send>;

/// Native load completion handler. The caller owns the returned handle.
pub type NativeCallback = Box<dyn FnOnce(Result<AdHandle, AdFailure>) + Send>;

struct ShowRequest {
    id: u64,
    slot: AdSlot,
    timeout: Duration,
    resolved: AtomicBool,
    started: AtomicBool,
    reward: Mutex<Option<RewardItem>>,
    callback: Mutex<Option<ShowCallback>>,
}

impl ShowRequest {
    fn new(id: u64, slot: AdSlot, timeout: Duration, callback: ShowCallback) -> Self {
        Self {
            id,
            slot,
            timeout,
            resolved: AtomicBool::new(false),
            started: AtomicBool::new(false),
            reward: Mutex::new(None),
            callback: Mutex::new(Some(callback)),
        }
    }

    /// Win the right to resolve this request. Only the first caller gets `true`.
    fn claim(&self) -> bool {
        self.resolved
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn deliver(&self, outcome: ShowOutcome) {
        let callback = self
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(callback) = callback {
            callback(outcome);
        }
    }

    fn resolve(&self, outcome: ShowOutcome) -> bool {
        if !self.claim() {
            return false;
        }
        self.deliver(outcome);
        true
    }

    fn record_reward(&self, item: RewardItem) {
        *self.reward.lock().unwrap_or_else(PoisonError::into_inner) = Some(item);
    }

    fn take_reward(&self) -> Option<RewardItem> {
        self.reward.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

#[derive(Default)]
struct AdState {
    slots: HashMap<AdSlot, SlotState>,
    showing: Option<(AdSlot, u64)>,
}

impl AdState {
    fn slot_mut(&mut self, slot: AdSlot) -> &mut SlotState {
        self.slots.entry(slot).or_insert_with(|| SlotState::new(slot))
    }
}

struct AdInner {
    network: Arc<dyn AdNetwork>,
    resolver: Arc<ConfigResolver>,
    premium: Arc<PremiumGate>,
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn Scheduler>,
    sdk_ready: AtomicBool,
    next_request: AtomicU64,
    state: Mutex<AdState>,
}

/// Drives preload/show/dismiss cycles for every ad surface.
///
/// Cheap to clone; clones share state. Ad handles never leave this type
/// except through [`AdNetwork::show`] and native loads.
#[derive(Clone)]
pub struct AdLifecycleOrchestrator {
    inner: Arc<AdInner>,
}

impl AdLifecycleOrchestrator {
    /// Create an orchestrator. Nothing loads until
    /// [`mark_sdk_ready`](Self::mark_sdk_ready) is called.
    pub fn new(
        network: Arc<dyn AdNetwork>,
        resolver: Arc<ConfigResolver>,
        premium: Arc<PremiumGate>,
        clock: Arc<dyn Clock>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            inner: Arc::new(AdInner {
                network,
                resolver,
                premium,
                clock,
                scheduler,
                sdk_ready: AtomicBool::new(false),
                next_request: AtomicU64::new(1),
                state: Mutex::new(AdState::default()),
            }),
        }
    }

    /// Record that the ad SDK finished initializing.
    pub fn mark_sdk_ready(&self) {
        self.inner.sdk_ready.store(true, Ordering::Release);
    }

    /// Whether the ad SDK has been initialized.
    pub fn is_sdk_ready(&self) -> bool {
        self.inner.sdk_ready.load(Ordering::Acquire)
    }

    /// Whether ads may be loaded and shown at all.
    pub fn ads_enabled(&self) -> bool {
        self.inner.ads_enabled()
    }

    /// Start loading `slot` if it is idle and ads are enabled.
    pub fn preload(&self, slot: AdSlot) {
        self.inner.preload(slot);
    }

    /// Preload every full-screen slot.
    pub fn preload_all(&self) {
        for slot in AdSlot::FULL_SCREEN {
            self.inner.preload(slot);
        }
    }

    /// Show the loaded ad for `slot`.
    ///
    /// `done` is called exactly once. If the ad has not started showing
    /// within `timeout`, the request fails and a reload is started.
    pub fn show<F>(&self, slot: AdSlot, timeout: Duration, done: F)
    where
        F: FnOnce(ShowOutcome) + Send + 'static,
    {
        self.inner.show(slot, timeout, Box::new(done));
    }

    /// Load a native ad and hand it to the caller.
    pub fn load_native<F>(&self, done: F)
    where
        F: FnOnce(Result<AdHandle, AdFailure>) + Send + 'static,
    {
        self.inner.load_native(Box::new(done));
    }

    /// Whether `slot` has an ad ready to show.
    pub fn is_ready(&self, slot: AdSlot) -> bool {
        self.inner
            .state()
            .slots
            .get(&slot)
            .is_some_and(SlotState::is_ready)
    }

    /// Time until `slot` leaves its frequency cap, if capped.
    pub fn remaining_cooldown(&self, slot: AdSlot) -> Option<Duration> {
        if !slot.is_frequency_capped() {
            return None;
        }
        let policy = self.inner.resolver.frequency_policy();
        let last = self
            .inner
            .state()
            .slots
            .get(&slot)
            .and_then(|s| s.last_dismissed_at);
        match policy.check(last, self.inner.clock.now_utc()) {
            FrequencyCheck::Allowed => None,
            FrequencyCheck::Capped { remaining } => Some(remaining),
        }
    }

    /// The slot currently on screen.
    pub fn showing(&self) -> Option<AdSlot> {
        self.inner.state().showing.map(|(slot, _)| slot)
    }

    /// Read-only view of a slot.
    pub fn snapshot(&self, slot: AdSlot) -> SlotSnapshot {
        self.inner
            .state()
            .slots
            .get(&slot)
            .map(SlotState::snapshot)
            .unwrap_or_else(|| SlotState::new(slot).snapshot())
    }

    /// Drop every held ad and stop loading until marked ready again.
    pub fn shutdown(&self) {
        self.inner.sdk_ready.store(false, Ordering::Release);
        let mut state = self.inner.state();
        state.slots.clear();
        state.showing = None;
        info!("Ad orchestrator shut down");
    }
}

impl AdInner {
    fn state(&self) -> MutexGuard<'_, AdState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ads_enabled(&self) -> bool {
        self.resolver.ads_mode() && !self.premium.has_premium_access()
    }

    fn preload(self: &Arc<Self>, slot: AdSlot) {
        if slot == AdSlot::Native {
            debug!("Native ads are loaded on demand");
            return;
        }
        if !self.sdk_ready.load(Ordering::Acquire) {
            debug!(%slot, "Skipping preload: ad SDK not initialized");
            return;
        }
        if !self.ads_enabled() {
            debug!(%slot, "Skipping preload: ads disabled");
            return;
        }

        let unit_id = self.resolver.unit_id(slot);
        let now = self.clock.now_utc();
        {
            let mut state = self.state();
            let slot_state = state.slot_mut(slot);
            if slot_state.discard_if_expired(now) {
                info!(%slot, "Discarded expired ad");
            }
            if !slot_state.can_start_load() {
                debug!(%slot, load_state = ?slot_state.load_state, "Preload ignored");
                return;
            }
            slot_state.load_state = LoadState::Loading;
            slot_state.unit_id = Some(unit_id.clone());
        }

        debug!(%slot, unit_id = %unit_id, "Loading ad");
        let inner = Arc::clone(self);
        self.network.load(
            slot,
            &unit_id,
            Box::new(move |result| inner.on_loaded(slot, result)),
        );
    }

    fn on_loaded(&self, slot: AdSlot, result: Result<AdHandle, AdError>) {
        let now = self.clock.now_utc();
        let mut state = self.state();
        let slot_state = state.slot_mut(slot);
        if slot_state.load_state != LoadState::Loading {
            debug!(%slot, "Discarding load result for a reset slot");
            return;
        }

        match result {
            Ok(handle) => {
                info!(
                    %slot,
                    adapter = ?handle.response().adapter,
                    latency_ms = ?handle.response().latency.map(|l| l.as_millis() as u64),
                    "Ad loaded"
                );
                slot_state.loaded = Some(LoadedAd {
                    handle,
                    loaded_at: now,
                });
                slot_state.load_state = LoadState::Loaded;
            }
            Err(e) => {
                warn!(%slot, code = e.code, error = %e, "Ad failed to load");
                slot_state.load_state = LoadState::Idle;
            }
        }
    }

    fn show(self: &Arc<Self>, slot: AdSlot, timeout: Duration, done: ShowCallback) {
        let id = self.next_request.fetch_add(1, Ordering::Relaxed);
        let request = Arc::new(ShowRequest::new(id, slot, timeout, done));

        let handle = match self.begin_show(&request) {
            Ok(handle) => handle,
            Err(failure) => {
                debug!(%slot, reason = %failure, "Show rejected");
                let reload = matches!(failure, AdFailure::NotReady { .. });
                request.resolve(ShowOutcome::Failed(failure));
                if reload {
                    self.preload(slot);
                }
                return;
            }
        };

        // Arm the timer first; the SDK may report events inline.
        let inner = Arc::clone(self);
        let timer_request = Arc::clone(&request);
        self.scheduler.post_delayed(
            timeout,
            Box::new(move || inner.on_show_timeout(&timer_request)),
        );

        let inner = Arc::clone(self);
        let events: ShowEventSink =
            Arc::new(move |event| inner.on_show_event(&request, event));
        info!(%slot, ad = handle.id(), "Showing ad");
        self.network.show(handle, events);
    }

    fn begin_show(&self, request: &ShowRequest) -> Result<AdHandle, AdFailure> {
        let slot = request.slot;
        if slot == AdSlot::Native {
            return Err(AdFailure::Unsupported { slot });
        }
        if !self.sdk_ready.load(Ordering::Acquire) {
            return Err(AdFailure::SdkNotReady);
        }
        if !self.ads_enabled() {
            return Err(AdFailure::AdsDisabled);
        }

        let policy = self.resolver.frequency_policy();
        let now = self.clock.now_utc();
        let mut state = self.state();

        if let Some((showing, _)) = state.showing {
            return Err(AdFailure::AnotherAdShowing { showing });
        }

        let slot_state = state.slot_mut(slot);
        if slot.is_frequency_capped() {
            if let FrequencyCheck::Capped { remaining } =
                policy.check(slot_state.last_dismissed_at, now)
            {
                return Err(AdFailure::FrequencyCapped { remaining });
            }
        }
        if slot_state.discard_if_expired(now) {
            info!(%slot, "Discarded expired ad before show");
        }
        let handle = slot_state
            .take_for_show()
            .ok_or(AdFailure::NotReady { slot })?;

        state.showing = Some((slot, request.id));
        Ok(handle)
    }

    fn on_show_event(self: &Arc<Self>, request: &Arc<ShowRequest>, event: ShowEvent) {
        let slot = request.slot;
        match event {
            ShowEvent::Shown => {
                request.started.store(true, Ordering::Release);
                debug!(%slot, "Ad on screen");
            }
            ShowEvent::Impression => debug!(%slot, "Ad impression"),
            ShowEvent::Clicked => debug!(%slot, "Ad clicked"),
            ShowEvent::Rewarded(item) => {
                info!(%slot, amount = item.amount, kind = %item.kind, "Reward earned");
                request.record_reward(item);
            }
            ShowEvent::Dismissed => {
                if !request.claim() {
                    debug!(%slot, "Ignoring dismissal for an already resolved show");
                    return;
                }
                self.finish_show(request, true);
                let outcome = if slot == AdSlot::Rewarded {
                    match request.take_reward() {
                        Some(reward) => ShowOutcome::Completed {
                            reward: Some(reward),
                        },
                        None => ShowOutcome::Failed(AdFailure::NotRewarded),
                    }
                } else {
                    ShowOutcome::Completed { reward: None }
                };
                request.deliver(outcome);
                self.preload(slot);
            }
            ShowEvent::FailedToShow(e) => {
                if !request.claim() {
                    debug!(%slot, "Ignoring show failure for an already resolved show");
                    return;
                }
                warn!(%slot, code = e.code, error = %e, "Ad failed to show");
                self.finish_show(request, false);
                request.deliver(ShowOutcome::Failed(AdFailure::ShowFailed(e)));
                self.preload(slot);
            }
        }
    }

    fn on_show_timeout(self: &Arc<Self>, request: &Arc<ShowRequest>) {
        if request.started.load(Ordering::Acquire) {
            return;
        }
        if !request.claim() {
            return;
        }
        warn!(
            slot = %request.slot,
            timeout_ms = request.timeout.as_millis() as u64,
            "Ad did not show before the timeout"
        );
        self.finish_show(request, false);
        request.deliver(ShowOutcome::Failed(AdFailure::TimedOut {
            timeout: request.timeout,
        }));
        self.preload(request.slot);
    }

    fn finish_show(&self, request: &ShowRequest, dismissed: bool) {
        let now = self.clock.now_utc();
        let mut state = self.state();
        if state.showing.map(|(_, id)| id) == Some(request.id) {
            state.showing = None;
        }
        let slot_state = state.slot_mut(request.slot);
        if slot_state.load_state == LoadState::Showing {
            slot_state.load_state = LoadState::Idle;
        }
        if dismissed {
            slot_state.last_dismissed_at = Some(now);
        }
    }

    fn load_native(self: &Arc<Self>, done: NativeCallback) {
        if !self.sdk_ready.load(Ordering::Acquire) {
            done(Err(AdFailure::SdkNotReady));
            return;
        }
        if !self.ads_enabled() {
            done(Err(AdFailure::AdsDisabled));
            return;
        }
        let unit_id = self.resolver.native_ad_unit();
        debug!(unit_id = %unit_id, "Loading native ad");
        self.network.load(
            AdSlot::Native,
            &unit_id,
            Box::new(move |result| done(result.map_err(AdFailure::LoadFailed))),
        );
    }
}

impl std::fmt::Debug for AdLifecycleOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdLifecycleOrchestrator")
            .field("sdk_ready", &self.is_sdk_ready())
            .field("showing", &self.showing())
            .finish()
    }
}
