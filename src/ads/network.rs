//! Ad network SDK seam.
//!
//! The orchestrator only needs three capabilities from a vendor SDK:
//! initialize, load, and show with a stream of display events. Response
//! metadata rides along for diagnostics and never drives control flow.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Ad surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdSlot {
    /// Full-screen ad shown when the app comes to the foreground.
    AppOpen,
    /// Full-screen ad shown at natural breaks.
    Interstitial,
    /// Full-screen ad that grants a reward when watched to completion.
    Rewarded,
    /// Ad rendered inside the host's own layout.
    Native,
}

impl AdSlot {
    /// Full-screen slots managed through preload/show cycles.
    pub const FULL_SCREEN: [AdSlot; 3] = [AdSlot::AppOpen, AdSlot::Interstitial, AdSlot::Rewarded];

    /// Whether displays of this slot are frequency-capped.
    pub fn is_frequency_capped(&self) -> bool {
        matches!(self, AdSlot::AppOpen | AdSlot::Interstitial)
    }
}

impl fmt::Display for AdSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AdSlot::AppOpen => "app_open",
            AdSlot::Interstitial => "interstitial",
            AdSlot::Rewarded => "rewarded",
            AdSlot::Native => "native",
        };
        f.write_str(name)
    }
}

/// Error reported by the ad SDK.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{domain} error {code}: {message}")]
pub struct AdError {
    /// Vendor error code.
    pub code: i32,
    /// Vendor message.
    pub message: String,
    /// Error domain (SDK or adapter name).
    pub domain: String,
}

impl AdError {
    /// Create an error.
    pub fn new(code: i32, message: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            domain: domain.into(),
        }
    }
}

/// Diagnostics attached to a loaded ad.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseInfo {
    /// Adapter that filled the request.
    pub adapter: Option<String>,
    /// Time the mediation chain took.
    pub latency: Option<Duration>,
    /// Response identifier for support tickets.
    pub response_id: Option<String>,
}

/// Opaque handle to a loaded ad.
///
/// Full-screen handles are owned by the orchestrator until shown or
/// discarded; native handles are handed to the caller.
#[derive(Debug, PartialEq, Eq)]
pub struct AdHandle {
    id: u64,
    slot: AdSlot,
    response: ResponseInfo,
}

impl AdHandle {
    /// Wrap a vendor ad object identified by `id`.
    pub fn new(id: u64, slot: AdSlot, response: ResponseInfo) -> Self {
        Self { id, slot, response }
    }

    /// Vendor-side identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Surface this ad was loaded for.
    pub fn slot(&self) -> AdSlot {
        self.slot
    }

    /// Diagnostics from the ad response.
    pub fn response(&self) -> &ResponseInfo {
        &self.response
    }
}

/// Reward granted by a rewarded ad.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardItem {
    /// Reward amount.
    pub amount: i32,
    /// Reward type label.
    pub kind: String,
}

/// Events emitted while a full-screen ad is on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShowEvent {
    /// The ad started showing.
    Shown,
    /// An impression was recorded.
    Impression,
    /// The user clicked the ad.
    Clicked,
    /// The user earned the reward.
    Rewarded(RewardItem),
    /// The user closed the ad.
    Dismissed,
    /// The ad could not be shown.
    FailedToShow(AdError),
}

/// Completion handler for SDK initialization.
pub type InitCallback = Box<dyn FnOnce(Result<(), AdError>) + Send>;

/// Completion handler for a load request.
pub type LoadCallback = Box<dyn FnOnce(Result<AdHandle, AdError>) + Send>;

/// Receiver for show events. May be called from any thread, any number of
/// times, including after the show has been resolved.
pub type ShowEventSink = Arc<dyn Fn(ShowEvent) + Send + Sync>;

/// An ad network SDK.
pub trait AdNetwork: Send + Sync {
    /// Initialize the SDK with the effective application identifier.
    fn initialize(&self, app_id: &str, done: InitCallback);

    /// Request an ad for `unit_id`.
    fn load(&self, slot: AdSlot, unit_id: &str, done: LoadCallback);

    /// Present a loaded full-screen ad.
    fn show(&self, ad: AdHandle, events: ShowEventSink);
}
