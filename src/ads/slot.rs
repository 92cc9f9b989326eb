//! Per-slot load/show state.

use crate::ads::network::{AdHandle, AdSlot};
use chrono::{DateTime, Utc};

/// App-open ads go stale after this many hours and are reloaded.
pub const APP_OPEN_AD_TTL_HOURS: i64 = 4;

/// Where a slot is in its load/show cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Nothing loaded or in flight.
    Idle,
    /// A load request is in flight.
    Loading,
    /// An ad is ready to show.
    Loaded,
    /// The ad is on screen.
    Showing,
}

#[derive(Debug)]
pub(crate) struct LoadedAd {
    pub(crate) handle: AdHandle,
    pub(crate) loaded_at: DateTime<Utc>,
}

/// State of one full-screen slot. At most one handle exists per slot.
#[derive(Debug)]
pub(crate) struct SlotState {
    pub(crate) slot: AdSlot,
    pub(crate) unit_id: Option<String>,
    pub(crate) loaded: Option<LoadedAd>,
    pub(crate) load_state: LoadState,
    pub(crate) last_dismissed_at: Option<DateTime<Utc>>,
}

/// Read-only view of a slot for hosts and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSnapshot {
    /// Slot this snapshot describes.
    pub slot: AdSlot,
    /// Unit identifier of the last load request.
    pub unit_id: Option<String>,
    /// Current state.
    pub load_state: LoadState,
    /// Whether a handle is held.
    pub has_ad: bool,
    /// When the last display of this slot was dismissed.
    pub last_dismissed_at: Option<DateTime<Utc>>,
}

impl SlotState {
    pub(crate) fn new(slot: AdSlot) -> Self {
        Self {
            slot,
            unit_id: None,
            loaded: None,
            load_state: LoadState::Idle,
            last_dismissed_at: None,
        }
    }

    /// Drop a stale app-open handle. Returns whether one was dropped.
    pub(crate) fn discard_if_expired(&mut self, now: DateTime<Utc>) -> bool {
        let expired = self.slot == AdSlot::AppOpen
            && self.load_state == LoadState::Loaded
            && self
                .loaded
                .as_ref()
                .is_some_and(|ad| now - ad.loaded_at > chrono::Duration::hours(APP_OPEN_AD_TTL_HOURS));
        if expired {
            self.loaded = None;
            self.load_state = LoadState::Idle;
        }
        expired
    }

    /// Whether a new load request may start.
    pub(crate) fn can_start_load(&self) -> bool {
        self.load_state == LoadState::Idle && self.loaded.is_none()
    }

    /// Whether a handle is ready to show.
    pub(crate) fn is_ready(&self) -> bool {
        self.load_state == LoadState::Loaded && self.loaded.is_some()
    }

    /// Move the handle out for display.
    pub(crate) fn take_for_show(&mut self) -> Option<AdHandle> {
        if !self.is_ready() {
            return None;
        }
        let ad = self.loaded.take()?;
        self.load_state = LoadState::Showing;
        Some(ad.handle)
    }

    pub(crate) fn snapshot(&self) -> SlotSnapshot {
        SlotSnapshot {
            slot: self.slot,
            unit_id: self.unit_id.clone(),
            load_state: self.load_state,
            has_ad: self.loaded.is_some(),
            last_dismissed_at: self.last_dismissed_at,
        }
    }
}
