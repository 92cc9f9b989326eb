//! Ad loading, display and frequency capping.

pub mod consent;
pub mod frequency;
pub mod network;
pub mod orchestrator;
pub mod slot;

pub use consent::{ConsentCallback, ConsentCoordinator, ConsentError, ConsentProvider};
pub use frequency::{FrequencyCheck, FrequencyPolicy};
pub use network::{
    AdError, AdHandle, AdNetwork, AdSlot, InitCallback, LoadCallback, ResponseInfo, RewardItem,
    ShowEvent, ShowEventSink,
};
pub use orchestrator::{
    AdFailure, AdLifecycleOrchestrator, NativeCallback, ShowCallback, ShowOutcome,
};
pub use slot::{LoadState, SlotSnapshot, APP_OPEN_AD_TTL_HOURS};
