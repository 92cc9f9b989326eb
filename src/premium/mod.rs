//! Premium access: subscription record and feature gating.

pub mod gate;

pub use gate::{FeatureAccess, PremiumGate, SUBSCRIPTION_KEY};
