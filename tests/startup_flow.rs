//! End-to-end startup, ad and purchase flows through the public API.

mod common;

use adwarden::ads::{AdSlot, ShowOutcome};
use adwarden::billing::{BillingResponseCode, BillingResult, PurchaseFlowState, SubscriptionStatus};
use adwarden::{
    AdUnits, AdwardenConfig, AdwardenError, AppDefaults, FeatureAccess, FileKeyValueStore,
    MonetizationManager,
};
use common::{harness, harness_with_store, purchase, StaticRemote, StubBilling, PRODUCT};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const REMOTE_APP_ID: &str = "ca-app-pub-9876543210987654~9876543210";

fn manager(collaborators: adwarden::Collaborators) -> MonetizationManager {
    MonetizationManager::new(AdwardenConfig::new(PRODUCT), collaborators).unwrap()
}

#[test]
fn new_outside_runtime_is_rejected() {
    let h = harness(StaticRemote::unreachable(), StubBilling::connected());
    let result = MonetizationManager::new(AdwardenConfig::new(PRODUCT), h.collaborators);
    assert!(matches!(result, Err(AdwardenError::Runtime(_))));
}

#[tokio::test]
async fn components_require_init() {
    let h = harness(StaticRemote::unreachable(), StubBilling::connected());
    let manager = manager(h.collaborators);

    assert!(matches!(
        manager.premium(),
        Err(AdwardenError::NotInitialized { component: "premium" })
    ));
    assert!(manager.on_foreground().is_err());
}

#[tokio::test]
async fn offline_start_with_no_defaults_uses_library_fallbacks() {
    let h = harness(StaticRemote::unreachable(), StubBilling::connected());
    let manager = manager(h.collaborators);

    let report = manager.init().unwrap();
    assert!(!report.remote_fetch_succeeded);
    assert_eq!(report.last_successful_fetch, None);

    let resolver = manager.resolver().unwrap();
    assert_eq!(resolver.open_ad_unit(), AdUnits::OPEN);
    assert_eq!(resolver.inter_ad_unit(), AdUnits::INTERSTITIAL);
    assert_eq!(resolver.ad_frequency_seconds(), 30);
    assert_eq!(h.network.loads_for(AdSlot::AppOpen), vec![AdUnits::OPEN.to_string()]);
}

#[tokio::test]
async fn remote_values_beat_application_defaults() {
    let h = harness(
        StaticRemote::with(&[("inter_ad_unit", "remote-inter"), ("ad_frequency_seconds", "90")]),
        StubBilling::connected(),
    );
    let config = AdwardenConfig::new(PRODUCT).with_defaults(AppDefaults {
        inter_ad_unit: Some("app-inter".to_string()),
        reward_ad_unit: Some("app-reward".to_string()),
        ..Default::default()
    });
    let manager = MonetizationManager::new(config, h.collaborators).unwrap();
    manager.init().unwrap();

    let resolver = manager.resolver().unwrap();
    assert_eq!(resolver.inter_ad_unit(), "remote-inter");
    assert_eq!(resolver.reward_ad_unit(), "app-reward");
    assert_eq!(resolver.ad_frequency_seconds(), 90);
    assert_eq!(h.network.loads_for(AdSlot::Rewarded), vec!["app-reward".to_string()]);
}

#[tokio::test]
async fn remote_app_id_reaches_the_ad_sdk() {
    let h = harness(
        StaticRemote::with(&[("admob_app_id", REMOTE_APP_ID)]),
        StubBilling::connected(),
    );
    let manager = manager(h.collaborators);

    let report = manager.init().unwrap();
    assert!(report.app_id_overridden);
    assert_eq!(h.identifiers.write_count(), 1);
    assert_eq!(
        *h.network.initialized_with.lock().unwrap(),
        vec![REMOTE_APP_ID.to_string()]
    );
}

#[tokio::test]
async fn rewarded_ad_unlocks_feature_then_interstitial_is_capped() {
    let h = harness(StaticRemote::unreachable(), StubBilling::connected());
    let manager = manager(h.collaborators);
    manager.init().unwrap();

    assert_eq!(manager.premium().unwrap().feature_access(), FeatureAccess::WatchAd);

    let outcomes = Arc::new(Mutex::new(Vec::new()));
    for slot in [AdSlot::Rewarded, AdSlot::Interstitial, AdSlot::Interstitial] {
        let sink = Arc::clone(&outcomes);
        manager
            .show_ad(slot, move |outcome| sink.lock().unwrap().push(outcome))
            .unwrap();
    }

    let outcomes = outcomes.lock().unwrap();
    assert_eq!(outcomes.len(), 3);
    match &outcomes[0] {
        ShowOutcome::Completed { reward: Some(reward) } => assert_eq!(reward.kind, "unlock"),
        other => panic!("unexpected rewarded outcome: {other:?}"),
    }
    assert!(outcomes[1].is_completed());
    assert!(matches!(
        &outcomes[2],
        ShowOutcome::Failed(adwarden::ads::AdFailure::FrequencyCapped { .. })
    ));
}

#[tokio::test]
async fn purchase_turns_ads_off() {
    let h = harness(StaticRemote::unreachable(), StubBilling::connected());
    let manager = manager(h.collaborators);
    manager.init().unwrap();

    let billing = manager.billing().unwrap();
    assert_eq!(billing.status(), SubscriptionStatus::Inactive);
    assert!(billing.pricing_summary().is_some());

    billing.launch_purchase_flow();
    assert_eq!(billing.flow_state(), PurchaseFlowState::Processing);
    assert_eq!(h.billing.launches.lock().unwrap()[0].offer_token, "monthly-offer");

    billing.on_purchases_updated(BillingResult::ok(), vec![purchase("tok-1", false)]);

    assert_eq!(billing.status(), SubscriptionStatus::Active);
    assert!(matches!(billing.flow_state(), PurchaseFlowState::Success(_)));
    assert_eq!(manager.premium().unwrap().feature_access(), FeatureAccess::Direct);
    assert!(!manager.ads().unwrap().ads_enabled());

    let outcome = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&outcome);
    manager
        .show_ad(AdSlot::Interstitial, move |o| *sink.lock().unwrap() = Some(o))
        .unwrap();
    assert!(matches!(
        outcome.lock().unwrap().as_ref(),
        Some(ShowOutcome::Failed(adwarden::ads::AdFailure::AdsDisabled))
    ));
}

#[tokio::test]
async fn subscription_record_survives_restart_while_billing_is_down() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FileKeyValueStore::with_path(dir.path().to_path_buf()).unwrap());

    let first = harness_with_store(StaticRemote::unreachable(), StubBilling::connected(), store);
    first
        .billing
        .purchases
        .lock()
        .unwrap()
        .push(purchase("tok-1", true));
    let manager_one = manager(first.collaborators);
    manager_one.init().unwrap();
    assert!(manager_one.premium().unwrap().has_premium_access());
    manager_one.shutdown();

    let reopened = Arc::new(FileKeyValueStore::with_path(dir.path().to_path_buf()).unwrap());
    let second = harness_with_store(
        StaticRemote::unreachable(),
        StubBilling::with_connect(BillingResult::new(
            BillingResponseCode::BillingUnavailable,
            "no store",
        )),
        reopened,
    );
    let manager_two = manager(second.collaborators);
    manager_two.init().unwrap();

    assert!(manager_two.premium().unwrap().has_premium_access());
    assert!(second.network.loads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn refresh_config_reports_on_the_runtime() {
    let h = harness(
        StaticRemote::with(&[("premium_mode", "true")]),
        StubBilling::connected(),
    );
    let manager = manager(h.collaborators);
    manager.init().unwrap();
    assert!(manager.premium().unwrap().should_show_paywall());

    let (tx, rx) = tokio::sync::oneshot::channel();
    manager
        .refresh_config(move |applied| {
            let _ = tx.send(applied);
        })
        .unwrap();
    assert!(rx.await.unwrap());
}
