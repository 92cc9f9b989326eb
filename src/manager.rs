//! Monetization Manager - the main public API for Adwarden.
//!
//! The `MonetizationManager` owns every long-lived component and gives them
//! an explicit lifecycle:
//! - `new` validates configuration and wires nothing yet
//! - `init` fetches remote config, applies the app id override, starts
//!   billing, gathers consent and initializes the ad SDK
//! - `shutdown` releases ads and disconnects billing
//!
//! Components are reachable only between `init` and `shutdown`; earlier or
//! later access is a programmer error reported as `NotInitialized`.

use crate::ads::{
    AdLifecycleOrchestrator, AdNetwork, AdSlot, ConsentCoordinator, ConsentProvider, ShowOutcome,
};
use crate::billing::{BillingClient, SubscriptionOrchestrator};
use crate::clock::{Clock, SystemClock};
use crate::config::{AdUnits, AdwardenConfig};
use crate::identity::{apply_app_id_override, IdentifierStore};
use crate::premium::PremiumGate;
use crate::remote::{ConfigResolver, FetchStatus, RemoteConfigSource, RemoteFetchGateway};
use crate::scheduler::{Scheduler, TokioScheduler};
use crate::store::{FileKeyValueStore, KeyValueStore};
use crate::AdwardenError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

/// Vendor SDKs and platform services the manager drives.
#[derive(Clone)]
pub struct Collaborators {
    /// Remote configuration backend.
    pub remote: Arc<dyn RemoteConfigSource>,
    /// Ad network SDK.
    pub ad_network: Arc<dyn AdNetwork>,
    /// Consent SDK. Without one, ads are requested without gathering consent.
    pub consent: Option<Arc<dyn ConsentProvider>>,
    /// Billing SDK.
    pub billing: Arc<dyn BillingClient>,
    /// Process-visible application identifier.
    pub identifier_store: Arc<dyn IdentifierStore>,
    /// Persistent flag store. Without one, a [`FileKeyValueStore`] is opened
    /// for `AdwardenConfig::store_namespace`.
    pub store: Option<Arc<dyn KeyValueStore>>,
}

/// What `init` found and did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartupReport {
    /// Whether the blocking remote fetch delivered values.
    pub remote_fetch_succeeded: bool,
    /// When remote values were last applied.
    pub last_successful_fetch: Option<DateTime<Utc>>,
    /// Identifier the ad SDK was initialized with.
    pub app_id: String,
    /// Whether the identifier was replaced by an override.
    pub app_id_overridden: bool,
}

#[derive(Clone)]
struct Components {
    resolver: Arc<ConfigResolver>,
    premium: Arc<PremiumGate>,
    ads: AdLifecycleOrchestrator,
    billing: SubscriptionOrchestrator,
}

enum Lifecycle {
    Created,
    Starting,
    Running(Components),
    ShutDown,
}

/// Main entry point for Adwarden.
///
/// Create one instance at process start and pass it (or the components it
/// hands out) to every consumer.
pub struct MonetizationManager {
    config: AdwardenConfig,
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn Scheduler>,
    collaborators: Collaborators,
    store: Arc<dyn KeyValueStore>,
    lifecycle: Mutex<Lifecycle>,
}

impl MonetizationManager {
    /// Create a manager on the current tokio runtime with the system clock.
    ///
    /// # Errors
    /// Returns an error if:
    /// - Configuration validation fails
    /// - No tokio runtime is running on this thread
    pub fn new(config: AdwardenConfig, collaborators: Collaborators) -> Result<Self, AdwardenError> {
        let scheduler = TokioScheduler::current()?;
        Self::with_runtime(config, collaborators, Arc::new(SystemClock), Arc::new(scheduler))
    }

    /// Create a manager with an explicit clock and scheduler.
    ///
    /// # Errors
    /// Returns an error if:
    /// - Configuration validation fails
    /// - No store was supplied and the default file store cannot be opened
    pub fn with_runtime(
        config: AdwardenConfig,
        collaborators: Collaborators,
        clock: Arc<dyn Clock>,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<Self, AdwardenError> {
        config.validate()?;
        let store = open_store(collaborators.store.clone(), &config.store_namespace)?;
        Ok(Self {
            config,
            clock,
            scheduler,
            collaborators,
            store,
            lifecycle: Mutex::new(Lifecycle::Created),
        })
    }

    /// The validated configuration.
    pub fn config(&self) -> &AdwardenConfig {
        &self.config
    }

    /// Bring every component up.
    ///
    /// This performs the startup sequence:
    /// 1. Blocking remote fetch, bounded by `fetch_timeout`
    /// 2. App id override from the resolved configuration
    /// 3. Billing connection and purchase sync
    /// 4. Consent gathering, then ad SDK initialization with the effective
    ///    app id, then preloading
    ///
    /// Blocks the caller for at most `fetch_timeout`.
    ///
    /// # Errors
    /// - `AlreadyInitialized` - `init` already ran, or the manager was shut down
    /// - `ConfigError` - Application defaults failed validation
    pub fn init(&self) -> Result<StartupReport, AdwardenError> {
        {
            let mut lifecycle = self.lifecycle();
            if !matches!(*lifecycle, Lifecycle::Created) {
                return Err(AdwardenError::AlreadyInitialized);
            }
            *lifecycle = Lifecycle::Starting;
        }

        // 1. Remote config
        let gateway = RemoteFetchGateway::new(
            Arc::clone(&self.collaborators.remote),
            Arc::clone(&self.scheduler),
            Arc::clone(&self.clock),
            self.config.fetch_timeout,
        );
        let remote_fetch_succeeded = gateway.fetch_blocking(self.config.fetch_timeout);
        if gateway.status() == FetchStatus::TimedOut {
            warn!("Starting with fallback configuration; remote values will apply on arrival");
        }
        let last_successful_fetch = gateway.last_successful_fetch();
        let resolver = match ConfigResolver::new(self.config.defaults.clone(), gateway) {
            Ok(resolver) => Arc::new(resolver),
            Err(e) => {
                *self.lifecycle() = Lifecycle::Created;
                return Err(e);
            }
        };

        // 2. App id override
        let identifier_store = self.collaborators.identifier_store.as_ref();
        let app_id_overridden = resolver
            .app_id_override()
            .is_some_and(|candidate| apply_app_id_override(identifier_store, &candidate));
        let app_id = identifier_store
            .read()
            .filter(|id| !id.trim().is_empty())
            .or_else(|| self.config.defaults.app_id.clone())
            .unwrap_or_else(|| AdUnits::APP_ID.to_string());

        // 3. Billing
        let premium = Arc::new(PremiumGate::new(
            Arc::clone(&self.store),
            Arc::clone(&resolver),
        ));
        let ads = AdLifecycleOrchestrator::new(
            Arc::clone(&self.collaborators.ad_network),
            Arc::clone(&resolver),
            Arc::clone(&premium),
            Arc::clone(&self.clock),
            Arc::clone(&self.scheduler),
        );
        let billing = SubscriptionOrchestrator::new(
            Arc::clone(&self.collaborators.billing),
            Arc::clone(&premium),
            Arc::clone(&self.scheduler),
            &self.config,
        );

        {
            let mut lifecycle = self.lifecycle();
            if !matches!(*lifecycle, Lifecycle::Starting) {
                // Shut down while the fetch was in flight.
                return Err(AdwardenError::AlreadyInitialized);
            }
            *lifecycle = Lifecycle::Running(Components {
                resolver,
                premium,
                ads: ads.clone(),
                billing: billing.clone(),
            });
        }

        billing.start();

        // 4. Consent, SDK, preload
        let network = Arc::clone(&self.collaborators.ad_network);
        let sdk_app_id = app_id.clone();
        let start_ads = move || {
            network.initialize(
                &sdk_app_id,
                Box::new(move |result| match result {
                    Ok(()) => {
                        info!("Ad SDK initialized");
                        ads.mark_sdk_ready();
                        ads.preload_all();
                    }
                    Err(e) => warn!(error = %e, "Ad SDK failed to initialize"),
                }),
            )
        };
        match &self.collaborators.consent {
            Some(provider) => {
                let coordinator = ConsentCoordinator::new(Arc::clone(provider));
                coordinator.gather(move |allowed| {
                    if allowed {
                        start_ads();
                    } else {
                        info!("Consent does not allow ad requests; ads stay off");
                    }
                });
            }
            None => start_ads(),
        }

        let report = StartupReport {
            remote_fetch_succeeded,
            last_successful_fetch,
            app_id,
            app_id_overridden,
        };
        info!(
            remote = report.remote_fetch_succeeded,
            app_id = %report.app_id,
            overridden = report.app_id_overridden,
            "Monetization started"
        );
        Ok(report)
    }

    /// Configuration resolver.
    ///
    /// # Errors
    /// `NotInitialized` outside `init`..`shutdown`.
    pub fn resolver(&self) -> Result<Arc<ConfigResolver>, AdwardenError> {
        Ok(self.components("resolver")?.resolver)
    }

    /// Premium gate.
    ///
    /// # Errors
    /// `NotInitialized` outside `init`..`shutdown`.
    pub fn premium(&self) -> Result<Arc<PremiumGate>, AdwardenError> {
        Ok(self.components("premium")?.premium)
    }

    /// Ad orchestrator.
    ///
    /// # Errors
    /// `NotInitialized` outside `init`..`shutdown`.
    pub fn ads(&self) -> Result<AdLifecycleOrchestrator, AdwardenError> {
        Ok(self.components("ads")?.ads)
    }

    /// Subscription orchestrator.
    ///
    /// # Errors
    /// `NotInitialized` outside `init`..`shutdown`.
    pub fn billing(&self) -> Result<SubscriptionOrchestrator, AdwardenError> {
        Ok(self.components("billing")?.billing)
    }

    /// Show `slot` with the configured show timeout.
    ///
    /// # Errors
    /// `NotInitialized` outside `init`..`shutdown`. Ad failures go to `done`.
    pub fn show_ad<F>(&self, slot: AdSlot, done: F) -> Result<(), AdwardenError>
    where
        F: FnOnce(ShowOutcome) + Send + 'static,
    {
        self.ads()?.show(slot, self.config.show_timeout, done);
        Ok(())
    }

    /// Lifecycle hook for the app returning to the foreground: preloads
    /// every slot that is idle.
    ///
    /// # Errors
    /// `NotInitialized` outside `init`..`shutdown`.
    pub fn on_foreground(&self) -> Result<(), AdwardenError> {
        self.ads()?.preload_all();
        Ok(())
    }

    /// Fetch remote config in the background; `done` receives whether new
    /// values were applied.
    ///
    /// # Errors
    /// `NotInitialized` outside `init`..`shutdown`.
    pub fn refresh_config<F>(&self, done: F) -> Result<(), AdwardenError>
    where
        F: FnOnce(bool) + Send + 'static,
    {
        self.resolver()?.gateway().fetch_async(done);
        Ok(())
    }

    /// Release every component. Idempotent.
    pub fn shutdown(&self) {
        let previous = std::mem::replace(&mut *self.lifecycle(), Lifecycle::ShutDown);
        if let Lifecycle::Running(components) = previous {
            components.ads.shutdown();
            components.billing.shutdown();
            info!("Monetization shut down");
        }
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn components(&self, component: &'static str) -> Result<Components, AdwardenError> {
        match &*self.lifecycle() {
            Lifecycle::Running(components) => Ok(components.clone()),
            _ => Err(AdwardenError::NotInitialized { component }),
        }
    }
}

fn open_store(
    supplied: Option<Arc<dyn KeyValueStore>>,
    namespace: &str,
) -> Result<Arc<dyn KeyValueStore>, AdwardenError> {
    match supplied {
        Some(store) => Ok(store),
        None => Ok(Arc::new(FileKeyValueStore::new(namespace)?)),
    }
}

impl std::fmt::Debug for MonetizationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &*self.lifecycle() {
            Lifecycle::Created => "created",
            Lifecycle::Starting => "starting",
            Lifecycle::Running(_) => "running",
            Lifecycle::ShutDown => "shut_down",
        };
        f.debug_struct("MonetizationManager")
            .field("config", &self.config)
            .field("state", &state)
            .finish()
    }
}
