//! Application State

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use storefront_core::{Clock, SystemClock};
use storefront_licensing::{CheckoutProvider, LicenseStore, MemoryLicenseStore};
use storefront_progression::{MemoryViewerStore, ProgressionConfig, ViewerStore};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::hub::LiveHub;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Issued licenses and their activations
    pub licenses: Arc<dyn LicenseStore>,

    pub viewers: Arc<dyn ViewerStore>,

    /// Level table and activity rules, replaceable by admins
    pub progression: Arc<RwLock<ProgressionConfig>>,

    pub leaderboard_max_entries: Arc<AtomicUsize>,

    pub hub: Arc<LiveHub>,

    /// Stripe checkout (None if not configured)
    pub checkout: Option<Arc<dyn CheckoutProvider>>,

    pub clock: Arc<dyn Clock>,

    pub admin_token: Option<Arc<str>>,
}

impl AppState {
    /// In-memory stores on the system clock, payments disabled
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            licenses: Arc::new(MemoryLicenseStore::new()),
            viewers: Arc::new(MemoryViewerStore::new()),
            progression: Arc::new(RwLock::new(ProgressionConfig::default())),
            leaderboard_max_entries: Arc::new(AtomicUsize::new(config.leaderboard_max_entries)),
            hub: Arc::new(LiveHub::new(config.live_queue_capacity)),
            checkout: None,
            clock: Arc::new(SystemClock),
            admin_token: config.admin_token.as_deref().map(Arc::from),
        }
    }

    #[must_use]
    pub fn with_checkout(mut self, checkout: Arc<dyn CheckoutProvider>) -> Self {
        self.checkout = Some(checkout);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Copy of the current progression config
    pub fn progression_config(&self) -> Result<ProgressionConfig, ServerError> {
        self.progression
            .read()
            .map(|config| config.clone())
            .map_err(|_| ServerError::Internal("progression config lock poisoned".into()))
    }

    pub fn update_progression(
        &self,
        update: impl FnOnce(&mut ProgressionConfig),
    ) -> Result<ProgressionConfig, ServerError> {
        let mut config = self
            .progression
            .write()
            .map_err(|_| ServerError::Internal("progression config lock poisoned".into()))?;
        update(&mut config);
        Ok(config.clone())
    }

    pub fn leaderboard_max_entries(&self) -> usize {
        self.leaderboard_max_entries.load(Ordering::Relaxed)
    }
}
