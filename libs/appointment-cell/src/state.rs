// libs/appointment-cell/src/state.rs
use std::sync::Arc;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::services::{ClinicDayService, DelayDetector, QueueLocks};
use crate::stores::ClinicStores;

/// Chooses the stores a request works against.
pub trait StoreProvider: Send + Sync {
    fn stores_for(&self, auth_token: &str) -> ClinicStores;
}

/// PostgREST-backed stores that act with the caller's own token.
pub struct SupabaseStoreProvider {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseStoreProvider {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }
}

impl StoreProvider for SupabaseStoreProvider {
    fn stores_for(&self, auth_token: &str) -> ClinicStores {
        ClinicStores::supabase(Arc::clone(&self.supabase), Some(auth_token))
    }
}

/// One set of stores shared by every request.
pub struct FixedStoreProvider {
    stores: ClinicStores,
}

impl FixedStoreProvider {
    pub fn new(stores: ClinicStores) -> Self {
        Self { stores }
    }
}

impl StoreProvider for FixedStoreProvider {
    fn stores_for(&self, _auth_token: &str) -> ClinicStores {
        self.stores.clone()
    }
}

#[derive(Clone)]
pub struct AppointmentCellState {
    pub config: Arc<AppConfig>,
    pub locks: QueueLocks,
    pub delay: DelayDetector,
    provider: Arc<dyn StoreProvider>,
}

impl AppointmentCellState {
    pub fn new(config: Arc<AppConfig>, provider: Arc<dyn StoreProvider>) -> Self {
        let delay = DelayDetector::from_config(&config);
        Self {
            config,
            locks: QueueLocks::new(),
            delay,
            provider,
        }
    }

    pub fn supabase(config: Arc<AppConfig>) -> Self {
        let provider = Arc::new(SupabaseStoreProvider::new(&config));
        Self::new(config, provider)
    }

    pub fn with_stores(config: Arc<AppConfig>, stores: ClinicStores) -> Self {
        Self::new(config, Arc::new(FixedStoreProvider::new(stores)))
    }

    pub fn service_for(&self, auth_token: &str) -> ClinicDayService {
        ClinicDayService::new(
            self.provider.stores_for(auth_token),
            self.locks.clone(),
            self.delay,
        )
    }
}
