//! Application state management

use crate::config::{AppConfig, ConfigStore, DEFAULT_PORT};
use crate::sinks::SinkHub;
use hb_core::{CanonicalState, CommandGuard, VehicleClient};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Current configuration; replaced wholesale on every update
    pub config: Arc<RwLock<AppConfig>>,

    pub config_store: ConfigStore,

    /// Attached vehicle client (None until the session manager attaches one)
    pub vehicle: Arc<RwLock<Option<Arc<dyn VehicleClient>>>>,

    /// Single-flight guard for every vehicle-facing operation
    pub guard: CommandGuard,

    pub sinks: SinkHub,

    /// Canonical state from the most recent status fetch
    pub latest: Arc<RwLock<Option<CanonicalState>>>,

    /// Cached blower state, drives the climate toggle
    climate_on: Arc<AtomicBool>,

    /// Broadcast channel for canonical states
    pub state_tx: broadcast::Sender<CanonicalState>,

    pub listen_port: u16,

    /// Directory served for paths not matched by the API
    pub public_dir: PathBuf,
}

impl AppState {
    pub fn new(config_store: ConfigStore, config: AppConfig) -> Self {
        let (state_tx, _) = broadcast::channel(16);

        Self {
            config: Arc::new(RwLock::new(config)),
            config_store,
            vehicle: Arc::new(RwLock::new(None)),
            guard: CommandGuard::new(),
            sinks: SinkHub::new(),
            latest: Arc::new(RwLock::new(None)),
            climate_on: Arc::new(AtomicBool::new(false)),
            state_tx,
            listen_port: DEFAULT_PORT,
            public_dir: PathBuf::from("public"),
        }
    }

    pub fn with_listen_port(mut self, port: u16) -> Self {
        self.listen_port = port;
        self
    }

    pub fn with_public_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.public_dir = dir.into();
        self
    }

    pub async fn attach_vehicle(&self, vehicle: Arc<dyn VehicleClient>) {
        *self.vehicle.write().await = Some(vehicle);
    }

    pub async fn vehicle(&self) -> Option<Arc<dyn VehicleClient>> {
        self.vehicle.read().await.clone()
    }

    /// Remember a freshly built state and notify stream subscribers
    pub async fn record(&self, state: &CanonicalState) {
        self.climate_on.store(state.climate_on, Ordering::Release);
        *self.latest.write().await = Some(state.clone());
        // No subscribers is fine
        let _ = self.state_tx.send(state.clone());
    }

    pub fn climate_on(&self) -> bool {
        self.climate_on.load(Ordering::Acquire)
    }

    /// Subscribe to canonical state updates
    pub fn subscribe(&self) -> broadcast::Receiver<CanonicalState> {
        self.state_tx.subscribe()
    }
}
