//! Service Gateway
//!
//! Lets independently started backends register themselves by name and URL,
//! keeps that registry fresh through heartbeats and TTL expiry, probes each
//! backend right before use, and proxies `/api/<service>/...` traffic to it.

pub mod api;
pub mod config;
pub mod error;
pub mod exposure;
pub mod gateway;

pub use error::{AppError, Result};

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use gateway::{
    dispatcher::Dispatcher, forwarder::Forwarder, health_check::HealthProber,
    registry::ServiceRegistry,
};

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Arc<config::Settings>,
    pub registry: Arc<ServiceRegistry>,
    pub dispatcher: Arc<Dispatcher>,
    sweep_task: Mutex<Option<JoinHandle<()>>>,
}

impl AppState {
    /// Wire the registry, prober and forwarder from settings
    pub fn new(settings: config::Settings) -> Result<Self> {
        let registry = Arc::new(ServiceRegistry::new(settings.registry.ttl()));
        let prober = Arc::new(HealthProber::new(&settings.probe)?);
        let forwarder = Arc::new(Forwarder::new(&settings.forward)?);
        let dispatcher = Arc::new(Dispatcher::new(registry.clone(), prober, forwarder));

        Ok(Self {
            settings: Arc::new(settings),
            registry,
            dispatcher,
            sweep_task: Mutex::new(None),
        })
    }

    /// Start the periodic registry sweep; replaces any running sweep
    pub fn start_sweeper(&self) {
        let handle = self
            .registry
            .spawn_sweeper(self.settings.registry.sweep_interval());
        if let Some(previous) = self.sweep_task.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Stop the periodic registry sweep
    pub fn stop_sweeper(&self) {
        if let Some(handle) = self.sweep_task.lock().take() {
            handle.abort();
            info!("Stopped registry sweep task");
        }
    }
}
