//! Per-request orchestration: resolve, probe, forward

use axum::{extract::Request, response::Response};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::gateway::forwarder::Forwarder;
use crate::gateway::health_check::HealthProber;
use crate::gateway::registry::ServiceRegistry;

/// Drives a proxied request through resolve → probe → forward.
///
/// Each step either advances the request or ends it with an error that maps to
/// the response status: not registered (503), probe failed (503), transport
/// failure while forwarding (502).
///
/// A failed probe evicts the entry only while it still points at the probed
/// URL (`ServiceRegistry::deregister_url`); a re-registration under a new URL
/// that lands mid-probe is kept.
pub struct Dispatcher {
    registry: Arc<ServiceRegistry>,
    prober: Arc<HealthProber>,
    forwarder: Arc<Forwarder>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        prober: Arc<HealthProber>,
        forwarder: Arc<Forwarder>,
    ) -> Self {
        Self {
            registry,
            prober,
            forwarder,
        }
    }

    /// Proxy `request` to the backend registered as `service_name`
    pub async fn dispatch(&self, service_name: &str, request: Request) -> Result<Response> {
        let url = self.registry.resolve(service_name).map_err(|e| {
            debug!(service = %service_name, "Service not registered");
            e
        })?;

        if !self.prober.probe(&url).await.is_alive() {
            warn!(service = %service_name, url = %url, "Backend failed health probe, deregistering");
            self.registry.deregister_url(service_name, &url);
            return Err(AppError::HealthCheckFailed(service_name.to_string()));
        }

        self.forwarder.forward(request, service_name, &url).await
    }
}
