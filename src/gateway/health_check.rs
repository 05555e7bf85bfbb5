//! On-demand liveness probing of registered backends

use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::config::ProbeConfig;
use crate::error::{AppError, Result};

/// Result of a single liveness probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Alive,
    /// Transport failure, timeout or any non-200 status
    Dead,
}

impl ProbeOutcome {
    pub fn is_alive(self) -> bool {
        matches!(self, ProbeOutcome::Alive)
    }
}

/// Issues a single `GET <url><path>` per probe, with no retries.
pub struct HealthProber {
    client: Client,
    path: String,
}

impl HealthProber {
    /// Create a new prober from configuration
    pub fn new(config: &ProbeConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.timeout());

        if config.accept_invalid_certs {
            // Security trade-off: backends registering with self-signed certificates
            // would otherwise always probe as Dead. This only affects the liveness GET;
            // the forwarding client keeps full certificate validation.
            warn!("Probe TLS certificate validation is disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create probe client: {}", e)))?;

        Ok(Self {
            client,
            path: config.path.clone(),
        })
    }

    /// Probe the backend at `base_url`
    pub async fn probe(&self, base_url: &str) -> ProbeOutcome {
        let url = format!("{}{}", base_url.trim_end_matches('/'), self.path);

        match self.client.get(&url).send().await {
            Ok(response) if response.status() == StatusCode::OK => {
                debug!(url = %url, "Health probe passed");
                ProbeOutcome::Alive
            }
            Ok(response) => {
                warn!(url = %url, status = %response.status(), "Health probe returned non-200");
                ProbeOutcome::Dead
            }
            Err(e) if e.is_timeout() => {
                warn!(url = %url, "Health probe timed out");
                ProbeOutcome::Dead
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Health probe failed");
                ProbeOutcome::Dead
            }
        }
    }
}
