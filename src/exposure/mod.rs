//! Public exposure of the gateway's listening address

pub mod local;
pub mod ngrok;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::ExposureConfig;
use crate::error::{AppError, Result};

pub use local::LocalExposure;
pub use ngrok::NgrokExposure;

/// Publishes the gateway under a public address and tears it down again.
///
/// `connect` runs once at startup; `disconnect` runs during shutdown before
/// the listener is closed.
#[async_trait]
pub trait ExposureManager: Send + Sync {
    /// Provider name, for logging
    fn name(&self) -> &str;

    /// Expose the local listener on `port`, returning the public URL
    async fn connect(&self, port: u16) -> Result<String>;

    /// Tear down the exposure; a no-op if never connected
    async fn disconnect(&self) -> Result<()>;
}

/// Build the exposure manager selected by `config.provider`
pub fn from_config(config: &ExposureConfig) -> Result<Arc<dyn ExposureManager>> {
    match config.provider.as_str() {
        "local" => Ok(Arc::new(LocalExposure::new(config.hostname.clone()))),
        "ngrok" => Ok(Arc::new(NgrokExposure::new(config))),
        other => Err(AppError::Exposure(format!(
            "Unknown exposure provider '{}'",
            other
        ))),
    }
}
