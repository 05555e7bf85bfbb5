//! Exposure without a tunnel: reports the directly reachable address

use async_trait::async_trait;
use tracing::info;

use super::ExposureManager;
use crate::error::Result;

/// Reports `http://<hostname>:<port>` and opens nothing
pub struct LocalExposure {
    hostname: Option<String>,
}

impl LocalExposure {
    pub fn new(hostname: Option<String>) -> Self {
        Self { hostname }
    }
}

#[async_trait]
impl ExposureManager for LocalExposure {
    fn name(&self) -> &str {
        "local"
    }

    async fn connect(&self, port: u16) -> Result<String> {
        let host = self.hostname.as_deref().unwrap_or("127.0.0.1");
        let url = format!("http://{}:{}", host, port);
        info!(url = %url, "Gateway exposed without tunnel");
        Ok(url)
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }
}
