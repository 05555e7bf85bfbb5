//! Application settings and configuration management

use crate::error::{AppError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub forward: ForwardConfig,
    #[serde(default)]
    pub exposure: ExposureConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Service registry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistryConfig {
    /// Maximum age of an entry since its last register/heartbeat
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
    /// Interval of the background expiry sweep
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_ttl() -> u64 {
    300
}

fn default_sweep_interval() -> u64 {
    60
}

impl RegistryConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

/// Liveness probe configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProbeConfig {
    #[serde(default = "default_probe_path")]
    pub path: String,
    #[serde(default = "default_probe_timeout")]
    pub timeout_ms: u64,
    /// Skip certificate validation on probe calls (self-signed backends)
    #[serde(default)]
    pub accept_invalid_certs: bool,
}

fn default_probe_path() -> String {
    "/health".to_string()
}

fn default_probe_timeout() -> u64 {
    3000
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            path: default_probe_path(),
            timeout_ms: default_probe_timeout(),
            accept_invalid_certs: false,
        }
    }
}

/// Forwarding configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForwardConfig {
    #[serde(default = "default_forward_timeout")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_forward_timeout() -> u64 {
    30000
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

impl ForwardConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_forward_timeout(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Public exposure (tunnel) configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExposureConfig {
    /// "local" or "ngrok"
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Custom public hostname
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default = "default_binary")]
    pub binary: String,
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,
}

fn default_provider() -> String {
    "local".to_string()
}

fn default_binary() -> String {
    "ngrok".to_string()
}

fn default_startup_timeout() -> u64 {
    30
}

impl ExposureConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }
}

impl Default for ExposureConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            auth_token: None,
            hostname: None,
            binary: default_binary(),
            startup_timeout_secs: default_startup_timeout(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Settings {
    /// Load settings from configuration files and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/default.toml")
    }

    /// Load settings from a specific configuration file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_str().ok_or_else(|| {
            AppError::Config(config::ConfigError::Message(
                "Configuration path is not valid UTF-8".to_string(),
            ))
        })?;

        let config = Config::builder()
            .set_default("server.host", default_host())?
            .set_default("server.port", i64::from(default_port()))?
            .set_default("registry.ttl_secs", default_ttl() as i64)?
            .set_default("exposure.provider", default_provider())?
            .add_source(File::with_name(path).required(false))
            // Override with environment variables (GATEWAY__SERVER__PORT, ...)
            .add_source(
                Environment::with_prefix("GATEWAY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(invalid("Server port cannot be 0"));
        }

        if self.registry.ttl_secs == 0 {
            return Err(invalid("Registry TTL must be greater than 0"));
        }

        if self.registry.sweep_interval_secs == 0 {
            return Err(invalid("Registry sweep interval must be greater than 0"));
        }

        if self.probe.timeout_ms == 0 {
            return Err(invalid("Probe timeout must be greater than 0"));
        }

        if self.forward.timeout_ms == 0 {
            return Err(invalid("Forward timeout must be greater than 0"));
        }

        if !["local", "ngrok"].contains(&self.exposure.provider.as_str()) {
            return Err(invalid(&format!(
                "Invalid exposure provider '{}'. Must be 'local' or 'ngrok'",
                self.exposure.provider
            )));
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err(invalid(&format!(
                "Invalid log format '{}'. Must be 'json' or 'pretty'",
                self.logging.format
            )));
        }

        Ok(())
    }
}

fn invalid(message: &str) -> AppError {
    AppError::Config(config::ConfigError::Message(message.to_string()))
}
