//! Service registry with heartbeat-driven TTL expiry

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{AppError, Result};

/// A registered backend service
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub service_url: String,
    /// Monotonic refresh time, used for expiry
    pub last_refreshed_at: Instant,
    pub registered_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
}

impl RegistryEntry {
    fn new(service_url: String) -> Self {
        let now = Utc::now();
        Self {
            service_url,
            last_refreshed_at: Instant::now(),
            registered_at: now,
            last_heartbeat: now,
        }
    }

    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.last_refreshed_at) > ttl
    }
}

/// Point-in-time view of an active entry, as reported by `/health`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSnapshot {
    pub service: String,
    pub url: String,
    pub status: &'static str,
    pub registered_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
}

/// Concurrent map from service name to backend URL.
///
/// Entries expire `ttl` after their last register/heartbeat. Expiry is computed
/// on read; `sweep_expired` (or the task from `spawn_sweeper`) reclaims entries
/// nobody looks up anymore.
pub struct ServiceRegistry {
    services: DashMap<String, RegistryEntry>,
    ttl: Duration,
}

impl ServiceRegistry {
    /// Create a new registry with the given entry TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            services: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Register a service, overwriting any previous URL for the same name
    pub fn register(&self, name: &str, url: &str) -> Result<()> {
        let (name, url) = validate(name, url)?;

        let previous = self
            .services
            .insert(name.to_string(), RegistryEntry::new(url.to_string()));

        match previous {
            Some(prev) if prev.service_url != url => info!(
                service = %name,
                old_url = %prev.service_url,
                new_url = %url,
                "Service re-registered with a new URL"
            ),
            Some(_) => debug!(service = %name, url = %url, "Service re-registered"),
            None => info!(service = %name, url = %url, "Service registered"),
        }

        Ok(())
    }

    /// Refresh a service's expiry. Unknown names are registered.
    pub fn heartbeat(&self, name: &str, url: &str) -> Result<()> {
        let (name, url) = validate(name, url)?;

        match self.services.get_mut(name) {
            Some(mut entry) if entry.service_url == url => {
                entry.last_refreshed_at = Instant::now();
                entry.last_heartbeat = Utc::now();
                debug!(service = %name, "Heartbeat received");
            }
            Some(mut entry) => {
                info!(
                    service = %name,
                    old_url = %entry.service_url,
                    new_url = %url,
                    "Heartbeat moved service to a new URL"
                );
                *entry = RegistryEntry::new(url.to_string());
            }
            None => {
                self.services
                    .insert(name.to_string(), RegistryEntry::new(url.to_string()));
                info!(service = %name, url = %url, "Heartbeat registered unknown service");
            }
        }

        Ok(())
    }

    /// Resolve a service name to its URL, evicting the entry if it has expired
    pub fn resolve(&self, name: &str) -> Result<String> {
        let now = Instant::now();

        let expired = match self.services.get(name) {
            Some(entry) if !entry.is_expired(self.ttl, now) => {
                return Ok(entry.service_url.clone());
            }
            Some(_) => true,
            None => false,
        };

        // The read guard is released above; a heartbeat may have landed since,
        // so only remove if the entry is still expired.
        if expired
            && self
                .services
                .remove_if(name, |_, entry| entry.is_expired(self.ttl, Instant::now()))
                .is_some()
        {
            info!(service = %name, "Evicted expired service on lookup");
        }

        Err(AppError::ServiceNotRegistered(name.to_string()))
    }

    /// Remove a service regardless of its TTL
    pub fn deregister(&self, name: &str) -> bool {
        let removed = self.services.remove(name).is_some();
        if removed {
            info!(service = %name, "Service deregistered");
        }
        removed
    }

    /// Remove a service only while it still points at `url`.
    ///
    /// Used after a failed probe, so a re-registration that raced the probe
    /// under a new URL survives.
    pub fn deregister_url(&self, name: &str, url: &str) -> bool {
        let removed = self
            .services
            .remove_if(name, |_, entry| entry.service_url == url)
            .is_some();
        if removed {
            info!(service = %name, url = %url, "Service deregistered");
        }
        removed
    }

    /// Snapshot of all unexpired services, sorted by name
    pub fn list_active(&self) -> Vec<ServiceSnapshot> {
        let now = Instant::now();
        let mut active: Vec<ServiceSnapshot> = self
            .services
            .iter()
            .filter(|entry| !entry.is_expired(self.ttl, now))
            .map(|entry| ServiceSnapshot {
                service: entry.key().clone(),
                url: entry.service_url.clone(),
                status: "active",
                registered_at: entry.registered_at,
                last_heartbeat: entry.last_heartbeat,
            })
            .collect();

        active.sort_by(|a, b| a.service.cmp(&b.service));
        active
    }

    /// Remove every expired entry, returning how many were removed
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.services.len();
        self.services
            .retain(|_, entry| !entry.is_expired(self.ttl, now));
        before.saturating_sub(self.services.len())
    }

    /// Number of entries currently held, expired or not
    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Start a background task that sweeps expired entries every `interval`
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let registry = Arc::clone(self);

        info!(
            interval_secs = interval.as_secs(),
            ttl_secs = registry.ttl().as_secs(),
            "Started registry sweep task"
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let removed = registry.sweep_expired();
                if removed > 0 {
                    info!(removed = removed, remaining = registry.len(), "Swept expired services");
                } else {
                    debug!(remaining = registry.len(), "Registry sweep completed");
                }
            }
        })
    }
}

fn validate<'a>(name: &'a str, url: &'a str) -> Result<(&'a str, &'a str)> {
    let name = name.trim();
    let url = url.trim();

    if name.is_empty() {
        return Err(AppError::MissingField("serviceName"));
    }
    if url.is_empty() {
        return Err(AppError::MissingField("serviceUrl"));
    }

    Ok((name, url))
}
