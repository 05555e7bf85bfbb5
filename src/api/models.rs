//! Request and response bodies for the administrative endpoints

use serde::{Deserialize, Serialize};

use crate::gateway::registry::ServiceSnapshot;

/// Body of `POST /register-service` and `POST /heartbeat`.
///
/// Both fields are optional at the serde level so that a missing field
/// surfaces as a 400 `missing_field` error instead of a deserialization error.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRegistration {
    #[serde(default)]
    pub service_name: Option<String>,
    #[serde(default)]
    pub service_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub services: Vec<ServiceSnapshot>,
}
