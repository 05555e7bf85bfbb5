//! HTTP handlers for the administrative endpoints and the proxy path

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    response::Response,
    Json,
};
use std::sync::Arc;

use crate::api::models::{AckResponse, HealthResponse, ServiceRegistration};
use crate::error::{AppError, Result};
use crate::gateway::forwarder::split_service_path;
use crate::AppState;

fn registration_fields(
    payload: std::result::Result<Json<ServiceRegistration>, JsonRejection>,
) -> Result<(String, String)> {
    let Json(payload) = payload.map_err(|e| AppError::InvalidRequest(e.body_text()))?;
    Ok((
        payload.service_name.unwrap_or_default().trim().to_string(),
        payload.service_url.unwrap_or_default().trim().to_string(),
    ))
}

/// `POST /register-service`
pub async fn register_service(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<ServiceRegistration>, JsonRejection>,
) -> Result<Json<AckResponse>> {
    let (name, url) = registration_fields(payload)?;
    state.registry.register(&name, &url)?;

    Ok(Json(AckResponse {
        success: true,
        message: format!("Service {} registered at {}", name, url),
    }))
}

/// `POST /heartbeat`
pub async fn heartbeat(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<ServiceRegistration>, JsonRejection>,
) -> Result<Json<AckResponse>> {
    let (name, url) = registration_fields(payload)?;
    state.registry.heartbeat(&name, &url)?;

    Ok(Json(AckResponse {
        success: true,
        message: format!("Heartbeat received for {}", name),
    }))
}

/// `GET /health`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        services: state.registry.list_active(),
    })
}

/// `* /api/:service/*rest`
pub async fn proxy(State(state): State<Arc<AppState>>, request: Request) -> Result<Response> {
    let service = split_service_path(request.uri().path())
        .map(str::to_owned)
        .ok_or_else(|| AppError::InvalidRequest("Missing service name".to_string()))?;

    state.dispatcher.dispatch(&service, request).await
}
