//! Router construction

use axum::{
    routing::{any, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api::handlers;
use crate::AppState;

/// Build the gateway router: admin endpoints plus the `/api/:service` proxy
pub fn create_router(state: Arc<AppState>) -> Router {
    // `.layer` only wraps routes added before it, so CORS covers the admin
    // endpoints. Proxied routes leave CORS (preflight included) to the backend.
    Router::new()
        .route("/register-service", post(handlers::register_service))
        .route("/heartbeat", post(handlers::heartbeat))
        .route("/health", get(handlers::health))
        .layer(CorsLayer::permissive())
        .route("/api/:service", any(handlers::proxy))
        // `*rest` does not match an empty segment
        .route("/api/:service/", any(handlers::proxy))
        .route("/api/:service/*rest", any(handlers::proxy))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
