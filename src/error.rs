//! Common error types for the service gateway

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Service '{0}' is not registered")]
    ServiceNotRegistered(String),

    #[error("Service '{0}' is not reachable")]
    HealthCheckFailed(String),

    #[error("Bad gateway: {0}")]
    ForwardError(String),

    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    #[error("Exposure error: {0}")]
    Exposure(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
    pub code: Option<String>,
}

impl AppError {
    /// HTTP status this error maps to at the handler boundary
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Config(_) | AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::MissingField(_) | AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::ServiceNotRegistered(_) | AppError::HealthCheckFailed(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::ForwardError(_) => StatusCode::BAD_GATEWAY,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Exposure(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> (&'static str, Option<&'static str>) {
        match self {
            AppError::Config(_) | AppError::Io(_) => ("server_error", None),
            AppError::MissingField(_) => ("invalid_request_error", Some("missing_field")),
            AppError::InvalidRequest(_) => ("invalid_request_error", None),
            AppError::ServiceNotRegistered(_) => {
                ("service_unavailable", Some("service_not_registered"))
            }
            AppError::HealthCheckFailed(_) => ("service_unavailable", Some("health_check_failed")),
            AppError::ForwardError(_) => ("backend_error", Some("bad_gateway")),
            AppError::PayloadTooLarge(_) => ("invalid_request_error", Some("payload_too_large")),
            AppError::Exposure(_) | AppError::Internal(_) => ("server_error", None),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (error_type, code) = self.kind();

        let body = Json(ErrorResponse {
            success: false,
            error: ErrorDetail {
                message: self.to_string(),
                r#type: error_type.to_string(),
                code: code.map(|c| c.to_string()),
            },
        });

        (status, body).into_response()
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
