use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// User-facing error messages shared across handlers and models.
pub mod msg {
    pub const LICENSE_NOT_FOUND: &str = "License not found";
    pub const NO_LICENSES_FOR_EMAIL: &str = "No licenses found for this email";
    pub const PRODUCT_NOT_RECOGNIZED: &str = "Product not recognized";
    pub const EMAIL_EMPTY: &str = "Email cannot be empty";
    pub const INVALID_EMAIL_FORMAT: &str = "Invalid email format";
    pub const PLUGIN_EMPTY: &str = "Plugin cannot be empty";
    pub const REASON_EMPTY: &str = "Revoke reason cannot be empty";
    pub const LICENSE_KEY_EXISTS: &str = "License key already exists";
    pub const KEY_GENERATION_EXHAUSTED: &str = "Could not generate a unique license key";
    pub const MISSING_SIGNATURE: &str = "Missing stripe-signature header";
    pub const INVALID_SIGNATURE_FORMAT: &str = "Invalid signature format";
    pub const INVALID_TIMESTAMP_IN_SIGNATURE: &str = "Invalid timestamp in signature";
    pub const SIGNATURE_MISMATCH: &str = "Webhook signature verification failed";
    pub const INVALID_WEBHOOK_SECRET: &str = "Invalid webhook secret";
    pub const STRIPE_NOT_CONFIGURED: &str = "Stripe is not configured";
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "Not found", Some(msg.clone())),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Bad request", Some(msg.clone())),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized", None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "Conflict", Some(msg.clone())),
            AppError::InvalidSignature(msg) => {
                tracing::warn!("Rejected webhook: {}", msg);
                (StatusCode::BAD_REQUEST, "Invalid signature", Some(msg.clone()))
            }
            AppError::Upstream(msg) => {
                tracing::error!("Upstream error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Upstream error", None)
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Pool(e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
