mod static_license;
mod verify;

pub use static_license::*;
pub use verify::*;

use axum::{
    Router,
    routing::{get, post},
};
use serde::Serialize;

use crate::db::AppState;
use crate::extractors::Json;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct RootResponse {
    status: &'static str,
    message: &'static str,
}

async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        status: "OK",
        message: "QuickWoo Static License API ready.",
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/verify-license", post(verify_license_handler))
        .route("/static-license", get(get_static_license))
}
