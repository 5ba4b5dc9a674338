mod licenses;

pub use licenses::*;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::db::AppState;
use crate::middleware::require_admin_key;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/generate-license", post(generate_license))
        .route("/revoke-license", post(revoke_license_handler))
        .route("/license-lookup", get(lookup_licenses_handler))
        .route_layer(middleware::from_fn_with_state(state, require_admin_key))
}
