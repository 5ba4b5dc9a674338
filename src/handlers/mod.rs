pub mod admin;
pub mod public;
pub mod webhooks;

use axum::Router;

use crate::db::AppState;

/// Every route the server exposes, ready for outer layers.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(public::router())
        .merge(webhooks::router())
        .merge(admin::router(state.clone()))
        .with_state(state)
}
