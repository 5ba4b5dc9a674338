use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::util::{constant_time_eq, extract_admin_key};

/// Gate for the admin endpoints.
///
/// The request must carry the configured `ADMIN_API_KEY`. With no key
/// configured the admin API is closed.
pub async fn require_admin_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let Some(expected) = state.admin_api_key.as_deref() else {
        tracing::warn!("Admin request rejected: ADMIN_API_KEY is not configured");
        return Err(AppError::Unauthorized);
    };

    let provided = extract_admin_key(request.headers()).ok_or(AppError::Unauthorized)?;
    if !constant_time_eq(provided, expected) {
        tracing::warn!(path = %request.uri().path(), "Admin request rejected: bad API key");
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}
