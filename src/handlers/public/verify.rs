use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::Json;
use crate::licensing::{InvalidReason, Verification, verify_license};
use crate::models::Plan;

#[derive(Debug, Deserialize)]
pub struct VerifyLicenseRequest {
    pub license_key: String,
    pub email: String,
    pub plugin: String,
}

#[derive(Debug, Serialize)]
pub struct ValidLicenseResponse {
    pub valid: bool,
    pub plugin: String,
    pub plan: Plan,
    pub expires_at: Option<NaiveDate>,
}

/// `{"valid": false, "reason": "...", ...reason-specific fields}`
#[derive(Debug, Serialize)]
pub struct InvalidLicenseResponse {
    pub valid: bool,
    #[serde(flatten)]
    pub reason: InvalidReason,
}

/// POST /verify-license
///
/// An unknown, revoked or expired license is a 403 answer, not an error.
pub async fn verify_license_handler(
    State(state): State<AppState>,
    Json(request): Json<VerifyLicenseRequest>,
) -> Result<Response> {
    let conn = state.db.get()?;

    let verification = verify_license(
        &conn,
        request.license_key.trim(),
        request.email.trim(),
        request.plugin.trim(),
        Utc::now(),
    )?;

    let response = match verification {
        Verification::Valid(license) => Json(ValidLicenseResponse {
            valid: true,
            plugin: license.plugin,
            plan: license.plan,
            expires_at: license.expires_at,
        })
        .into_response(),
        Verification::Invalid(reason) => {
            tracing::debug!(?reason, plugin = %request.plugin, "License verification failed");
            (
                StatusCode::FORBIDDEN,
                Json(InvalidLicenseResponse {
                    valid: false,
                    reason,
                }),
            )
                .into_response()
        }
    };

    Ok(response)
}
