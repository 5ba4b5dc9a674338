use axum::extract::State;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{Json, Query};
use crate::licensing::{issue_and_notify, lookup_licenses, revoke_license};
use crate::models::{IssueLicense, License, LicenseSummary, RevokeLicense};

/// POST /generate-license
pub async fn generate_license(
    State(state): State<AppState>,
    Json(input): Json<IssueLicense>,
) -> Result<Json<License>> {
    input.validate()?;
    let license = issue_and_notify(&state, &input)?;
    Ok(Json(license))
}

#[derive(Debug, Serialize)]
pub struct RevokeLicenseResponse {
    pub status: &'static str,
    pub license_key: String,
    pub revoke_reason: Option<String>,
    pub revoked_at: Option<i64>,
}

/// POST /revoke-license
pub async fn revoke_license_handler(
    State(state): State<AppState>,
    Json(input): Json<RevokeLicense>,
) -> Result<Json<RevokeLicenseResponse>> {
    input.validate()?;
    let conn = state.db.get()?;

    let license = revoke_license(
        &conn,
        input.license_key.trim(),
        input.email.trim(),
        input.reason.trim(),
        Utc::now(),
    )?;

    Ok(Json(RevokeLicenseResponse {
        status: "revoked",
        license_key: license.license_key,
        revoke_reason: license.revoke_reason,
        revoked_at: license.revoked_at,
    }))
}

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    pub email: String,
}

/// GET /license-lookup?email=
pub async fn lookup_licenses_handler(
    State(state): State<AppState>,
    Query(query): Query<LookupQuery>,
) -> Result<Json<Vec<LicenseSummary>>> {
    let conn = state.db.get()?;
    let licenses = lookup_licenses(&conn, query.email.trim())?;
    Ok(Json(licenses))
}
