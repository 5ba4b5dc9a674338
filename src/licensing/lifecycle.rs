//! License lifecycle: issuance, verification, revocation and lookup.
//!
//! These functions take a borrowed connection so callers decide the scope of
//! the store handle (a pooled connection per request, or a transaction when
//! issuance must be atomic with other writes).

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::error::{AppError, Result, msg};
use crate::models::{IssueLicense, License, LicenseSummary, Plan};

use super::key::generate_license_key;

/// How many keys to try before giving up on a collision streak.
pub const MAX_KEY_ATTEMPTS: usize = 5;

/// Outcome of a verification request.
#[derive(Debug, Clone, PartialEq)]
pub enum Verification {
    Valid(License),
    Invalid(InvalidReason),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum InvalidReason {
    NotFound,
    Revoked { revoke_reason: Option<String> },
    Expired { expires_at: NaiveDate },
}

/// Issue a new license dated `today`.
pub fn issue_license(conn: &Connection, input: &IssueLicense, today: NaiveDate) -> Result<License> {
    issue_license_with(conn, input, today, generate_license_key)
}

/// Issue a license using a caller-supplied key generator.
///
/// A key collision regenerates the key, up to `MAX_KEY_ATTEMPTS` times. An
/// existing record is never overwritten.
pub fn issue_license_with<G>(
    conn: &Connection,
    input: &IssueLicense,
    today: NaiveDate,
    mut generate: G,
) -> Result<License>
where
    G: FnMut(&str, Plan, NaiveDate) -> String,
{
    let email = input.email.trim();
    let plugin = input.plugin.trim();

    for attempt in 1..=MAX_KEY_ATTEMPTS {
        let license = License {
            id: queries::gen_id(),
            license_key: generate(plugin, input.plan, today),
            email: email.to_string(),
            plugin: plugin.to_string(),
            plan: input.plan,
            issued_at: today,
            expires_at: input.plan.expires_at(today),
            validated_at: None,
            revoked: false,
            revoke_reason: None,
            revoked_at: None,
        };

        match queries::create_license(conn, &license) {
            Ok(()) => {
                tracing::info!(
                    license_id = %license.id,
                    plugin = %license.plugin,
                    plan = license.plan.as_ref(),
                    "License issued"
                );
                return Ok(license);
            }
            Err(AppError::Conflict(_)) => {
                tracing::warn!(attempt, plugin = %plugin, "License key collision, regenerating");
            }
            Err(e) => return Err(e),
        }
    }

    tracing::error!(
        attempts = MAX_KEY_ATTEMPTS,
        plugin = %plugin,
        "Giving up on license issuance after repeated key collisions"
    );
    Err(AppError::Conflict(msg::KEY_GENERATION_EXHAUSTED.into()))
}

/// Verify a (key, email, plugin) triple at `now`.
///
/// Checks run in order: existence, revocation, expiry. A successful check
/// stamps `validated_at`; failing to write the stamp is logged and does not
/// change the answer.
pub fn verify_license(
    conn: &Connection,
    license_key: &str,
    email: &str,
    plugin: &str,
    now: DateTime<Utc>,
) -> Result<Verification> {
    let Some(mut license) =
        queries::get_license_by_key_email_plugin(conn, license_key, email, plugin)?
    else {
        return Ok(Verification::Invalid(InvalidReason::NotFound));
    };

    if license.revoked {
        return Ok(Verification::Invalid(InvalidReason::Revoked {
            revoke_reason: license.revoke_reason,
        }));
    }

    if license.is_expired_on(now.date_naive()) {
        if let Some(expires_at) = license.expires_at {
            return Ok(Verification::Invalid(InvalidReason::Expired { expires_at }));
        }
    }

    let validated_at = now.timestamp();
    match queries::mark_license_validated(conn, &license.id, validated_at) {
        Ok(true) => license.validated_at = Some(validated_at),
        Ok(false) => {
            tracing::warn!(license_id = %license.id, "License vanished while recording validation");
        }
        Err(e) => {
            tracing::error!(license_id = %license.id, "Failed to record license validation: {}", e);
        }
    }

    Ok(Verification::Valid(license))
}

/// Revoke the license matching (key, email).
///
/// Revoking an already revoked license replaces its reason and timestamp.
pub fn revoke_license(
    conn: &Connection,
    license_key: &str,
    email: &str,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<License> {
    let mut license = queries::get_license_by_key_and_email(conn, license_key, email)?
        .ok_or_else(|| AppError::NotFound(msg::LICENSE_NOT_FOUND.into()))?;

    if license.revoked {
        tracing::info!(
            license_id = %license.id,
            previous_reason = license.revoke_reason.as_deref().unwrap_or_default(),
            "License already revoked, overwriting reason"
        );
    }

    let revoked_at = now.timestamp();
    if !queries::mark_license_revoked(conn, &license.id, reason, revoked_at)? {
        return Err(AppError::NotFound(msg::LICENSE_NOT_FOUND.into()));
    }

    license.revoked = true;
    license.revoke_reason = Some(reason.to_string());
    license.revoked_at = Some(revoked_at);

    tracing::info!(license_id = %license.id, "License revoked");
    Ok(license)
}

/// All licenses for an email. An email with no licenses is `NotFound`, not an empty list.
pub fn lookup_licenses(conn: &Connection, email: &str) -> Result<Vec<LicenseSummary>> {
    let licenses = queries::list_licenses_by_email(conn, email)?;
    if licenses.is_empty() {
        return Err(AppError::NotFound(msg::NO_LICENSES_FOR_EMAIL.into()));
    }
    Ok(licenses.into_iter().map(LicenseSummary::from).collect())
}
