use chrono::Utc;
use rusqlite::{Connection, ErrorCode, params};
use uuid::Uuid;

use crate::error::{AppError, Result, msg};
use crate::models::License;

use super::from_row::{LICENSE_COLS, query_all, query_one};

pub fn now() -> i64 {
    Utc::now().timestamp()
}

pub fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

/// Unique-index violation, i.e. the license key is already taken.
fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

// ============ Licenses ============

/// Insert a new license record.
///
/// Fails with `AppError::Conflict` when the license key is already taken;
/// the caller decides whether to regenerate the key.
pub fn create_license(conn: &Connection, license: &License) -> Result<()> {
    let result = conn.execute(
        "INSERT INTO licenses (id, license_key, email, plugin, plan, issued_at, expires_at, validated_at, revoked, revoke_reason, revoked_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            &license.id,
            &license.license_key,
            &license.email,
            &license.plugin,
            license.plan.as_ref(),
            license.issued_at,
            license.expires_at,
            license.validated_at,
            license.revoked,
            &license.revoke_reason,
            license.revoked_at,
        ],
    );

    match result {
        Ok(_) => Ok(()),
        Err(e) if is_unique_violation(&e) => {
            Err(AppError::Conflict(msg::LICENSE_KEY_EXISTS.into()))
        }
        Err(e) => Err(e.into()),
    }
}

pub fn get_license_by_id(conn: &Connection, id: &str) -> Result<Option<License>> {
    query_one(
        conn,
        &format!("SELECT {} FROM licenses WHERE id = ?1", LICENSE_COLS),
        &[&id],
    )
}

/// Exact match on key, email and plugin (the verification triple).
pub fn get_license_by_key_email_plugin(
    conn: &Connection,
    license_key: &str,
    email: &str,
    plugin: &str,
) -> Result<Option<License>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM licenses WHERE license_key = ?1 AND email = ?2 AND plugin = ?3",
            LICENSE_COLS
        ),
        &[&license_key, &email, &plugin],
    )
}

pub fn get_license_by_key_and_email(
    conn: &Connection,
    license_key: &str,
    email: &str,
) -> Result<Option<License>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM licenses WHERE license_key = ?1 AND email = ?2",
            LICENSE_COLS
        ),
        &[&license_key, &email],
    )
}

/// All licenses for an email, oldest first. Includes revoked and expired ones.
pub fn list_licenses_by_email(conn: &Connection, email: &str) -> Result<Vec<License>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM licenses WHERE email = ?1 ORDER BY issued_at, rowid",
            LICENSE_COLS
        ),
        &[&email],
    )
}

pub fn mark_license_validated(conn: &Connection, id: &str, validated_at: i64) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE licenses SET validated_at = ?1 WHERE id = ?2",
        params![validated_at, id],
    )?;
    Ok(affected > 0)
}

/// Revoke a license. Re-revoking overwrites the reason and timestamp.
pub fn mark_license_revoked(
    conn: &Connection,
    id: &str,
    reason: &str,
    revoked_at: i64,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE licenses SET revoked = 1, revoke_reason = ?1, revoked_at = ?2 WHERE id = ?3",
        params![reason, revoked_at, id],
    )?;
    Ok(affected > 0)
}

// ============ Processed checkouts ============

/// Atomically claim a checkout session for license issuance.
///
/// Returns false when the session was already claimed (webhook replay).
pub fn try_claim_checkout_session(conn: &Connection, session_id: &str) -> Result<bool> {
    let affected = conn.execute(
        "INSERT OR IGNORE INTO processed_checkouts (session_id, processed_at) VALUES (?1, ?2)",
        params![session_id, now()],
    )?;
    Ok(affected > 0)
}

pub fn is_checkout_session_processed(conn: &Connection, session_id: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM processed_checkouts WHERE session_id = ?1",
        params![session_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
