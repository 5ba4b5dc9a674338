use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::error::{AppError, Result, msg};

/// Length of a yearly license term.
pub const YEAR_PLAN_DAYS: u64 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Plan {
    Year,
    Life,
}

impl Plan {
    /// Plan segment used inside license keys.
    pub fn key_code(&self) -> &'static str {
        match self {
            Plan::Year => "YEAR",
            Plan::Life => "LIFE",
        }
    }

    /// Expiry date for a license issued on `issued_at` (None = perpetual).
    pub fn expires_at(&self, issued_at: NaiveDate) -> Option<NaiveDate> {
        match self {
            Plan::Year => issued_at.checked_add_days(Days::new(YEAR_PLAN_DAYS)),
            Plan::Life => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
    pub id: String,
    pub license_key: String,
    pub email: String,
    pub plugin: String,
    pub plan: Plan,
    pub issued_at: NaiveDate,
    /// None for lifetime licenses
    pub expires_at: Option<NaiveDate>,
    /// Unix timestamp of the last successful verification
    pub validated_at: Option<i64>,
    pub revoked: bool,
    pub revoke_reason: Option<String>,
    pub revoked_at: Option<i64>,
}

impl License {
    /// Whether a yearly license has lapsed on `today`.
    ///
    /// Lifetime licenses never expire, and a license expiring today is still valid.
    pub fn is_expired_on(&self, today: NaiveDate) -> bool {
        match (self.plan, self.expires_at) {
            (Plan::Year, Some(expires_at)) => expires_at < today,
            _ => false,
        }
    }
}

/// Admin-facing view of a license returned by email lookup.
#[derive(Debug, Clone, Serialize)]
pub struct LicenseSummary {
    pub license_key: String,
    pub plugin: String,
    pub plan: Plan,
    pub issued_at: NaiveDate,
    pub expires_at: Option<NaiveDate>,
    pub validated_at: Option<i64>,
    pub revoked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoke_reason: Option<String>,
}

impl From<License> for LicenseSummary {
    fn from(license: License) -> Self {
        Self {
            license_key: license.license_key,
            plugin: license.plugin,
            plan: license.plan,
            issued_at: license.issued_at,
            expires_at: license.expires_at,
            validated_at: license.validated_at,
            revoked: license.revoked,
            revoke_reason: license.revoke_reason,
        }
    }
}

/// Basic email format validation.
///
/// Checks for exactly one `@`, a non-empty local part without spaces and a
/// dotted domain that neither starts nor ends with a dot. Not RFC 5322.
pub fn validate_email_format(email: &str) -> Result<()> {
    let email = email.trim();

    if email.is_empty() {
        return Err(AppError::BadRequest(msg::EMAIL_EMPTY.into()));
    }

    let Some((local_part, domain_part)) = email.split_once('@') else {
        return Err(AppError::BadRequest(msg::INVALID_EMAIL_FORMAT.into()));
    };

    if domain_part.contains('@') || local_part.is_empty() || local_part.contains(' ') {
        return Err(AppError::BadRequest(msg::INVALID_EMAIL_FORMAT.into()));
    }

    if domain_part.is_empty()
        || !domain_part.contains('.')
        || domain_part.starts_with('.')
        || domain_part.ends_with('.')
    {
        return Err(AppError::BadRequest(msg::INVALID_EMAIL_FORMAT.into()));
    }

    Ok(())
}

/// Input for issuing a license, from the admin endpoint or a completed checkout.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueLicense {
    pub email: String,
    pub plugin: String,
    pub plan: Plan,
}

impl IssueLicense {
    pub fn validate(&self) -> Result<()> {
        validate_email_format(&self.email)?;
        if self.plugin.trim().is_empty() {
            return Err(AppError::BadRequest(msg::PLUGIN_EMPTY.into()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct RevokeLicense {
    pub license_key: String,
    pub email: String,
    pub reason: String,
}

impl RevokeLicense {
    pub fn validate(&self) -> Result<()> {
        if self.reason.trim().is_empty() {
            return Err(AppError::BadRequest(msg::REASON_EMPTY.into()));
        }
        Ok(())
    }
}
