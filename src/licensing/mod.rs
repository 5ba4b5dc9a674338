mod key;
mod lifecycle;

pub use key::*;
pub use lifecycle::*;

use chrono::Utc;

use crate::db::AppState;
use crate::email::LicenseEmail;
use crate::error::Result;
use crate::models::{IssueLicense, License};

/// Issue a license and queue the delivery email.
///
/// The pooled connection is released before the email is dispatched; a failed
/// send is logged by the email task and never reaches the caller.
pub fn issue_and_notify(state: &AppState, input: &IssueLicense) -> Result<License> {
    let license = {
        let conn = state.db.get()?;
        issue_license(&conn, input, Utc::now().date_naive())?
    };

    state.email_service.dispatch(LicenseEmail::from(&license));
    Ok(license)
}
