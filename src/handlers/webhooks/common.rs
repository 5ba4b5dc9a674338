//! Provider-agnostic checkout processing.
//!
//! The Stripe handler turns a signed event into a `CheckoutData`; everything
//! from price mapping to license issuance happens here.

use chrono::NaiveDate;
use rusqlite::Connection;

use crate::catalog::PriceCatalog;
use crate::db::queries;
use crate::error::Result;
use crate::licensing::issue_license;
use crate::models::{IssueLicense, License};

/// Data extracted from a checkout completion event.
#[derive(Debug, Clone)]
pub struct CheckoutData {
    pub session_id: String,
    /// Purchaser email from the payment provider
    pub customer_email: Option<String>,
    /// Price ids from expanded line items. `None` when the event didn't carry
    /// them and they must be fetched from the provider.
    pub price_ids: Option<Vec<String>>,
}

/// Parsed webhook event with provider-agnostic data.
#[derive(Debug)]
pub enum WebhookEvent {
    /// Paid checkout - issues licenses
    CheckoutCompleted(CheckoutData),
    /// Event type not relevant to license management
    Ignored,
}

#[derive(Debug, PartialEq)]
pub enum CheckoutOutcome {
    Issued(Vec<License>),
    /// Session was claimed by an earlier delivery of the same event
    AlreadyProcessed,
    NoEmail,
    NoMappedPrice,
}

/// Issue one license per mapped line item.
///
/// Claiming the session and creating the licenses share one transaction: if any
/// issuance fails nothing is committed and the provider's retry starts clean.
pub fn process_checkout(
    conn: &mut Connection,
    prices: &PriceCatalog,
    data: &CheckoutData,
    price_ids: &[String],
    today: NaiveDate,
) -> Result<CheckoutOutcome> {
    let Some(email) = data.customer_email.as_deref() else {
        tracing::warn!(
            session_id = %data.session_id,
            "No email in checkout session, no license issued"
        );
        return Ok(CheckoutOutcome::NoEmail);
    };

    let mut items = Vec::with_capacity(price_ids.len());
    for price_id in price_ids {
        match prices.resolve(price_id) {
            Some(entry) => items.push(IssueLicense {
                email: email.to_string(),
                plugin: entry.plugin.clone(),
                plan: entry.plan,
            }),
            None => {
                tracing::warn!(
                    session_id = %data.session_id,
                    price_id = %price_id,
                    "Unmapped price in checkout session"
                );
            }
        }
    }

    if items.is_empty() {
        tracing::warn!(
            session_id = %data.session_id,
            "Checkout session has no mapped prices, no license issued"
        );
        return Ok(CheckoutOutcome::NoMappedPrice);
    }

    let tx = conn.transaction()?;

    if !queries::try_claim_checkout_session(&tx, &data.session_id)? {
        tracing::info!(session_id = %data.session_id, "Checkout session already processed");
        return Ok(CheckoutOutcome::AlreadyProcessed);
    }

    let mut issued = Vec::with_capacity(items.len());
    for item in &items {
        // Dropping `tx` on error rolls back the claim and any earlier licenses
        issued.push(issue_license(&tx, item, today)?);
    }

    tx.commit()?;

    tracing::info!(
        session_id = %data.session_id,
        licenses = issued.len(),
        "Stripe checkout completed"
    );

    Ok(CheckoutOutcome::Issued(issued))
}
