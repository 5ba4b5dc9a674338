use axum::{body::Bytes, extract::State, http::HeaderMap};
use chrono::Utc;
use serde_json::{Value, json};

use crate::db::{AppState, queries};
use crate::email::LicenseEmail;
use crate::error::{AppError, Result, msg};
use crate::extractors::Json;
use crate::payments::{StripeCheckoutSession, StripeWebhookEvent};

use super::common::{CheckoutData, CheckoutOutcome, WebhookEvent, process_checkout};

const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
const ASYNC_PAYMENT_SUCCEEDED: &str = "checkout.session.async_payment_succeeded";

fn extract_signature(headers: &HeaderMap) -> Result<&str> {
    headers
        .get("stripe-signature")
        .ok_or_else(|| AppError::InvalidSignature(msg::MISSING_SIGNATURE.into()))?
        .to_str()
        .map_err(|e| {
            tracing::debug!("Invalid UTF-8 in Stripe signature header: {}", e);
            AppError::InvalidSignature(msg::INVALID_SIGNATURE_FORMAT.into())
        })
}

/// Classify a verified payload.
///
/// Anything that isn't a paid checkout session is `Ignored`, including bodies
/// that fail to parse: the signature already proved Stripe sent them, and a
/// non-2xx answer only makes Stripe redeliver the same bytes.
pub(crate) fn parse_event(body: &[u8]) -> WebhookEvent {
    let event: StripeWebhookEvent = match serde_json::from_slice(body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!("Acknowledging unparseable Stripe webhook: {}", e);
            return WebhookEvent::Ignored;
        }
    };

    match event.event_type.as_str() {
        CHECKOUT_COMPLETED | ASYNC_PAYMENT_SUCCEEDED => parse_checkout_session(&event),
        other => {
            tracing::debug!(event_type = other, event_id = ?event.id, "Ignoring Stripe event");
            WebhookEvent::Ignored
        }
    }
}

fn parse_checkout_session(event: &StripeWebhookEvent) -> WebhookEvent {
    let session: StripeCheckoutSession = match serde_json::from_value(event.data.object.clone()) {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(event_id = ?event.id, "Failed to parse checkout session: {}", e);
            return WebhookEvent::Ignored;
        }
    };

    // Delayed payment methods complete the session unpaid; the paid session
    // arrives later as async_payment_succeeded.
    if session.payment_status.as_deref() == Some("unpaid") {
        tracing::info!(session_id = %session.id, "Checkout session not paid yet, skipping");
        return WebhookEvent::Ignored;
    }

    let customer_email = session.purchaser_email();
    let price_ids = session.line_items.as_ref().map(|items| items.price_ids());

    WebhookEvent::CheckoutCompleted(CheckoutData {
        session_id: session.id,
        customer_email,
        price_ids,
    })
}

/// Axum handler for Stripe webhooks.
pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let stripe = state.stripe.as_ref().ok_or_else(|| {
        tracing::error!("Stripe webhook received but no webhook secret is configured");
        AppError::InvalidSignature(msg::STRIPE_NOT_CONFIGURED.into())
    })?;

    let signature = extract_signature(&headers)?;
    if !stripe.verify_webhook_signature(&body, signature)? {
        return Err(AppError::InvalidSignature(msg::SIGNATURE_MISMATCH.into()));
    }

    let WebhookEvent::CheckoutCompleted(data) = parse_event(&body) else {
        return Ok(Json(json!({ "status": "success" })));
    };

    // Skip the line item fetch for replays
    let already_processed = {
        let conn = state.db.get()?;
        queries::is_checkout_session_processed(&conn, &data.session_id)?
    };
    if already_processed {
        tracing::info!(session_id = %data.session_id, "Checkout session already processed");
        return Ok(Json(json!({ "status": "success" })));
    }

    let price_ids = match data.price_ids.clone() {
        Some(ids) => ids,
        None => stripe.list_line_item_prices(&data.session_id).await?,
    };

    let outcome = {
        let mut conn = state.db.get()?;
        process_checkout(
            &mut conn,
            &state.prices,
            &data,
            &price_ids,
            Utc::now().date_naive(),
        )?
    };

    if let CheckoutOutcome::Issued(licenses) = outcome {
        for license in &licenses {
            state.email_service.dispatch(LicenseEmail::from(license));
        }
    }

    Ok(Json(json!({ "status": "success" })))
}
