use std::time::Duration;

use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result, msg};

type HmacSha256 = Hmac<Sha256>;

const STRIPE_API_BASE: &str = "https://api.stripe.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Credentials for the Stripe account that sells the plugins.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// API secret, needed only to fetch line items that weren't expanded in the event.
    pub secret_key: Option<String>,
    pub webhook_secret: String,
}

#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    api_base: String,
    secret_key: Option<String>,
    webhook_secret: String,
}

impl StripeClient {
    pub fn new(config: &StripeConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            api_base: STRIPE_API_BASE.to_string(),
            secret_key: config.secret_key.clone(),
            webhook_secret: config.webhook_secret.clone(),
        }
    }

    /// Point API calls somewhere other than api.stripe.com.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Maximum age of a webhook timestamp before it's rejected (in seconds).
    /// Stripe recommends 300 seconds (5 minutes).
    const WEBHOOK_TIMESTAMP_TOLERANCE_SECS: i64 = 300;

    /// How far in the future a timestamp may be before it's rejected.
    const WEBHOOK_CLOCK_SKEW_SECS: i64 = 60;

    /// Check a `Stripe-Signature` header against the raw payload.
    ///
    /// `Ok(false)` means well-formed but wrong (bad MAC or stale timestamp);
    /// a header that can't be parsed is an `InvalidSignature` error.
    pub fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> Result<bool> {
        // Stripe signature format: t=timestamp,v1=signature[,v1=...]
        let mut timestamp = None;
        let mut candidates = Vec::new();

        for part in signature.split(',').map(str::trim) {
            if let Some(t) = part.strip_prefix("t=") {
                timestamp = Some(t);
            } else if let Some(s) = part.strip_prefix("v1=") {
                candidates.push(s);
            }
        }

        let timestamp_str = timestamp
            .ok_or_else(|| AppError::InvalidSignature(msg::INVALID_SIGNATURE_FORMAT.into()))?;
        if candidates.is_empty() {
            return Err(AppError::InvalidSignature(msg::INVALID_SIGNATURE_FORMAT.into()));
        }

        let timestamp: i64 = timestamp_str
            .parse()
            .map_err(|_| AppError::InvalidSignature(msg::INVALID_TIMESTAMP_IN_SIGNATURE.into()))?;

        let age = chrono::Utc::now().timestamp() - timestamp;
        if age > Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS {
            tracing::warn!(
                age,
                max = Self::WEBHOOK_TIMESTAMP_TOLERANCE_SECS,
                "Stripe webhook rejected: timestamp too old"
            );
            return Ok(false);
        }
        if age < -Self::WEBHOOK_CLOCK_SKEW_SECS {
            tracing::warn!(age, "Stripe webhook rejected: timestamp in the future");
            return Ok(false);
        }

        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| AppError::Internal(msg::INVALID_WEBHOOK_SECRET.into()))?;
        mac.update(timestamp_str.as_bytes());
        mac.update(b".");
        mac.update(payload);
        let expected = hex::encode(mac.finalize().into_bytes());
        let expected_bytes = expected.as_bytes();

        // Signature length isn't secret (always 64 hex chars), only the content is.
        Ok(candidates.iter().any(|candidate| {
            let provided = candidate.as_bytes();
            provided.len() == expected_bytes.len() && bool::from(expected_bytes.ct_eq(provided))
        }))
    }

    /// Price ids of every line item in a checkout session.
    pub async fn list_line_item_prices(&self, session_id: &str) -> Result<Vec<String>> {
        let secret_key = self
            .secret_key
            .as_deref()
            .ok_or_else(|| AppError::Upstream(msg::STRIPE_NOT_CONFIGURED.into()))?;

        let url = format!(
            "{}/v1/checkout/sessions/{}/line_items",
            self.api_base, session_id
        );

        let response = self
            .client
            .get(&url)
            .basic_auth(secret_key, None::<&str>)
            .query(&[("limit", "100")])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Stripe API error: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Stripe API error: {} - {}",
                status, error_text
            )));
        }

        let items: StripeList<StripeLineItem> = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse Stripe response: {}", e)))?;

        if items.has_more {
            tracing::warn!(session_id, "Checkout session has more than 100 line items, extra items ignored");
        }

        Ok(items.price_ids())
    }
}

/// Generic Stripe webhook event - object is parsed based on event_type
#[derive(Debug, Deserialize)]
pub struct StripeWebhookEvent {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    // Thin events carry `related_object` instead
    #[serde(default)]
    pub data: StripeEventData,
}

#[derive(Debug, Default, Deserialize)]
pub struct StripeEventData {
    #[serde(default)]
    pub object: serde_json::Value,
}

// ============ checkout.session.completed ============

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub payment_status: Option<String>, // "paid", "unpaid" or "no_payment_required"
    pub customer_email: Option<String>,
    pub customer_details: Option<StripeCustomerDetails>,
    /// Only present when the event was sent with `line_items` expanded.
    pub line_items: Option<StripeList<StripeLineItem>>,
}

impl StripeCheckoutSession {
    /// Email the purchaser typed at checkout, falling back to the prefilled one.
    pub fn purchaser_email(&self) -> Option<String> {
        self.customer_details
            .as_ref()
            .and_then(|d| d.email.clone())
            .or_else(|| self.customer_email.clone())
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct StripeCustomerDetails {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StripeList<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

impl StripeList<StripeLineItem> {
    pub fn price_ids(&self) -> Vec<String> {
        self.data
            .iter()
            .filter_map(|item| item.price.as_ref().map(|p| p.id.clone()))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct StripeLineItem {
    pub price: Option<StripePrice>,
}

#[derive(Debug, Deserialize)]
pub struct StripePrice {
    pub id: String,
}
