//! Email delivery for newly issued license keys.
//!
//! Supports three modes:
//! 1. Send via Resend API (when `RESEND_API_KEY` is set)
//! 2. POST the license payload to a webhook URL (for DIY email delivery)
//! 3. Disabled (log only)
//!
//! Delivery is always fire-and-forget from the caller's point of view: the
//! license already exists by the time an email is queued.

use std::time::Duration;

use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{License, Plan};

/// Retry delays in seconds (exponential backoff: 1s, 4s, 16s)
const RETRY_DELAYS: &[u64] = &[1, 4, 16];

/// Per-request timeout for Resend and webhook calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Result of attempting to deliver a license email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailSendResult {
    /// Email was sent successfully via Resend
    Sent,
    /// Data was POSTed to the configured webhook URL
    WebhookCalled,
    /// No delivery channel configured
    Disabled,
}

/// Structured content of a license delivery email.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LicenseEmail {
    pub to_email: String,
    pub plugin: String,
    pub license_key: String,
    pub plan: Plan,
    pub expires_at: Option<NaiveDate>,
}

impl From<&License> for LicenseEmail {
    fn from(license: &License) -> Self {
        Self {
            to_email: license.email.clone(),
            plugin: license.plugin.clone(),
            license_key: license.license_key.clone(),
            plan: license.plan,
            expires_at: license.expires_at,
        }
    }
}

impl LicenseEmail {
    fn subject(&self) -> String {
        format!("Your {} license key", self.plugin)
    }

    fn validity(&self) -> String {
        match self.expires_at {
            Some(date) => format!("valid until {}", date.format("%b %d, %Y")),
            None => "lifetime license".to_string(),
        }
    }

    fn text_body(&self) -> String {
        format!(
            "Thanks for purchasing {}!\n\nYour license key: {}\n({})\n\nEnter this key together with your email address in the plugin settings to activate it.",
            self.plugin,
            self.license_key,
            self.validity()
        )
    }

    fn html_body(&self) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
<h2 style="color: #333;">Thanks for purchasing {}!</h2>
<div style="background: #f5f5f5; padding: 20px; border-radius: 8px; text-align: center;">
<code style="font-size: 20px; font-weight: bold; letter-spacing: 1px; color: #333;">{}</code>
</div>
<p style="color: #666;">{}</p>
<p>Enter this key together with your email address in the plugin settings to activate it.</p>
</body>
</html>"#,
            self.plugin,
            self.license_key,
            self.validity()
        )
    }
}

/// Webhook payload sent when `EMAIL_WEBHOOK_URL` is configured.
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    event: &'static str,
    #[serde(flatten)]
    license: &'a LicenseEmail,
}

/// Resend API request body.
#[derive(Debug, Serialize)]
struct ResendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: String,
    text: String,
    html: String,
}

/// Resend API response.
#[derive(Debug, Deserialize)]
struct ResendEmailResponse {
    #[allow(dead_code)]
    id: String,
}

#[derive(Clone)]
pub struct EmailService {
    resend_api_key: Option<String>,
    from_email: String,
    webhook_url: Option<String>,
    http_client: Client,
}

impl EmailService {
    pub fn new(
        resend_api_key: Option<String>,
        from_email: String,
        webhook_url: Option<String>,
    ) -> Self {
        Self {
            resend_api_key,
            from_email,
            webhook_url,
            http_client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    /// Service that never sends anything.
    pub fn disabled() -> Self {
        Self::new(None, String::new(), None)
    }

    pub fn is_enabled(&self) -> bool {
        self.webhook_url.is_some() || self.resend_api_key.is_some()
    }

    /// Queue a license email on a background task.
    pub fn dispatch(&self, email: LicenseEmail) {
        if !self.is_enabled() {
            tracing::debug!(plugin = %email.plugin, "Email delivery disabled, skipping license email");
            return;
        }

        let service = self.clone();
        tokio::spawn(async move {
            match service.send_license_email(&email).await {
                Ok(result) => {
                    tracing::debug!(?result, plugin = %email.plugin, "License email delivered");
                }
                Err(e) => {
                    tracing::error!(
                        to = %email.to_email,
                        plugin = %email.plugin,
                        "Failed to deliver license email: {}",
                        e
                    );
                }
            }
        });
    }

    /// Deliver a license email through the configured channel.
    ///
    /// The webhook takes precedence over Resend when both are configured.
    pub async fn send_license_email(&self, email: &LicenseEmail) -> Result<EmailSendResult> {
        if let Some(ref webhook_url) = self.webhook_url {
            return self.call_webhook(webhook_url, email).await;
        }

        let Some(ref api_key) = self.resend_api_key else {
            return Ok(EmailSendResult::Disabled);
        };

        let request = ResendEmailRequest {
            from: &self.from_email,
            to: vec![&email.to_email],
            subject: email.subject(),
            text: email.text_body(),
            html: email.html_body(),
        };

        self.send_request_with_retry(api_key, &request, &email.to_email)
            .await
    }

    /// Send a request to Resend API with exponential backoff retry.
    ///
    /// Retries on transient errors (network issues, 5xx, 429 rate limit).
    async fn send_request_with_retry(
        &self,
        api_key: &str,
        request: &ResendEmailRequest<'_>,
        to_email: &str,
    ) -> Result<EmailSendResult> {
        let mut last_error: Option<AppError> = None;

        for (attempt, delay_secs) in std::iter::once(&0u64).chain(RETRY_DELAYS).enumerate() {
            if *delay_secs > 0 {
                tracing::warn!(attempt, delay_secs, "Retrying email send after transient failure");
                tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
            }

            match self.send_resend_request(api_key, request).await {
                Ok(()) => {
                    tracing::info!(attempt, to = %to_email, "License email sent via Resend");
                    return Ok(EmailSendResult::Sent);
                }
                Err((error, true)) => last_error = Some(error),
                Err((error, false)) => return Err(error),
            }
        }

        tracing::error!(
            to = %to_email,
            attempts = RETRY_DELAYS.len() + 1,
            "Email send failed after all retries"
        );
        Err(last_error.unwrap_or_else(|| {
            AppError::Internal("Email service error: all retries exhausted".into())
        }))
    }

    /// Returns Err((error, is_transient)) on failure.
    async fn send_resend_request(
        &self,
        api_key: &str,
        request: &ResendEmailRequest<'_>,
    ) -> std::result::Result<(), (AppError, bool)> {
        let response = self
            .http_client
            .post(RESEND_API_URL)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| (AppError::Internal(format!("Email service error: {}", e)), true))?;

        let status = response.status();
        if status.is_success() {
            response
                .json::<ResendEmailResponse>()
                .await
                .map_err(|_| (AppError::Internal("Email service response error".into()), false))?;
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let is_transient = status.as_u16() == 429 || status.is_server_error();
        if is_transient {
            tracing::warn!(status = %status, body = %body, "Resend API returned transient error");
        } else {
            tracing::error!(status = %status, body = %body, "Resend API returned non-transient error");
        }

        Err((
            AppError::Internal(format!("Email service error: {} - {}", status, body)),
            is_transient,
        ))
    }

    async fn call_webhook(&self, webhook_url: &str, email: &LicenseEmail) -> Result<EmailSendResult> {
        let payload = WebhookPayload {
            event: "license_issued",
            license: email,
        };

        for (attempt, delay_secs) in std::iter::once(&0u64).chain(RETRY_DELAYS).enumerate() {
            if *delay_secs > 0 {
                tokio::time::sleep(Duration::from_secs(*delay_secs)).await;
            }

            match self.http_client.post(webhook_url).json(&payload).send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::info!(attempt, plugin = %email.plugin, "License email webhook called");
                    return Ok(EmailSendResult::WebhookCalled);
                }
                Ok(response) if response.status().is_client_error() => {
                    return Err(AppError::Internal(format!(
                        "Email webhook rejected payload: {}",
                        response.status()
                    )));
                }
                Ok(response) => {
                    tracing::warn!(attempt, status = %response.status(), "Email webhook returned error");
                }
                Err(e) => {
                    tracing::warn!(attempt, "Email webhook request failed: {}", e);
                }
            }
        }

        Err(AppError::Internal("Email webhook failed after all retries".into()))
    }
}
