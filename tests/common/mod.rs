//! Test utilities and fixtures for license server integration tests

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response},
};
use chrono::NaiveDate;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use serde_json::Value;

pub use quickwoo_license::catalog::PriceCatalog;
pub use quickwoo_license::db::{AppState, DbPool, init_db, queries};
pub use quickwoo_license::email::EmailService;
pub use quickwoo_license::licensing::*;
pub use quickwoo_license::models::*;
pub use quickwoo_license::payments::{StripeClient, StripeConfig};

pub const ADMIN_KEY: &str = "test-admin-key";
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Price ids wired into the test catalog
pub const PRICE_SEO_LIFE: &str = "price_seo_life";
pub const PRICE_EDIT_YEAR: &str = "price_edit_year";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Create an in-memory test database with schema initialized
pub fn setup_test_db() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to create in-memory database");
    init_db(&conn).expect("Failed to initialize schema");
    conn
}

/// Single-connection pool: every `SqliteConnectionManager::memory()` connection
/// is its own database, so a bigger pool would hand out empty schemas.
pub fn setup_test_pool() -> DbPool {
    let manager = SqliteConnectionManager::memory();
    let pool = Pool::builder().max_size(1).build(manager).unwrap();
    {
        let conn = pool.get().unwrap();
        init_db(&conn).unwrap();
    }
    pool
}

pub fn test_price_catalog() -> PriceCatalog {
    let mut prices = PriceCatalog::new();
    prices.insert(PRICE_SEO_LIFE, "quick-seo", Plan::Life);
    prices.insert(PRICE_EDIT_YEAR, "quick-edit", Plan::Year);
    prices
}

/// Stripe client whose API calls go to a closed local port.
pub fn test_stripe_client() -> StripeClient {
    StripeClient::new(&StripeConfig {
        secret_key: Some("sk_test_xxx".to_string()),
        webhook_secret: WEBHOOK_SECRET.to_string(),
    })
    .with_api_base("http://127.0.0.1:9")
}

pub fn create_test_app_state() -> AppState {
    AppState {
        db: setup_test_pool(),
        admin_api_key: Some(ADMIN_KEY.to_string()),
        stripe: Some(test_stripe_client()),
        prices: Arc::new(test_price_catalog()),
        email_service: Arc::new(EmailService::disabled()),
    }
}

pub fn test_app(state: AppState) -> Router {
    quickwoo_license::handlers::app(state)
}

/// Issue a license directly through the store, dated `issued_at`.
pub fn create_test_license(
    conn: &Connection,
    email: &str,
    plugin: &str,
    plan: Plan,
    issued_at: NaiveDate,
) -> License {
    issue_license(
        conn,
        &IssueLicense {
            email: email.to_string(),
            plugin: plugin.to_string(),
            plan,
        },
        issued_at,
    )
    .expect("Failed to create test license")
}

/// Build a `Stripe-Signature` header for `payload` signed now.
pub fn stripe_signature_header(payload: &[u8], secret: &str) -> String {
    stripe_signature_header_at(payload, secret, chrono::Utc::now().timestamp())
}

pub fn stripe_signature_header_at(payload: &[u8], secret: &str, timestamp: i64) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    )
}

pub fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn admin_json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .header("X-API-Key", ADMIN_KEY)
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).expect("response body should be JSON")
}
