use std::env;

use thiserror::Error;

use crate::catalog::{CatalogError, PriceCatalog};
use crate::payments::StripeConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("PORT must be a number between 1 and 65535, got '{0}'")]
    InvalidPort(String),

    #[error("STRIPE_PRICE_TABLE: {0}")]
    PriceTable(#[from] CatalogError),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    /// Shared secret for the admin endpoints. Unset closes the admin API.
    pub admin_api_key: Option<String>,
    /// Present when `STRIPE_WEBHOOK_SECRET` is set
    pub stripe: Option<StripeConfig>,
    pub prices: PriceCatalog,
    pub resend_api_key: Option<String>,
    pub email_from: String,
    pub email_webhook_url: Option<String>,
    pub dev_mode: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key/value source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let dev_mode = var("LICENSE_SERVER_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let port = match var("PORT") {
            Some(p) => p
                .parse::<u16>()
                .ok()
                .filter(|p| *p != 0)
                .ok_or(ConfigError::InvalidPort(p))?,
            None => 3000,
        };

        let stripe = var("STRIPE_WEBHOOK_SECRET").map(|webhook_secret| StripeConfig {
            secret_key: var("STRIPE_SECRET_KEY"),
            webhook_secret,
        });

        let prices = match var("STRIPE_PRICE_TABLE") {
            Some(table) => PriceCatalog::parse(&table)?,
            None => PriceCatalog::new(),
        };

        Ok(Self {
            host: var("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            database_path: var("DATABASE_PATH").unwrap_or_else(|| "licenses.db".to_string()),
            admin_api_key: var("ADMIN_API_KEY"),
            stripe,
            prices,
            resend_api_key: var("RESEND_API_KEY"),
            email_from: var("EMAIL_FROM").unwrap_or_else(|| "licenses@quickwoo.local".to_string()),
            email_webhook_url: var("EMAIL_WEBHOOK_URL"),
            dev_mode,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
