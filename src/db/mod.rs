mod from_row;
mod schema;
pub mod queries;

pub use schema::init_db;

use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::catalog::PriceCatalog;
use crate::email::EmailService;
use crate::payments::StripeClient;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    /// License database pool
    pub db: DbPool,
    /// Shared secret for the admin endpoints (None = admin API disabled)
    pub admin_api_key: Option<String>,
    /// Stripe client for webhook verification and line item lookups
    pub stripe: Option<StripeClient>,
    /// Stripe price id -> (plugin, plan)
    pub prices: Arc<PriceCatalog>,
    pub email_service: Arc<EmailService>,
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    Pool::builder().max_size(10).build(manager)
}
