//! QuickWoo license server
//!
//! Issues, verifies and revokes license keys for the QuickWoo plugins, and
//! issues keys automatically when a Stripe checkout completes.

pub mod catalog;
pub mod config;
pub mod db;
pub mod email;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod licensing;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod util;
