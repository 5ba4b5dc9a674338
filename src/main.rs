use std::sync::Arc;

use chrono::Utc;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quickwoo_license::config::Config;
use quickwoo_license::db::{AppState, create_pool, init_db, queries};
use quickwoo_license::email::EmailService;
use quickwoo_license::handlers;
use quickwoo_license::licensing::issue_license;
use quickwoo_license::models::{IssueLicense, Plan};
use quickwoo_license::payments::StripeClient;

#[derive(Parser, Debug)]
#[command(name = "quickwoo-license")]
#[command(about = "License server for the QuickWoo plugins")]
struct Cli {
    /// Issue a demo license and print it (dev mode only)
    #[arg(long)]
    seed: bool,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

const DEV_EMAIL: &str = "dev@quickwoo.local";
const DEV_PLUGIN: &str = "quick-seo";

/// Issues a lifetime demo license unless the dev email already has one.
fn seed_dev_data(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seeding");

    let existing = queries::list_licenses_by_email(&conn, DEV_EMAIL)
        .expect("Failed to look up dev licenses");
    if let Some(license) = existing.first() {
        tracing::info!("Dev license already exists, skipping seed: {}", license.license_key);
        return;
    }

    let license = issue_license(
        &conn,
        &IssueLicense {
            email: DEV_EMAIL.to_string(),
            plugin: DEV_PLUGIN.to_string(),
            plan: Plan::Life,
        },
        Utc::now().date_naive(),
    )
    .expect("Failed to issue dev license");

    tracing::info!("============================================");
    tracing::info!("DEV LICENSE ISSUED");
    tracing::info!("Email:  {}", license.email);
    tracing::info!("Plugin: {}", license.plugin);
    tracing::info!("Key:    {}", license.license_key);
    tracing::info!("============================================");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quickwoo_license=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {}", e);
        std::process::exit(1);
    });

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }
    if config.admin_api_key.is_none() {
        tracing::warn!("ADMIN_API_KEY not set: admin endpoints will reject every request");
    }
    if config.stripe.is_none() {
        tracing::warn!("STRIPE_WEBHOOK_SECRET not set: Stripe webhooks will be rejected");
    } else if config.prices.is_empty() {
        tracing::warn!("STRIPE_PRICE_TABLE is empty: purchases will not issue licenses");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let email_service = EmailService::new(
        config.resend_api_key.clone(),
        config.email_from.clone(),
        config.email_webhook_url.clone(),
    );
    if !email_service.is_enabled() {
        tracing::info!("No email channel configured: license emails are disabled");
    }

    let state = AppState {
        db: db_pool,
        admin_api_key: config.admin_api_key.clone(),
        stripe: config.stripe.as_ref().map(StripeClient::new),
        prices: Arc::new(config.prices.clone()),
        email_service: Arc::new(email_service),
    };

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set LICENSE_SERVER_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    let app = handlers::app(state).layer(TraceLayer::new_for_http());

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    if cli.ephemeral && !config.dev_mode {
        tracing::warn!("--ephemeral flag ignored: not in dev mode (set LICENSE_SERVER_ENV=dev)");
    }
    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("License server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");

    if cleanup_on_exit {
        let db_path = &config.database_path;
        if let Err(e) = std::fs::remove_file(db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        } else {
            tracing::info!("Removed {}", db_path);
        }
        for sidecar in [format!("{}-wal", db_path), format!("{}-shm", db_path)] {
            match std::fs::remove_file(&sidecar) {
                Ok(()) => tracing::debug!("Removed {}", sidecar),
                // Sidecars only exist while a WAL connection is open
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!("Failed to remove {}: {}", sidecar, e),
            }
        }
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
