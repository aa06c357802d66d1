//! Egyptian National ID Service
//!
//! HTTP API that validates Egyptian National ID numbers and extracts the
//! birth date, gender and governorate they encode. Every inspection is
//! authenticated by API key, rate limited per key and billed to a durable
//! per-key usage counter.

use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use tracing_actix_web::TracingLogger;

mod api;
mod config;
mod db;
mod domain;
mod metering;

use crate::api::middleware::ApiMiddleware;
use crate::config::{Settings, StorageBackend};
use crate::db::{DbPool, MemoryUsageStore, SqliteUsageStore, UsageStore};
use crate::metering::Authenticator;

/// Application state shared across all handlers
pub struct AppState {
    pub store: Arc<dyn UsageStore>,
    pub started_at: Instant,
}

async fn open_store(settings: &Settings) -> anyhow::Result<Arc<dyn UsageStore>> {
    info!(backend = settings.database.backend.as_str(), "Opening usage store");

    match settings.database.backend {
        StorageBackend::Sqlite => {
            let pool = DbPool::open(&settings.database.path)
                .context("Failed to open usage database")?;
            pool.test_connection()
                .await
                .context("Usage database connection test failed")?;
            Ok(Arc::new(SqliteUsageStore::new(pool)))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory usage store, counters are lost on restart");
            Ok(Arc::new(MemoryUsageStore::new()))
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing subscriber for structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("national_id_service=info".parse()?)
                .add_directive("actix_web=info".parse()?),
        )
        .json()
        .init();

    // Load configuration
    let settings = Settings::load().context("Failed to load configuration")?;
    let bind_addr = settings.bind_addr();

    info!(
        "Starting National ID Service v{} on {}",
        env!("CARGO_PKG_VERSION"),
        bind_addr
    );

    let store = open_store(&settings).await?;

    let rate_limit = settings.rate_limit();
    metering::provision_seed_keys(store.as_ref(), &settings.seed_keys(), &rate_limit)
        .await
        .context("Failed to provision seed API keys")?;

    let authenticator = Authenticator::new(store.clone(), rate_limit);
    let workers = settings.server.workers.unwrap_or_else(|| num_cpus::get() * 2);

    // Create shared application state
    let app_state = web::Data::new(AppState {
        store,
        started_at: Instant::now(),
    });

    // Configure and start HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            // Authentication, rate limiting and usage metering
            .wrap(ApiMiddleware::new(authenticator.clone()))
            // Middleware (order matters - these wrap around ApiMiddleware)
            .wrap(TracingLogger::default())
            .wrap(middleware::Compress::default())
            .wrap(
                middleware::DefaultHeaders::new()
                    .add(("X-Service", "national-id-service"))
                    .add(("X-Version", env!("CARGO_PKG_VERSION"))),
            )
            // Routes
            .configure(api::configure_routes)
    })
    .workers(workers)
    .bind(&bind_addr)?
    .run()
    .await?;

    Ok(())
}
