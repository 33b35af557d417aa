//! Kitchen ledger server

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use kitchen_ledger::{
    config::{Config, StorageBackend},
    create_app, AppState, MemoryStore, PgStore, Store,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "kitchen_ledger=debug,tower_http=debug,sqlx=warn";

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Open the configured store; failure here is fatal
async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn Store>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using the in-memory store; data is lost on shutdown");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Postgres => {
            tracing::info!("Connecting to database...");
            let store = PgStore::connect(&config.database)
                .await
                .context("failed to connect to the database")?;
            tracing::info!("Database connection established");

            tracing::info!("Running database migrations...");
            store.migrate().await.context("failed to run migrations")?;
            tracing::info!("Migrations completed");

            Ok(Arc::new(store))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load().context("failed to load configuration")?;

    init_tracing(config.logging.json);

    tracing::info!("Starting kitchen ledger server");
    tracing::info!("Environment: {}", config.environment);

    let store = open_store(&config).await?;
    tracing::info!("Storage backend: {}", store.backend_name());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server address")?;

    let app = create_app(AppState::new(store, config));

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
