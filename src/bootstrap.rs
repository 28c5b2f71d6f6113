use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use diesel::Connection;
use diesel_async::{AsyncPgConnection, async_connection_wrapper::AsyncConnectionWrapper};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use crate::{
    api::orders::OrderServiceClient,
    app_state::AppState,
    config::AppConfig,
    defects::RandomPicker,
    engine::CartEngine,
    flags::FlagHandle,
    orders::OrderSubmitter,
    store::{CartStore, InMemoryCartStore, PgCartStore},
};

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

pub fn init_env() {
    if dotenvy::dotenv().is_err() {
        tracing::debug!("No .env file found, using process environment only");
    }
}

/// Applies pending migrations and returns how many ran.
pub async fn run_migrations(migrations: EmbeddedMigrations, database_url: &str) -> Result<usize> {
    let database_url = database_url.to_string();

    tokio::task::spawn_blocking(move || {
        let mut conn = AsyncConnectionWrapper::<AsyncPgConnection>::establish(&database_url)
            .context("Failed to connect for migrations")?;
        let applied = conn
            .run_pending_migrations(migrations)
            .map_err(|err| anyhow::anyhow!("Failed to run migrations: {}", err))?;
        Ok(applied.len())
    })
    .await
    .context("Migration task panicked")?
}

pub async fn build_store(config: &AppConfig) -> Result<Arc<dyn CartStore>> {
    match &config.database_url {
        Some(url) => {
            let store = PgCartStore::connect(url).await?;
            tracing::info!("Using Postgres cart store");
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, carts are kept in memory");
            Ok(Arc::new(InMemoryCartStore::new()))
        }
    }
}

pub fn build_state(config: &AppConfig, store: Arc<dyn CartStore>) -> Result<AppState> {
    let http_client = reqwest::Client::builder()
        .timeout(config.order_service_timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let engine = CartEngine::new(store);
    let submitter = OrderSubmitter::new(
        engine.clone(),
        OrderServiceClient::new(http_client),
        Arc::new(RandomPicker),
    );

    Ok(AppState::new(
        engine,
        submitter,
        FlagHandle::new(config.flags.clone()),
        config.environment.clone(),
    ))
}

pub async fn serve(name: &str, addr: &str, app: Router) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("{} listening on {}", name, listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await
        .context("Server error")?;

    Ok(())
}
