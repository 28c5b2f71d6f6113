use anyhow::Result;
use diesel_migrations::{EmbeddedMigrations, embed_migrations};
use hits_cartservice::{bootstrap, config, routes};

/// Migrations embedded into the binary which helps with streamlining image building process
const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap::init_tracing();
    bootstrap::init_env();

    let config = config::load()?;

    if let Some(database_url) = &config.database_url {
        tracing::info!("Running migrations...");
        let migrations_count = bootstrap::run_migrations(MIGRATIONS, database_url).await?;
        tracing::info!("Run {} new migrations successfully", migrations_count);
    }

    tracing::info!("Bootstrapping...");
    let store = bootstrap::build_store(&config).await?;
    let state = bootstrap::build_state(&config, store)?;
    let app = routes::router(state);

    bootstrap::serve("CartService", &config.server_addr, app).await
}
