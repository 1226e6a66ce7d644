use axum_helpers::server::{create_app, health_router};
use core_config::tracing::{init_tracing, install_color_eyre};
use domain_campaigns::CredentialVault;
use migration::Migrator;
use tracing::info;

mod api;
mod config;
mod openapi;

use config::Config;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Install color-eyre first for colored error output (before any fallible
    // operations)
    install_color_eyre();

    // Load configuration from environment variables
    let config = Config::from_env()?;

    init_tracing(&config.environment);

    // The vault fails fast on a short secret, before any job can be created
    let vault =
        CredentialVault::new(&config.encryption_secret).map_err(|e| eyre::eyre!("{}", e))?;

    let db = database::postgres::connect_from_config_with_retry(config.database.clone(), None)
        .await
        .map_err(|e| eyre::eyre!("PostgreSQL connection failed: {}", e))?;

    database::postgres::run_migrations::<Migrator>(&db, config.app.name)
        .await
        .map_err(|e| eyre::eyre!("Migrations failed: {}", e))?;

    // Build router with API routes (state applied per domain router)
    let api_routes = api::routes(db.clone(), vault)?;

    // create_router adds docs/middleware around the composed routes
    let router = axum_helpers::create_router::<openapi::ApiDoc>(api_routes).await?;

    // Merge health endpoints:
    // - /health: liveness with app name/version
    // - /ready: readiness with a real database check
    let app = router
        .merge(health_router(config.app))
        .merge(api::ready_router(db.clone()));

    info!(
        name = config.app.name,
        version = config.app.version,
        "Starting relay API"
    );

    create_app(app, &config.server).await?;

    info!("Shutting down: closing database connections");
    match db.close().await {
        Ok(_) => info!("PostgreSQL connection closed successfully"),
        Err(e) => tracing::error!("Error closing PostgreSQL: {}", e),
    }

    info!("Relay API shutdown complete");
    Ok(())
}
