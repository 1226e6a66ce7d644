use core_config::{app_info, env_required, server::ServerConfig, AppInfo, FromEnv};
use database::postgres::PostgresConfig;
use domain_campaigns::vault::ENCRYPTION_SECRET_VAR;

// Re-export Environment for use in other modules
pub use core_config::Environment;

/// Application-specific configuration.
/// Composes shared config components from the `core_config` library.
#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppInfo,
    pub database: PostgresConfig,
    pub server: ServerConfig,
    pub environment: Environment,
    /// Secret backing the credential vault; at least 32 characters
    pub encryption_secret: String,
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        let environment = Environment::from_env();
        let database = PostgresConfig::from_env()?; // Required - fails if DATABASE_URL is unset
        let server = ServerConfig::from_env()?; // Defaults: HOST=0.0.0.0, PORT=8080
        let encryption_secret = env_required(ENCRYPTION_SECRET_VAR)?;

        Ok(Self {
            app: app_info!(),
            database,
            server,
            environment,
            encryption_secret,
        })
    }
}
