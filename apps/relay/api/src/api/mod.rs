use axum::{routing::get, Router};
use axum_helpers::server::{run_health_checks, HealthCheckFuture};
use database::postgres::DatabaseConnection;
use domain_campaigns::{
    handlers, CredentialVault, DispatchDriver, HistoryService, JobService, PgHistoryRepository,
    PgJobRepository, PgSettingsRepository, PgSuppressionRepository, ResendMailer,
    SettingsService, SuppressionService,
};
use std::sync::Arc;

/// Creates the API routes without the `/api` prefix (added by
/// `create_router`). Each domain router has its state applied already, so
/// the result is a stateless `Router`.
pub fn routes(db: DatabaseConnection, vault: CredentialVault) -> eyre::Result<Router> {
    let jobs = Arc::new(PgJobRepository::new(db.clone()));
    let suppressions = Arc::new(PgSuppressionRepository::new(db.clone()));
    let settings = Arc::new(PgSettingsRepository::new(db.clone()));
    let history = Arc::new(PgHistoryRepository::new(db));
    let mailer = Arc::new(ResendMailer::new().map_err(|e| eyre::eyre!("{}", e))?);

    let job_service = JobService::new(jobs.clone(), suppressions.clone());
    let driver = DispatchDriver::new(jobs, settings.clone(), mailer.clone(), vault.clone());
    let settings_service = SettingsService::new(settings, mailer, vault);
    let suppression_service = SuppressionService::new(suppressions);
    let history_service = HistoryService::new(history);

    Ok(Router::new()
        .nest(
            "/jobs",
            handlers::jobs_router(job_service).merge(handlers::advance_router(driver)),
        )
        .nest("/settings", handlers::settings_router(settings_service))
        .nest(
            "/suppressions",
            handlers::suppressions_router(suppression_service),
        )
        .nest("/history", handlers::history_router(history_service)))
}

/// Creates a router with the /ready endpoint performing real dependency
/// checks (PostgreSQL).
pub fn ready_router(db: DatabaseConnection) -> Router {
    Router::new()
        .route("/ready", get(ready_handler))
        .with_state(db)
}

async fn ready_handler(
    axum::extract::State(db): axum::extract::State<DatabaseConnection>,
) -> impl axum::response::IntoResponse {
    let checks: Vec<(&str, HealthCheckFuture)> = vec![(
        "database",
        Box::pin(async {
            database::postgres::check_health(&db)
                .await
                .map_err(|e| e.to_string())
        }),
    )];

    run_health_checks(checks).await
}
