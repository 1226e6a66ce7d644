use utoipa::OpenApi;

/// Aggregated OpenAPI documentation for the relay API.
///
/// Domain docs are nested under their mount points so the rendered paths
/// match the actual routes.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Relay API",
        description = "Bulk-email campaign dispatch service",
    ),
    nest(
        (path = "/api/jobs", api = domain_campaigns::handlers::JobsApiDoc),
        (path = "/api/settings", api = domain_campaigns::handlers::SettingsApiDoc),
        (path = "/api/suppressions", api = domain_campaigns::handlers::SuppressionsApiDoc),
        (path = "/api/history", api = domain_campaigns::handlers::HistoryApiDoc),
    )
)]
pub struct ApiDoc;
