//! HTTP endpoints for the campaign engine.
//!
//! Each resource gets its own router with state applied, so the app can
//! compose them without threading generics through a single state type.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use axum_helpers::{ErrorResponse, UuidPath, ValidatedJson};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::dispatch::DispatchDriver;
use crate::error::CampaignResult;
use crate::models::{
    AddSuppressions, AddSuppressionsReport, BatchReport, CreateJob, CreateJobReceipt,
    DeleteSuppression, ErrorLogEntry, HistoryPage, HistoryQuery, HistoryRecord, HistoryStatus,
    Job, JobAction, JobDetail, JobList, JobStatus, RecipientCounts, RecipientInput,
    RecipientStatus, SaveSettings, SaveSettingsReceipt, SettingsView, Suppression,
    SuppressionPage, SuppressionQuery, TestSend, UpdateJobStatus,
};
use crate::repository::{
    HistoryRepository, JobRepository, SettingsRepository, SuppressionRepository,
};
use crate::service::{HistoryService, JobService, SettingsService, SuppressionService};
use crate::transport::BatchMailer;

/// OpenAPI documentation for the jobs endpoints
#[derive(OpenApi)]
#[openapi(
    paths(create_job, list_jobs, get_job, update_job, delete_job, advance_job),
    components(schemas(
        Job,
        JobStatus,
        JobAction,
        RecipientStatus,
        ErrorLogEntry,
        RecipientInput,
        CreateJob,
        CreateJobReceipt,
        RecipientCounts,
        JobDetail,
        JobList,
        UpdateJobStatus,
        BatchReport,
        ErrorResponse,
    )),
    tags((name = "jobs", description = "Campaign jobs: intake, lifecycle, dispatch"))
)]
pub struct JobsApiDoc;

/// OpenAPI documentation for the settings endpoints
#[derive(OpenApi)]
#[openapi(
    paths(get_settings, save_settings, test_settings),
    components(schemas(SaveSettings, SettingsView, SaveSettingsReceipt, TestSend)),
    tags((name = "settings", description = "Sending identity"))
)]
pub struct SettingsApiDoc;

/// OpenAPI documentation for the suppression endpoints
#[derive(OpenApi)]
#[openapi(
    paths(list_suppressions, add_suppressions, delete_suppression),
    components(schemas(
        Suppression,
        AddSuppressions,
        AddSuppressionsReport,
        SuppressionPage
    )),
    tags((name = "suppressions", description = "Do-not-contact list"))
)]
pub struct SuppressionsApiDoc;

/// OpenAPI documentation for the history endpoints
#[derive(OpenApi)]
#[openapi(
    paths(list_history),
    components(schemas(HistoryStatus, HistoryRecord, HistoryPage)),
    tags((name = "history", description = "Terminal-state send history"))
)]
pub struct HistoryApiDoc;

/// Router for job intake, queries, and lifecycle actions
pub fn jobs_router<J, S>(service: JobService<J, S>) -> Router
where
    J: JobRepository + 'static,
    S: SuppressionRepository + 'static,
{
    let shared = Arc::new(service);

    Router::new()
        .route("/", get(list_jobs).post(create_job))
        .route(
            "/{id}",
            get(get_job).patch(update_job).delete(delete_job),
        )
        .with_state(shared)
}

/// Router for the advance step; merged next to [`jobs_router`]
pub fn advance_router<J, S, M>(driver: DispatchDriver<J, S, M>) -> Router
where
    J: JobRepository + 'static,
    S: SettingsRepository + 'static,
    M: BatchMailer + 'static,
{
    Router::new()
        .route("/{id}/advance", post(advance_job))
        .with_state(Arc::new(driver))
}

/// Router for sender settings
pub fn settings_router<S, M>(service: SettingsService<S, M>) -> Router
where
    S: SettingsRepository + 'static,
    M: BatchMailer + 'static,
{
    let shared = Arc::new(service);

    Router::new()
        .route("/", get(get_settings).post(save_settings))
        .route("/test", post(test_settings))
        .with_state(shared)
}

/// Router for the suppression list
pub fn suppressions_router<S>(service: SuppressionService<S>) -> Router
where
    S: SuppressionRepository + 'static,
{
    let shared = Arc::new(service);

    Router::new()
        .route(
            "/",
            get(list_suppressions)
                .post(add_suppressions)
                .delete(delete_suppression),
        )
        .with_state(shared)
}

/// Router for the send history
pub fn history_router<H>(service: HistoryService<H>) -> Router
where
    H: HistoryRepository + 'static,
{
    Router::new()
        .route("/", get(list_history))
        .with_state(Arc::new(service))
}

/// Create a campaign job
#[utoipa::path(
    post,
    path = "",
    tag = "jobs",
    request_body = CreateJob,
    responses(
        (status = 201, description = "Job created and queued", body = CreateJobReceipt),
        (status = 400, description = "Empty recipients, blank content, or all recipients suppressed", body = ErrorResponse),
        (status = 500, description = "Internal error", body = ErrorResponse)
    )
)]
async fn create_job<J: JobRepository, S: SuppressionRepository>(
    State(service): State<Arc<JobService<J, S>>>,
    ValidatedJson(input): ValidatedJson<CreateJob>,
) -> CampaignResult<impl IntoResponse> {
    let receipt = service.create_job(input).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// List recent jobs plus the active one
#[utoipa::path(
    get,
    path = "",
    tag = "jobs",
    responses(
        (status = 200, description = "Recent jobs, newest first", body = JobList),
        (status = 500, description = "Internal error", body = ErrorResponse)
    )
)]
async fn list_jobs<J: JobRepository, S: SuppressionRepository>(
    State(service): State<Arc<JobService<J, S>>>,
) -> CampaignResult<Json<JobList>> {
    let list = service.list_jobs().await?;
    Ok(Json(list))
}

/// Get a job with its recipient counts
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "jobs",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job with per-status recipient counts", body = JobDetail),
        (status = 404, description = "Job not found", body = ErrorResponse),
        (status = 500, description = "Internal error", body = ErrorResponse)
    )
)]
async fn get_job<J: JobRepository, S: SuppressionRepository>(
    State(service): State<Arc<JobService<J, S>>>,
    UuidPath(id): UuidPath,
) -> CampaignResult<Json<JobDetail>> {
    let detail = service.get_job(id).await?;
    Ok(Json(detail))
}

/// Apply a lifecycle action (start, pause, resume, cancel)
#[utoipa::path(
    patch,
    path = "/{id}",
    tag = "jobs",
    params(("id" = Uuid, Path, description = "Job ID")),
    request_body = UpdateJobStatus,
    responses(
        (status = 200, description = "Updated job", body = Job),
        (status = 404, description = "Job not found", body = ErrorResponse),
        (status = 409, description = "Illegal lifecycle transition", body = ErrorResponse),
        (status = 500, description = "Internal error", body = ErrorResponse)
    )
)]
async fn update_job<J: JobRepository, S: SuppressionRepository>(
    State(service): State<Arc<JobService<J, S>>>,
    UuidPath(id): UuidPath,
    ValidatedJson(input): ValidatedJson<UpdateJobStatus>,
) -> CampaignResult<Json<Job>> {
    let job = service.update_status(id, input.action).await?;
    Ok(Json(job))
}

/// Delete a job (rejected while processing)
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "jobs",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 204, description = "Job deleted"),
        (status = 404, description = "Job not found", body = ErrorResponse),
        (status = 409, description = "Job is processing", body = ErrorResponse),
        (status = 500, description = "Internal error", body = ErrorResponse)
    )
)]
async fn delete_job<J: JobRepository, S: SuppressionRepository>(
    State(service): State<Arc<JobService<J, S>>>,
    UuidPath(id): UuidPath,
) -> CampaignResult<impl IntoResponse> {
    service.delete_job(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Advance a processing job by one batch
#[utoipa::path(
    post,
    path = "/{id}/advance",
    tag = "jobs",
    params(("id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Batch outcome for this step", body = BatchReport),
        (status = 404, description = "Job not found", body = ErrorResponse),
        (status = 409, description = "Job not processing, or a concurrent advance holds the dispatch lease", body = ErrorResponse),
        (status = 503, description = "Credential decrypt failure; retriable", body = ErrorResponse),
        (status = 500, description = "Internal error", body = ErrorResponse)
    )
)]
async fn advance_job<J: JobRepository, S: SettingsRepository, M: BatchMailer>(
    State(driver): State<Arc<DispatchDriver<J, S, M>>>,
    UuidPath(id): UuidPath,
) -> CampaignResult<Json<BatchReport>> {
    let report = driver.advance(id).await?;
    Ok(Json(report))
}

/// Get sender settings with a masked API key
#[utoipa::path(
    get,
    path = "",
    tag = "settings",
    responses(
        (status = 200, description = "Current settings (masked key)", body = SettingsView),
        (status = 500, description = "Internal error", body = ErrorResponse)
    )
)]
async fn get_settings<S: SettingsRepository, M: BatchMailer>(
    State(service): State<Arc<SettingsService<S, M>>>,
) -> CampaignResult<Json<SettingsView>> {
    let view = service.view().await?;
    Ok(Json(view))
}

/// Save sender settings (idempotent under an already-encrypted key)
#[utoipa::path(
    post,
    path = "",
    tag = "settings",
    request_body = SaveSettings,
    responses(
        (status = 200, description = "Settings saved", body = SaveSettingsReceipt),
        (status = 400, description = "Missing fields or malformed API key", body = ErrorResponse),
        (status = 500, description = "Internal error", body = ErrorResponse)
    )
)]
async fn save_settings<S: SettingsRepository, M: BatchMailer>(
    State(service): State<Arc<SettingsService<S, M>>>,
    ValidatedJson(input): ValidatedJson<SaveSettings>,
) -> CampaignResult<Json<SaveSettingsReceipt>> {
    let id = service.save(input).await?;
    Ok(Json(SaveSettingsReceipt { id }))
}

/// Send a test email with the stored credential
#[utoipa::path(
    post,
    path = "/test",
    tag = "settings",
    request_body = TestSend,
    responses(
        (status = 204, description = "Test email accepted by the provider"),
        (status = 400, description = "Invalid address or unconfigured settings", body = ErrorResponse),
        (status = 503, description = "Credential decrypt failure", body = ErrorResponse),
        (status = 500, description = "Send failed", body = ErrorResponse)
    )
)]
async fn test_settings<S: SettingsRepository, M: BatchMailer>(
    State(service): State<Arc<SettingsService<S, M>>>,
    ValidatedJson(input): ValidatedJson<TestSend>,
) -> CampaignResult<impl IntoResponse> {
    service.test_send(input).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List suppressions with pagination and search
#[utoipa::path(
    get,
    path = "",
    tag = "suppressions",
    params(SuppressionQuery),
    responses(
        (status = 200, description = "One page of suppressions", body = SuppressionPage),
        (status = 400, description = "Invalid pagination parameters", body = ErrorResponse),
        (status = 500, description = "Internal error", body = ErrorResponse)
    )
)]
async fn list_suppressions<S: SuppressionRepository>(
    State(service): State<Arc<SuppressionService<S>>>,
    Query(query): Query<SuppressionQuery>,
) -> CampaignResult<Json<SuppressionPage>> {
    let page = service.list(query).await?;
    Ok(Json(page))
}

/// Add one email or a bulk list to the suppression list
#[utoipa::path(
    post,
    path = "",
    tag = "suppressions",
    request_body = AddSuppressions,
    responses(
        (status = 200, description = "Added, with duplicates reported", body = AddSuppressionsReport),
        (status = 400, description = "No input or invalid email format", body = ErrorResponse),
        (status = 500, description = "Internal error", body = ErrorResponse)
    )
)]
async fn add_suppressions<S: SuppressionRepository>(
    State(service): State<Arc<SuppressionService<S>>>,
    ValidatedJson(input): ValidatedJson<AddSuppressions>,
) -> CampaignResult<Json<AddSuppressionsReport>> {
    let report = service.add(input).await?;
    Ok(Json(report))
}

/// Remove a suppression by id or email
#[utoipa::path(
    delete,
    path = "",
    tag = "suppressions",
    params(DeleteSuppression),
    responses(
        (status = 204, description = "Suppression removed"),
        (status = 400, description = "Neither id nor email given", body = ErrorResponse),
        (status = 404, description = "Entry not found", body = ErrorResponse),
        (status = 500, description = "Internal error", body = ErrorResponse)
    )
)]
async fn delete_suppression<S: SuppressionRepository>(
    State(service): State<Arc<SuppressionService<S>>>,
    Query(query): Query<DeleteSuppression>,
) -> CampaignResult<impl IntoResponse> {
    service.remove(query.id, query.email).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List history records, newest first
#[utoipa::path(
    get,
    path = "",
    tag = "history",
    params(HistoryQuery),
    responses(
        (status = 200, description = "One page of history", body = HistoryPage),
        (status = 400, description = "Invalid pagination parameters", body = ErrorResponse),
        (status = 500, description = "Internal error", body = ErrorResponse)
    )
)]
async fn list_history<H: HistoryRepository>(
    State(service): State<Arc<HistoryService<H>>>,
    Query(query): Query<HistoryQuery>,
) -> CampaignResult<Json<HistoryPage>> {
    let page = service.list(query).await?;
    Ok(Json(page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CampaignError;
    use crate::repository::{MockJobRepository, MockSuppressionRepository};
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Utc;
    use http_body_util::BodyExt;
    use serde_json::json;
    use std::collections::HashSet;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn sample_job(status: JobStatus) -> Job {
        Job {
            id: Uuid::now_v7(),
            subject: "Hello".to_string(),
            html_content: "<p>Hi</p>".to_string(),
            total_recipients: 5,
            sent_count: 0,
            failed_count: 0,
            skipped_count: 0,
            status,
            current_batch: 0,
            total_batches: 3,
            batch_size: 2,
            delay_between_batches_ms: 10_000,
            error_log: Vec::new(),
            started_at: None,
            completed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn router(jobs: MockJobRepository, suppressions: MockSuppressionRepository) -> Router {
        jobs_router(JobService::new(Arc::new(jobs), Arc::new(suppressions)))
    }

    async fn json_body(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_create_job_returns_201_with_receipt() {
        let mut jobs = MockJobRepository::new();
        let mut suppressions = MockSuppressionRepository::new();

        suppressions
            .expect_all_emails()
            .returning(|| Ok(HashSet::new()));
        jobs.expect_create_job().returning(|new_job, _| {
            let mut job = sample_job(JobStatus::Pending);
            job.total_recipients = new_job.total_recipients;
            job.total_batches = new_job.total_batches;
            Ok(job)
        });

        let app = router(jobs, suppressions);
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({
                    "recipients": [
                        {"email": "a@example.com"},
                        {"email": "b@example.com"},
                        {"email": "c@example.com"},
                        {"email": "d@example.com"},
                        {"email": "e@example.com"}
                    ],
                    "subject": "Hello {{name}}",
                    "htmlContent": "<p>Hi {{name}}</p>",
                    "batchSize": 2
                })
                .to_string(),
            ))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = json_body(response.into_body()).await;
        assert_eq!(body["totalRecipients"], 5);
        assert_eq!(body["totalBatches"], 3);
        assert_eq!(body["estimatedTimeMinutes"], 1);
    }

    #[tokio::test]
    async fn test_create_job_empty_recipients_is_400() {
        let app = router(MockJobRepository::new(), MockSuppressionRepository::new());

        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({
                    "recipients": [],
                    "subject": "Hello",
                    "htmlContent": "<p>Hi</p>"
                })
                .to_string(),
            ))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_job_all_suppressed_is_400() {
        let jobs = MockJobRepository::new();
        let mut suppressions = MockSuppressionRepository::new();
        suppressions
            .expect_all_emails()
            .returning(|| Ok(HashSet::from(["a@example.com".to_string()])));

        let app = router(jobs, suppressions);
        let request = Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({
                    "recipients": [{"email": "a@example.com"}],
                    "subject": "Hello",
                    "htmlContent": "<p>Hi</p>"
                })
                .to_string(),
            ))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response.into_body()).await;
        assert!(body["message"]
            .as_str()
            .unwrap()
            .contains("suppressed"));
    }

    #[tokio::test]
    async fn test_get_missing_job_is_404() {
        let mut jobs = MockJobRepository::new();
        jobs.expect_get_job().returning(|_| Ok(None));

        let app = router(jobs, MockSuppressionRepository::new());
        let request = Request::builder()
            .method("GET")
            .uri(format!("/{}", Uuid::now_v7()))
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_start_completed_job_is_409() {
        let mut jobs = MockJobRepository::new();
        let job = sample_job(JobStatus::Completed);
        let id = job.id;
        jobs.expect_get_job()
            .returning(move |_| Ok(Some(job.clone())));

        let app = router(jobs, MockSuppressionRepository::new());
        let request = Request::builder()
            .method("PATCH")
            .uri(format!("/{}", id))
            .header("content-type", "application/json")
            .body(Body::from(json!({"action": "start"}).to_string()))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_delete_processing_job_is_409() {
        let mut jobs = MockJobRepository::new();
        let job = sample_job(JobStatus::Processing);
        let id = job.id;
        jobs.expect_get_job()
            .returning(move |_| Ok(Some(job.clone())));

        let app = router(jobs, MockSuppressionRepository::new());
        let request = Request::builder()
            .method("DELETE")
            .uri(format!("/{}", id))
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_advance_paused_job_is_409() {
        use crate::repository::MockSettingsRepository;
        use crate::transport::MockBatchMailer;
        use crate::vault::CredentialVault;

        let mut jobs = MockJobRepository::new();
        let job = sample_job(JobStatus::Paused);
        let id = job.id;
        jobs.expect_get_job()
            .returning(move |_| Ok(Some(job.clone())));

        let driver = DispatchDriver::new(
            Arc::new(jobs),
            Arc::new(MockSettingsRepository::new()),
            Arc::new(MockBatchMailer::new()),
            CredentialVault::new("unit-test-secret-0123456789abcdef").unwrap(),
        );
        let app = advance_router(driver);

        let request = Request::builder()
            .method("POST")
            .uri(format!("/{}/advance", id))
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = json_body(response.into_body()).await;
        assert_eq!(body["message"], "job is paused, not processing");
    }

    #[tokio::test]
    async fn test_concurrent_advance_conflict_is_409() {
        use crate::repository::MockSettingsRepository;
        use crate::transport::MockBatchMailer;
        use crate::vault::CredentialVault;

        let vault = CredentialVault::new("unit-test-secret-0123456789abcdef").unwrap();
        let encrypted = vault.encrypt("re_live_key_12345").unwrap();

        let mut jobs = MockJobRepository::new();
        let job = sample_job(JobStatus::Processing);
        let id = job.id;
        jobs.expect_get_job()
            .returning(move |_| Ok(Some(job.clone())));
        jobs.expect_acquire_lease().returning(|_, _| {
            Err(CampaignError::StateConflict(
                "another advance is already in progress for this job".to_string(),
            ))
        });

        let mut settings = MockSettingsRepository::new();
        settings.expect_get().returning(move || {
            Ok(Some(crate::models::SenderSettings {
                id: Uuid::now_v7(),
                api_key: encrypted.clone(),
                from_email: "noreply@example.com".to_string(),
                from_name: "Relay".to_string(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            }))
        });

        let driver = DispatchDriver::new(
            Arc::new(jobs),
            Arc::new(settings),
            Arc::new(MockBatchMailer::new()),
            vault,
        );
        let app = advance_router(driver);

        let request = Request::builder()
            .method("POST")
            .uri(format!("/{}/advance", id))
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_invalid_uuid_is_400() {
        let app = router(MockJobRepository::new(), MockSuppressionRepository::new());

        let request = Request::builder()
            .method("GET")
            .uri("/not-a-uuid")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
