//! Domain types for the campaign dispatch engine.

use chrono::{DateTime, Utc};
use sea_orm::{sea_query::StringLen, DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::error::{CampaignError, CampaignResult};

/// Default number of recipients per batch.
pub const DEFAULT_BATCH_SIZE: u32 = 100;

/// Default caller-side delay between batches, in milliseconds.
pub const DEFAULT_BATCH_DELAY_MS: u64 = 10_000;

/// Most recent error-log entries retained on a job.
pub const ERROR_LOG_CAP: usize = 50;

/// Campaign job lifecycle status.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    Default,
    DeriveActiveEnum,
    EnumIter,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    /// Created, waiting for an explicit start
    #[default]
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Being advanced batch by batch
    #[sea_orm(string_value = "processing")]
    Processing,
    /// Suspended; no new batch starts until resumed
    #[sea_orm(string_value = "paused")]
    Paused,
    /// All recipients drained (terminal)
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Cancelled (terminal)
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether the job counts as the single "active" job in listings.
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Processing)
    }

    /// Validate a lifecycle action against the current status and return the
    /// status it would transition to. Invalid transitions make no change.
    pub fn apply(&self, action: JobAction) -> CampaignResult<JobStatus> {
        match action {
            JobAction::Start if *self == JobStatus::Pending => Ok(JobStatus::Processing),
            JobAction::Start => Err(CampaignError::StateConflict(format!(
                "can only start pending jobs (job is {})",
                self
            ))),
            JobAction::Pause if *self == JobStatus::Processing => Ok(JobStatus::Paused),
            JobAction::Pause => Err(CampaignError::StateConflict(format!(
                "can only pause processing jobs (job is {})",
                self
            ))),
            JobAction::Resume if *self == JobStatus::Paused => Ok(JobStatus::Processing),
            JobAction::Resume => Err(CampaignError::StateConflict(format!(
                "can only resume paused jobs (job is {})",
                self
            ))),
            JobAction::Cancel if !self.is_terminal() => Ok(JobStatus::Failed),
            JobAction::Cancel => Err(CampaignError::StateConflict(format!(
                "cannot cancel a {} job",
                self
            ))),
        }
    }
}

/// Lifecycle action applied through the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobAction {
    Start,
    Pause,
    Resume,
    Cancel,
}

/// Delivery status of a single recipient row.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    Default,
    DeriveActiveEnum,
    EnumIter,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecipientStatus {
    #[default]
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "sent")]
    Sent,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "skipped")]
    Skipped,
}

/// Terminal outcome recorded in the history log.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    DeriveActiveEnum,
    EnumIter,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HistoryStatus {
    /// Every batch went through
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Finished with at least one failed batch
    #[sea_orm(string_value = "partial")]
    Partial,
    /// Cancelled before completion
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// One structured entry in a job's append-only error log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorLogEntry {
    /// Batch number the error belongs to
    pub batch: i32,
    /// Transport error message, batch-level
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// A bulk-email campaign with its lifecycle state and progress counters.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Job {
    pub id: Uuid,
    pub subject: String,
    pub html_content: String,
    /// Raw recipient count at intake, including suppressed addresses
    pub total_recipients: i32,
    pub sent_count: i32,
    pub failed_count: i32,
    /// Recipients excluded at intake by the suppression list
    pub skipped_count: i32,
    pub status: JobStatus,
    /// Pointer past the last committed batch
    pub current_batch: i32,
    pub total_batches: i32,
    pub batch_size: i32,
    /// Advisory delay the caller should wait between advances
    pub delay_between_batches_ms: i64,
    pub error_log: Vec<ErrorLogEntry>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One addressee row within a job's recipient ledger.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Recipient {
    pub id: Uuid,
    pub job_id: Uuid,
    pub email: String,
    pub name: Option<String>,
    /// Assigned once at intake as floor(index / batch_size); immutable
    pub batch_number: i32,
    pub status: RecipientStatus,
    pub error_message: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Values for a new job row, produced by intake.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    pub subject: String,
    pub html_content: String,
    pub total_recipients: i32,
    pub skipped_count: i32,
    pub total_batches: i32,
    pub batch_size: i32,
    pub delay_between_batches_ms: i64,
}

/// Values for a new recipient row, produced by intake.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecipient {
    pub email: String,
    pub name: Option<String>,
    pub batch_number: i32,
}

/// One recipient in a job creation request.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RecipientInput {
    #[validate(email)]
    pub email: String,
    pub name: Option<String>,
}

/// Request body for creating a campaign job.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateJob {
    #[validate(length(min = 1, message = "recipients must not be empty"), nested)]
    pub recipients: Vec<RecipientInput>,
    #[validate(length(min = 1, message = "subject is required"))]
    pub subject: String,
    #[validate(length(min = 1, message = "HTML content is required"))]
    pub html_content: String,
    #[serde(default = "default_batch_size")]
    #[validate(range(min = 1, max = 1000))]
    pub batch_size: u32,
    #[serde(default = "default_batch_delay_ms")]
    pub delay_between_batches_ms: u64,
}

fn default_batch_size() -> u32 {
    DEFAULT_BATCH_SIZE
}

fn default_batch_delay_ms() -> u64 {
    DEFAULT_BATCH_DELAY_MS
}

/// Response for a created job.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobReceipt {
    pub job_id: Uuid,
    pub total_recipients: i32,
    pub total_batches: i32,
    pub estimated_time_minutes: i64,
}

/// Recipient counts grouped by delivery status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct RecipientCounts {
    pub pending: i64,
    pub sent: i64,
    pub failed: i64,
    pub skipped: i64,
}

/// A job together with its per-status recipient counts.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct JobDetail {
    pub job: Job,
    pub stats: RecipientCounts,
}

/// Job listing: recent jobs plus the single active one, if any.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobList {
    pub jobs: Vec<Job>,
    pub active_job: Option<Job>,
}

/// Request body for the status endpoint.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateJobStatus {
    pub action: JobAction,
}

/// Result of one advance step.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub batch_number: i32,
    pub sent: i32,
    pub failed: i32,
    pub job_completed: bool,
    /// Milliseconds the caller should wait before the next advance;
    /// `None` when no pending recipients remain
    pub next_batch_in: Option<i64>,
}

/// Stored sending identity. The API key is encrypted at rest.
#[derive(Debug, Clone)]
pub struct SenderSettings {
    pub id: Uuid,
    pub api_key: String,
    pub from_email: String,
    pub from_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body for saving sender settings.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SaveSettings {
    #[validate(length(min = 1, message = "api_key is required"))]
    pub api_key: String,
    #[validate(email)]
    pub from_email: String,
    #[validate(length(min = 1, message = "from_name is required"))]
    pub from_name: String,
}

/// Settings as returned to clients: the API key is masked, never decrypted
/// into a response.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SettingsView {
    pub id: Option<Uuid>,
    pub api_key: Option<String>,
    pub from_email: Option<String>,
    pub from_name: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SettingsView {
    pub fn empty() -> Self {
        Self {
            id: None,
            api_key: None,
            from_email: None,
            from_name: None,
            updated_at: None,
        }
    }
}

/// Response for a saved settings row.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SaveSettingsReceipt {
    pub id: Uuid,
}

/// Request body for the settings test-send endpoint.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct TestSend {
    #[validate(email)]
    pub test_email: String,
}

/// One permanently suppressed address.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Suppression {
    pub id: Uuid,
    pub email: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request body for adding suppressions: a single email or a bulk list.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct AddSuppressions {
    pub email: Option<String>,
    pub emails: Option<Vec<String>>,
    pub reason: Option<String>,
}

/// Outcome of an add-suppressions request.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AddSuppressionsReport {
    pub added: usize,
    pub skipped: usize,
    pub duplicates: Vec<String>,
}

/// Query parameters for listing suppressions.
#[derive(Debug, Clone, Deserialize, ToSchema, IntoParams)]
pub struct SuppressionQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_suppression_limit")]
    pub limit: u64,
    pub search: Option<String>,
}

fn default_page() -> u64 {
    1
}

fn default_suppression_limit() -> u64 {
    50
}

/// One page of suppressions.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SuppressionPage {
    pub suppressions: Vec<Suppression>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

/// Query parameters for deleting a suppression by id or email.
#[derive(Debug, Clone, Deserialize, ToSchema, IntoParams)]
pub struct DeleteSuppression {
    pub id: Option<Uuid>,
    pub email: Option<String>,
}

/// Immutable terminal-state snapshot of a finished job.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HistoryRecord {
    pub id: Uuid,
    pub subject: String,
    pub recipient_count: i32,
    pub sent_count: i32,
    pub failed_count: i32,
    pub skipped_count: i32,
    pub status: HistoryStatus,
    pub error_log: Vec<ErrorLogEntry>,
    pub created_at: DateTime<Utc>,
}

/// Query parameters for listing history.
#[derive(Debug, Clone, Deserialize, ToSchema, IntoParams)]
pub struct HistoryQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_history_limit")]
    pub limit: u64,
    pub status: Option<HistoryStatus>,
}

fn default_history_limit() -> u64 {
    20
}

/// One page of history records.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HistoryPage {
    pub history: Vec<HistoryRecord>,
    pub total: u64,
}
