//! Repository traits for campaign persistence.
//!
//! These traits define the data access interface; the PostgreSQL
//! implementations live in [`crate::postgres`]. All writes that touch the
//! progress-counter invariant (`sent + failed + pending + skipped ==
//! total_recipients`) are single methods so implementations can commit them
//! in one transaction.

use async_trait::async_trait;
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::CampaignResult;
use crate::models::{
    AddSuppressionsReport, HistoryPage, HistoryQuery, Job, JobStatus, NewJob, NewRecipient,
    Recipient, RecipientCounts, SenderSettings, SuppressionPage, SuppressionQuery,
};

/// Outcome applied to every recipient of a dispatched batch. The transport
/// reports batch-level success or failure only, so the whole batch moves as
/// one unit.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    Sent,
    Failed { error: String },
}

/// Proof of holding the per-job dispatch guard for one advance step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchLease {
    pub token: Uuid,
}

/// Persistence for jobs and their recipient ledger.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Persist a job and all its recipient rows as one all-or-nothing unit.
    /// A failure on any recipient chunk must leave no job row behind.
    async fn create_job(&self, job: NewJob, recipients: Vec<NewRecipient>)
        -> CampaignResult<Job>;

    async fn get_job(&self, id: Uuid) -> CampaignResult<Option<Job>>;

    /// Most recent jobs first.
    async fn list_jobs(&self, limit: u64) -> CampaignResult<Vec<Job>>;

    /// Guarded status change: applies only when the job is currently in
    /// `from`, otherwise a `StateConflict`. `mark_started` also stamps
    /// `started_at`.
    async fn transition(
        &self,
        id: Uuid,
        from: JobStatus,
        to: JobStatus,
        mark_started: bool,
    ) -> CampaignResult<Job>;

    /// Cancel from any non-terminal status and write the terminal history
    /// snapshot in the same transaction.
    async fn cancel(&self, id: Uuid) -> CampaignResult<Job>;

    /// Delete a job that is not `processing`; recipients cascade.
    async fn delete_job(&self, id: Uuid) -> CampaignResult<bool>;

    /// Recipient counts grouped by delivery status (ledger rows only; the
    /// intake-suppressed count lives on the job row).
    async fn recipient_counts(&self, job_id: Uuid) -> CampaignResult<RecipientCounts>;

    /// Acquire the per-job dispatch guard: succeeds only when the job is
    /// `processing` and no unexpired lease is held. A competing advance gets
    /// a `StateConflict` instead of double-sending a batch.
    async fn acquire_lease(&self, job_id: Uuid, ttl_secs: i64) -> CampaignResult<DispatchLease>;

    /// Release a lease without committing anything (early-bail paths).
    async fn release_lease(&self, job_id: Uuid, lease: DispatchLease) -> CampaignResult<()>;

    /// Rows of the smallest pending batch number, ordered by ascending
    /// recipient id, at most `batch_size` of them. Empty when the job has
    /// drained.
    async fn next_pending_batch(
        &self,
        job_id: Uuid,
        batch_size: i32,
    ) -> CampaignResult<Vec<Recipient>>;

    /// Commit one batch outcome atomically: recipient statuses, job
    /// counters, the batch pointer, the error log, and the lease release all
    /// land in one transaction so the counter invariant is never observably
    /// broken.
    async fn commit_batch(
        &self,
        job_id: Uuid,
        lease: DispatchLease,
        batch_number: i32,
        recipient_ids: Vec<Uuid>,
        outcome: BatchOutcome,
    ) -> CampaignResult<Job>;

    /// Flip `processing -> completed` and write exactly one history record,
    /// in one transaction. The status guard makes a lost race a no-op.
    async fn finalize(&self, job_id: Uuid, lease: DispatchLease) -> CampaignResult<Job>;

    async fn count_pending(&self, job_id: Uuid) -> CampaignResult<u64>;
}

/// Persistence for the global do-not-contact list.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SuppressionRepository: Send + Sync {
    /// Lowercased set of every suppressed address, consulted at job intake.
    async fn all_emails(&self) -> CampaignResult<HashSet<String>>;

    /// Insert pre-normalized addresses, skipping ones already present.
    async fn add(
        &self,
        emails: Vec<String>,
        reason: Option<String>,
    ) -> CampaignResult<AddSuppressionsReport>;

    async fn list(&self, query: SuppressionQuery) -> CampaignResult<SuppressionPage>;

    async fn delete_by_id(&self, id: Uuid) -> CampaignResult<bool>;

    async fn delete_by_email(&self, email: &str) -> CampaignResult<bool>;
}

/// Persistence for the sending identity.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// The current settings row, if configured.
    async fn get(&self) -> CampaignResult<Option<SenderSettings>>;

    /// Create or update the settings row. `api_key` must already be
    /// encrypted by the caller.
    async fn save(
        &self,
        api_key: String,
        from_email: String,
        from_name: String,
    ) -> CampaignResult<SenderSettings>;
}

/// Read access to the append-only history log. Rows are written only by the
/// job repository's finalize and cancel paths.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    async fn list(&self, query: HistoryQuery) -> CampaignResult<HistoryPage>;
}
