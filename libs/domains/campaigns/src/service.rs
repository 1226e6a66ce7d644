//! Business logic for campaign intake, lifecycle, settings, suppressions,
//! and history.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::{Validate, ValidateEmail};

use crate::error::{CampaignError, CampaignResult};
use crate::models::{
    AddSuppressions, AddSuppressionsReport, CreateJob, CreateJobReceipt, HistoryPage,
    HistoryQuery, Job, JobAction, JobDetail, JobList, JobStatus, NewJob, NewRecipient,
    SaveSettings, SettingsView, SuppressionPage, SuppressionQuery, TestSend,
};
use crate::repository::{
    HistoryRepository, JobRepository, SettingsRepository, SuppressionRepository,
};
use crate::transport::{BatchMailer, OutboundEmail};
use crate::vault::CredentialVault;

/// Jobs returned by the listing endpoint.
const JOB_LIST_LIMIT: u64 = 20;

/// Maximum page size for suppression and history listings.
const MAX_PAGE_LIMIT: u64 = 100;

/// Service layer for job intake, lifecycle, and queries.
#[derive(Clone)]
pub struct JobService<J, S>
where
    J: JobRepository,
    S: SuppressionRepository,
{
    jobs: Arc<J>,
    suppressions: Arc<S>,
}

impl<J, S> JobService<J, S>
where
    J: JobRepository,
    S: SuppressionRepository,
{
    pub fn new(jobs: Arc<J>, suppressions: Arc<S>) -> Self {
        Self { jobs, suppressions }
    }

    /// Intake: validate, filter against the suppression list, partition into
    /// batches, and persist the job with its recipient ledger.
    ///
    /// Suppression is consulted only here; later suppression changes do not
    /// affect jobs that already exist.
    pub async fn create_job(&self, input: CreateJob) -> CampaignResult<CreateJobReceipt> {
        input
            .validate()
            .map_err(|e| CampaignError::Validation(e.to_string()))?;

        if input.subject.trim().is_empty() || input.html_content.trim().is_empty() {
            return Err(CampaignError::Validation(
                "subject and HTML content are required".to_string(),
            ));
        }

        let suppressed = self.suppressions.all_emails().await?;

        let total_input = input.recipients.len();
        let kept: Vec<_> = input
            .recipients
            .into_iter()
            .filter(|r| !suppressed.contains(&r.email.to_lowercase()))
            .collect();
        let skipped = total_input - kept.len();

        if kept.is_empty() {
            return Err(CampaignError::Validation(
                "all recipients are suppressed; no emails to send".to_string(),
            ));
        }

        let batch_size = input.batch_size as usize;
        let total_batches = kept.len().div_ceil(batch_size) as i32;

        // Batch assignment is fixed at intake, in original order: the order
        // decides who is contacted first.
        let recipients: Vec<NewRecipient> = kept
            .into_iter()
            .enumerate()
            .map(|(index, r)| NewRecipient {
                email: r.email,
                name: r.name.filter(|n| !n.trim().is_empty()),
                batch_number: (index / batch_size) as i32,
            })
            .collect();

        let delay_ms = input.delay_between_batches_ms as i64;
        let job = self
            .jobs
            .create_job(
                NewJob {
                    subject: input.subject,
                    html_content: input.html_content,
                    total_recipients: total_input as i32,
                    skipped_count: skipped as i32,
                    total_batches,
                    batch_size: input.batch_size as i32,
                    delay_between_batches_ms: delay_ms,
                },
                recipients,
            )
            .await?;

        Ok(CreateJobReceipt {
            job_id: job.id,
            total_recipients: job.total_recipients,
            total_batches,
            estimated_time_minutes: estimated_minutes(total_batches, delay_ms),
        })
    }

    /// A job with its per-status recipient counts. The intake-suppressed
    /// count folds in from the job row so the counts always sum to
    /// `total_recipients`.
    pub async fn get_job(&self, id: Uuid) -> CampaignResult<JobDetail> {
        let job = self.require_job(id).await?;

        let mut stats = self.jobs.recipient_counts(id).await?;
        stats.skipped += job.skipped_count as i64;

        Ok(JobDetail { job, stats })
    }

    /// Most recent jobs plus the single active (pending or processing) one.
    pub async fn list_jobs(&self) -> CampaignResult<JobList> {
        let jobs = self.jobs.list_jobs(JOB_LIST_LIMIT).await?;
        let active_job = jobs.iter().find(|j| j.status.is_active()).cloned();

        Ok(JobList { jobs, active_job })
    }

    /// Apply a lifecycle action. Invalid transitions are rejected without
    /// mutating the job.
    pub async fn update_status(&self, id: Uuid, action: JobAction) -> CampaignResult<Job> {
        let job = self.require_job(id).await?;

        // Reject illegal transitions up front with a precise message; the
        // repository re-checks under a guard to close the race.
        job.status.apply(action)?;

        let updated = match action {
            JobAction::Start => {
                self.jobs
                    .transition(id, JobStatus::Pending, JobStatus::Processing, true)
                    .await?
            }
            JobAction::Pause => {
                self.jobs
                    .transition(id, JobStatus::Processing, JobStatus::Paused, false)
                    .await?
            }
            JobAction::Resume => {
                self.jobs
                    .transition(id, JobStatus::Paused, JobStatus::Processing, false)
                    .await?
            }
            JobAction::Cancel => self.jobs.cancel(id).await?,
        };

        info!(job_id = %id, action = %action, status = %updated.status, "Applied job action");
        Ok(updated)
    }

    /// Delete a job; rejected while it is processing.
    pub async fn delete_job(&self, id: Uuid) -> CampaignResult<()> {
        let job = self.require_job(id).await?;

        if job.status == JobStatus::Processing {
            return Err(CampaignError::StateConflict(
                "cannot delete a processing job; pause it first".to_string(),
            ));
        }

        if !self.jobs.delete_job(id).await? {
            return Err(CampaignError::NotFound(format!("job {} not found", id)));
        }

        Ok(())
    }

    async fn require_job(&self, id: Uuid) -> CampaignResult<Job> {
        self.jobs
            .get_job(id)
            .await?
            .ok_or_else(|| CampaignError::NotFound(format!("job {} not found", id)))
    }
}

/// Caller-facing sending estimate: batches times the advisory delay.
fn estimated_minutes(total_batches: i32, delay_ms: i64) -> i64 {
    let total_ms = total_batches as i64 * delay_ms;
    let mut minutes = total_ms / 60_000;
    if total_ms % 60_000 > 0 {
        minutes += 1;
    }
    minutes
}

/// Service layer for the sending identity.
#[derive(Clone)]
pub struct SettingsService<S, M>
where
    S: SettingsRepository,
    M: BatchMailer,
{
    settings: Arc<S>,
    mailer: Arc<M>,
    vault: CredentialVault,
}

impl<S, M> SettingsService<S, M>
where
    S: SettingsRepository,
    M: BatchMailer,
{
    pub fn new(settings: Arc<S>, mailer: Arc<M>, vault: CredentialVault) -> Self {
        Self {
            settings,
            mailer,
            vault,
        }
    }

    /// Save settings, encrypting the API key at rest. An already-encrypted
    /// key (a re-save of the stored value) is kept as-is; encrypting it
    /// again would make it unrecoverable.
    pub async fn save(&self, input: SaveSettings) -> CampaignResult<Uuid> {
        input
            .validate()
            .map_err(|e| CampaignError::Validation(e.to_string()))?;

        let api_key = if CredentialVault::is_encrypted(&input.api_key) {
            input.api_key
        } else {
            if !input.api_key.starts_with("re_") {
                return Err(CampaignError::Validation(
                    "invalid API key format (must start with \"re_\")".to_string(),
                ));
            }
            self.vault.encrypt(&input.api_key)?
        };

        let saved = self
            .settings
            .save(api_key, input.from_email, input.from_name)
            .await?;

        Ok(saved.id)
    }

    /// Settings for display. The key is decrypted only to produce the mask
    /// and never leaves the process.
    pub async fn view(&self) -> CampaignResult<SettingsView> {
        let Some(settings) = self.settings.get().await? else {
            return Ok(SettingsView::empty());
        };

        let masked = match self.vault.decrypt(&settings.api_key) {
            Ok(key) => mask_api_key(&key),
            Err(_) => "***".to_string(),
        };

        Ok(SettingsView {
            id: Some(settings.id),
            api_key: Some(masked),
            from_email: Some(settings.from_email),
            from_name: Some(settings.from_name),
            updated_at: Some(settings.updated_at),
        })
    }

    /// Verify the stored credential by sending one test message.
    pub async fn test_send(&self, input: TestSend) -> CampaignResult<()> {
        input
            .validate()
            .map_err(|e| CampaignError::Validation(e.to_string()))?;

        let settings = self.settings.get().await?.ok_or_else(|| {
            CampaignError::Validation("no settings found; configure settings first".to_string())
        })?;

        let api_key = self.vault.decrypt(&settings.api_key)?;

        let email = OutboundEmail {
            from: format!("{} <{}>", settings.from_name, settings.from_email),
            to: input.test_email,
            subject: "Relay test email".to_string(),
            html: "<p>Your sender settings are working.</p>".to_string(),
        };

        self.mailer.send_single(&api_key, &email).await?;

        info!(to = %email.to, provider = self.mailer.name(), "Test email sent");
        Ok(())
    }
}

/// Mask an API key for display: first 7 and last 4 characters.
fn mask_api_key(api_key: &str) -> String {
    if api_key.len() < 15 {
        return "***".to_string();
    }
    format!("{}...{}", &api_key[..7], &api_key[api_key.len() - 4..])
}

/// Service layer for the do-not-contact list.
#[derive(Clone)]
pub struct SuppressionService<S>
where
    S: SuppressionRepository,
{
    suppressions: Arc<S>,
}

impl<S> SuppressionService<S>
where
    S: SuppressionRepository,
{
    pub fn new(suppressions: Arc<S>) -> Self {
        Self { suppressions }
    }

    /// Add one email or a bulk list. Addresses are lowercased, trimmed, and
    /// deduplicated before insertion; existing entries are reported back as
    /// duplicates.
    pub async fn add(&self, input: AddSuppressions) -> CampaignResult<AddSuppressionsReport> {
        let raw: Vec<String> = match (input.email, input.emails) {
            (Some(email), _) => vec![email],
            (None, Some(emails)) if !emails.is_empty() => emails,
            _ => {
                return Err(CampaignError::Validation(
                    "either email or emails array is required".to_string(),
                ))
            }
        };

        let mut seen = std::collections::HashSet::new();
        let emails: Vec<String> = raw
            .into_iter()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| seen.insert(e.clone()))
            .collect();

        let invalid: Vec<&String> = emails.iter().filter(|e| !e.validate_email()).collect();
        if !invalid.is_empty() {
            return Err(CampaignError::Validation(format!(
                "invalid email format: {}",
                invalid
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        self.suppressions.add(emails, input.reason).await
    }

    pub async fn list(&self, query: SuppressionQuery) -> CampaignResult<SuppressionPage> {
        validate_pagination(query.page, query.limit)?;
        self.suppressions.list(query).await
    }

    /// Remove a suppression by id or by email.
    pub async fn remove(&self, id: Option<Uuid>, email: Option<String>) -> CampaignResult<()> {
        let deleted = match (id, email) {
            (Some(id), _) => self.suppressions.delete_by_id(id).await?,
            (None, Some(email)) => self.suppressions.delete_by_email(email.trim()).await?,
            (None, None) => {
                return Err(CampaignError::Validation(
                    "either id or email is required".to_string(),
                ))
            }
        };

        if !deleted {
            return Err(CampaignError::NotFound(
                "suppression entry not found".to_string(),
            ));
        }

        Ok(())
    }
}

/// Service layer for the history log.
#[derive(Clone)]
pub struct HistoryService<H>
where
    H: HistoryRepository,
{
    history: Arc<H>,
}

impl<H> HistoryService<H>
where
    H: HistoryRepository,
{
    pub fn new(history: Arc<H>) -> Self {
        Self { history }
    }

    pub async fn list(&self, query: HistoryQuery) -> CampaignResult<HistoryPage> {
        validate_pagination(query.page, query.limit)?;
        self.history.list(query).await
    }
}

fn validate_pagination(page: u64, limit: u64) -> CampaignResult<()> {
    if page < 1 || limit < 1 || limit > MAX_PAGE_LIMIT {
        return Err(CampaignError::Validation(
            "invalid pagination parameters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RecipientCounts, RecipientInput, SenderSettings};
    use crate::repository::{
        MockHistoryRepository, MockJobRepository, MockSettingsRepository,
        MockSuppressionRepository,
    };
    use crate::transport::MockBatchMailer;
    use chrono::Utc;
    use mockall::predicate::eq;
    use std::collections::HashSet;

    const VAULT_SECRET: &str = "unit-test-secret-0123456789abcdef";

    fn sample_job(status: JobStatus) -> Job {
        Job {
            id: Uuid::now_v7(),
            subject: "Hello {{name}}".to_string(),
            html_content: "<p>Hi {{name}}</p>".to_string(),
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

    fn create_input(emails: &[&str]) -> CreateJob {
        CreateJob {
            recipients: emails
                .iter()
                .map(|e| RecipientInput {
                    email: e.to_string(),
                    name: None,
                })
                .collect(),
            subject: "Hello".to_string(),
            html_content: "<p>Hi</p>".to_string(),
            batch_size: 2,
            delay_between_batches_ms: 10_000,
        }
    }

    fn job_service(
        jobs: MockJobRepository,
        suppressions: MockSuppressionRepository,
    ) -> JobService<MockJobRepository, MockSuppressionRepository> {
        JobService::new(Arc::new(jobs), Arc::new(suppressions))
    }

    #[tokio::test]
    async fn test_create_job_partitions_batches_in_order() {
        let mut jobs = MockJobRepository::new();
        let mut suppressions = MockSuppressionRepository::new();

        suppressions
            .expect_all_emails()
            .returning(|| Ok(HashSet::new()));

        jobs.expect_create_job()
            .withf(|job, recipients| {
                let batches: Vec<i32> = recipients.iter().map(|r| r.batch_number).collect();
                job.total_batches == 3
                    && job.total_recipients == 5
                    && job.skipped_count == 0
                    && batches == vec![0, 0, 1, 1, 2]
                    && recipients[0].email == "a@example.com"
                    && recipients[4].email == "e@example.com"
            })
            .returning(|job, _| {
                let mut created = sample_job(JobStatus::Pending);
                created.total_recipients = job.total_recipients;
                created.total_batches = job.total_batches;
                Ok(created)
            });

        let service = job_service(jobs, suppressions);
        let receipt = service
            .create_job(create_input(&[
                "a@example.com",
                "b@example.com",
                "c@example.com",
                "d@example.com",
                "e@example.com",
            ]))
            .await
            .unwrap();

        assert_eq!(receipt.total_recipients, 5);
        assert_eq!(receipt.total_batches, 3);
        // 3 batches * 10s, rounded up to the next minute
        assert_eq!(receipt.estimated_time_minutes, 1);
    }

    #[tokio::test]
    async fn test_create_job_filters_suppressed_case_insensitively() {
        let mut jobs = MockJobRepository::new();
        let mut suppressions = MockSuppressionRepository::new();

        suppressions
            .expect_all_emails()
            .returning(|| Ok(HashSet::from(["b@example.com".to_string()])));

        jobs.expect_create_job()
            .withf(|job, recipients| {
                job.skipped_count == 1
                    && job.total_recipients == 3
                    && recipients.len() == 2
                    && recipients.iter().all(|r| r.email != "B@Example.COM")
            })
            .returning(|_, _| Ok(sample_job(JobStatus::Pending)));

        let service = job_service(jobs, suppressions);
        service
            .create_job(create_input(&[
                "a@example.com",
                "B@Example.COM",
                "c@example.com",
            ]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_job_rejects_all_suppressed() {
        let jobs = MockJobRepository::new();
        let mut suppressions = MockSuppressionRepository::new();

        suppressions
            .expect_all_emails()
            .returning(|| Ok(HashSet::from(["a@example.com".to_string()])));

        let service = job_service(jobs, suppressions);
        let err = service
            .create_job(create_input(&["a@example.com"]))
            .await
            .unwrap_err();

        assert!(matches!(err, CampaignError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_job_rejects_blank_subject() {
        let jobs = MockJobRepository::new();
        let suppressions = MockSuppressionRepository::new();

        let mut input = create_input(&["a@example.com"]);
        input.subject = "   ".to_string();

        let service = job_service(jobs, suppressions);
        let err = service.create_job(input).await.unwrap_err();

        assert!(matches!(err, CampaignError::Validation(_)));
    }

    #[tokio::test]
    async fn test_start_non_pending_job_is_conflict() {
        let mut jobs = MockJobRepository::new();
        let suppressions = MockSuppressionRepository::new();

        let job = sample_job(JobStatus::Processing);
        let id = job.id;
        jobs.expect_get_job()
            .with(eq(id))
            .returning(move |_| Ok(Some(job.clone())));
        // No transition expected: the action must not reach the repository

        let service = job_service(jobs, suppressions);
        let err = service.update_status(id, JobAction::Start).await.unwrap_err();

        assert!(matches!(err, CampaignError::StateConflict(_)));
    }

    #[tokio::test]
    async fn test_start_pending_job_transitions() {
        let mut jobs = MockJobRepository::new();
        let suppressions = MockSuppressionRepository::new();

        let job = sample_job(JobStatus::Pending);
        let id = job.id;
        jobs.expect_get_job()
            .with(eq(id))
            .returning(move |_| Ok(Some(job.clone())));
        jobs.expect_transition()
            .with(
                eq(id),
                eq(JobStatus::Pending),
                eq(JobStatus::Processing),
                eq(true),
            )
            .returning(|id, _, _, _| {
                let mut job = sample_job(JobStatus::Processing);
                job.id = id;
                job.started_at = Some(Utc::now());
                Ok(job)
            });

        let service = job_service(jobs, suppressions);
        let updated = service.update_status(id, JobAction::Start).await.unwrap();

        assert_eq!(updated.status, JobStatus::Processing);
        assert!(updated.started_at.is_some());
    }

    #[tokio::test]
    async fn test_delete_processing_job_is_conflict() {
        let mut jobs = MockJobRepository::new();
        let suppressions = MockSuppressionRepository::new();

        let job = sample_job(JobStatus::Processing);
        let id = job.id;
        jobs.expect_get_job()
            .with(eq(id))
            .returning(move |_| Ok(Some(job.clone())));

        let service = job_service(jobs, suppressions);
        let err = service.delete_job(id).await.unwrap_err();

        assert!(matches!(err, CampaignError::StateConflict(_)));
    }

    #[tokio::test]
    async fn test_get_job_folds_in_skipped_count() {
        let mut jobs = MockJobRepository::new();
        let suppressions = MockSuppressionRepository::new();

        let mut job = sample_job(JobStatus::Processing);
        job.total_recipients = 10;
        job.skipped_count = 3;
        let id = job.id;

        jobs.expect_get_job()
            .with(eq(id))
            .returning(move |_| Ok(Some(job.clone())));
        jobs.expect_recipient_counts().with(eq(id)).returning(|_| {
            Ok(RecipientCounts {
                pending: 3,
                sent: 4,
                failed: 0,
                skipped: 0,
            })
        });

        let service = job_service(jobs, suppressions);
        let detail = service.get_job(id).await.unwrap();

        assert_eq!(detail.stats.skipped, 3);
        // Invariant: sent + failed + pending + skipped == total_recipients
        assert_eq!(
            detail.stats.sent + detail.stats.failed + detail.stats.pending + detail.stats.skipped,
            detail.job.total_recipients as i64
        );
    }

    #[tokio::test]
    async fn test_list_jobs_picks_active() {
        let mut jobs = MockJobRepository::new();
        let suppressions = MockSuppressionRepository::new();

        jobs.expect_list_jobs().returning(|_| {
            Ok(vec![
                sample_job(JobStatus::Completed),
                sample_job(JobStatus::Processing),
                sample_job(JobStatus::Failed),
            ])
        });

        let service = job_service(jobs, suppressions);
        let list = service.list_jobs().await.unwrap();

        assert_eq!(list.jobs.len(), 3);
        assert_eq!(list.active_job.unwrap().status, JobStatus::Processing);
    }

    #[tokio::test]
    async fn test_settings_save_encrypts_plaintext_key() {
        let mut settings = MockSettingsRepository::new();
        let vault = CredentialVault::new(VAULT_SECRET).unwrap();
        let check = vault.clone();

        settings
            .expect_save()
            .withf(move |key, _, _| {
                CredentialVault::is_encrypted(key)
                    && check.decrypt(key).unwrap() == "re_live_key_12345"
            })
            .returning(|api_key, from_email, from_name| {
                Ok(SenderSettings {
                    id: Uuid::now_v7(),
                    api_key,
                    from_email,
                    from_name,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                })
            });

        let service = SettingsService::new(
            Arc::new(settings),
            Arc::new(MockBatchMailer::new()),
            vault,
        );

        service
            .save(SaveSettings {
                api_key: "re_live_key_12345".to_string(),
                from_email: "noreply@example.com".to_string(),
                from_name: "Relay".to_string(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_settings_save_is_idempotent_for_encrypted_key() {
        let vault = CredentialVault::new(VAULT_SECRET).unwrap();
        let encrypted = vault.encrypt("re_live_key_12345").unwrap();

        let mut settings = MockSettingsRepository::new();
        let expected = encrypted.clone();
        settings
            .expect_save()
            .withf(move |key, _, _| *key == expected)
            .returning(|api_key, from_email, from_name| {
                Ok(SenderSettings {
                    id: Uuid::now_v7(),
                    api_key,
                    from_email,
                    from_name,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                })
            });

        let service = SettingsService::new(
            Arc::new(settings),
            Arc::new(MockBatchMailer::new()),
            vault.clone(),
        );

        // Re-saving the already-encrypted value stores it byte-for-byte:
        // no double encryption, and the original still decrypts.
        service
            .save(SaveSettings {
                api_key: encrypted.clone(),
                from_email: "noreply@example.com".to_string(),
                from_name: "Relay".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(vault.decrypt(&encrypted).unwrap(), "re_live_key_12345");
    }

    #[tokio::test]
    async fn test_settings_save_rejects_malformed_plaintext_key() {
        let settings = MockSettingsRepository::new();
        let service = SettingsService::new(
            Arc::new(settings),
            Arc::new(MockBatchMailer::new()),
            CredentialVault::new(VAULT_SECRET).unwrap(),
        );

        let err = service
            .save(SaveSettings {
                api_key: "sk_wrong_prefix".to_string(),
                from_email: "noreply@example.com".to_string(),
                from_name: "Relay".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, CampaignError::Validation(_)));
    }

    #[tokio::test]
    async fn test_settings_view_masks_key() {
        let vault = CredentialVault::new(VAULT_SECRET).unwrap();
        let encrypted = vault.encrypt("re_live_key_12345").unwrap();

        let mut settings = MockSettingsRepository::new();
        settings.expect_get().returning(move || {
            Ok(Some(SenderSettings {
                id: Uuid::now_v7(),
                api_key: encrypted.clone(),
                from_email: "noreply@example.com".to_string(),
                from_name: "Relay".to_string(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            }))
        });

        let service =
            SettingsService::new(Arc::new(settings), Arc::new(MockBatchMailer::new()), vault);

        let view = service.view().await.unwrap();
        assert_eq!(view.api_key.as_deref(), Some("re_live...2345"));
    }

    #[tokio::test]
    async fn test_suppression_add_normalizes_and_dedupes() {
        let mut suppressions = MockSuppressionRepository::new();

        suppressions
            .expect_add()
            .withf(|emails, reason| {
                emails == &["a@example.com".to_string(), "b@example.com".to_string()]
                    && reason.as_deref() == Some("bounced")
            })
            .returning(|emails, _| {
                Ok(AddSuppressionsReport {
                    added: emails.len(),
                    skipped: 0,
                    duplicates: Vec::new(),
                })
            });

        let service = SuppressionService::new(Arc::new(suppressions));
        let report = service
            .add(AddSuppressions {
                email: None,
                emails: Some(vec![
                    " A@Example.com ".to_string(),
                    "b@example.com".to_string(),
                    "a@example.com".to_string(),
                ]),
                reason: Some("bounced".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(report.added, 2);
    }

    #[tokio::test]
    async fn test_suppression_add_rejects_invalid_email() {
        let service = SuppressionService::new(Arc::new(MockSuppressionRepository::new()));

        let err = service
            .add(AddSuppressions {
                email: Some("not-an-email".to_string()),
                emails: None,
                reason: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, CampaignError::Validation(_)));
    }

    #[tokio::test]
    async fn test_suppression_add_requires_input() {
        let service = SuppressionService::new(Arc::new(MockSuppressionRepository::new()));

        let err = service.add(AddSuppressions::default()).await.unwrap_err();
        assert!(matches!(err, CampaignError::Validation(_)));
    }

    #[tokio::test]
    async fn test_history_list_rejects_oversized_page() {
        let service = HistoryService::new(Arc::new(MockHistoryRepository::new()));

        let err = service
            .list(HistoryQuery {
                page: 1,
                limit: 500,
                status: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, CampaignError::Validation(_)));
    }

    #[test]
    fn test_estimated_minutes_rounds_up() {
        assert_eq!(estimated_minutes(3, 10_000), 1);
        assert_eq!(estimated_minutes(12, 10_000), 2);
        assert_eq!(estimated_minutes(6, 10_000), 1);
        assert_eq!(estimated_minutes(7, 10_000), 2);
    }

    #[test]
    fn test_mask_api_key() {
        assert_eq!(mask_api_key("re_live_key_12345"), "re_live...2345");
        assert_eq!(mask_api_key("short"), "***");
    }
}
