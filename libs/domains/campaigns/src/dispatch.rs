//! The dispatch driver: advances a processing job by exactly one batch.
//!
//! Progression is pull-driven. There is no background worker; an external
//! caller invokes [`DispatchDriver::advance`] repeatedly and is expected to
//! wait `next_batch_in` milliseconds between calls. That advisory delay is
//! the engine's only rate limiting toward the mail transport.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{CampaignError, CampaignResult};
use crate::models::{BatchReport, JobStatus};
use crate::placeholder;
use crate::repository::{BatchOutcome, JobRepository, SettingsRepository};
use crate::transport::{BatchMailer, OutboundEmail};
use crate::vault::CredentialVault;

/// Lifetime of the per-job dispatch lease. Long enough to cover one
/// transport call with headroom; short enough that a crashed advance frees
/// the job quickly.
pub const DISPATCH_LEASE_SECS: i64 = 60;

/// Orchestrates one advance step: select the next pending batch, render
/// content, submit it to the mail transport, and commit the outcome.
#[derive(Clone)]
pub struct DispatchDriver<J, S, M>
where
    J: JobRepository,
    S: SettingsRepository,
    M: BatchMailer,
{
    jobs: Arc<J>,
    settings: Arc<S>,
    mailer: Arc<M>,
    vault: CredentialVault,
}

impl<J, S, M> DispatchDriver<J, S, M>
where
    J: JobRepository,
    S: SettingsRepository,
    M: BatchMailer,
{
    pub fn new(jobs: Arc<J>, settings: Arc<S>, mailer: Arc<M>, vault: CredentialVault) -> Self {
        Self {
            jobs,
            settings,
            mailer,
            vault,
        }
    }

    /// Advance a job by one batch.
    ///
    /// Preconditions: the job exists and is `processing`. A decrypt failure
    /// aborts the step with a `Credential` error and leaves the job
    /// `processing`, so a later advance retries once credentials are fixed.
    /// A transport failure does NOT fail the step: the batch is marked
    /// failed and the job moves on.
    pub async fn advance(&self, job_id: Uuid) -> CampaignResult<BatchReport> {
        let job = self
            .jobs
            .get_job(job_id)
            .await?
            .ok_or_else(|| CampaignError::NotFound(format!("job {} not found", job_id)))?;

        if job.status != JobStatus::Processing {
            return Err(CampaignError::StateConflict(format!(
                "job is {}, not processing",
                job.status
            )));
        }

        let settings = self.settings.get().await?.ok_or_else(|| {
            CampaignError::Credential("sender settings are not configured".to_string())
        })?;

        let api_key = self
            .vault
            .decrypt(&settings.api_key)
            .map_err(|_| CampaignError::Credential("failed to decrypt API key".to_string()))?;

        // Guard against overlapping advances: from here until the commit (or
        // finalize) at most one invocation may act on this job.
        let lease = self.jobs.acquire_lease(job_id, DISPATCH_LEASE_SECS).await?;

        let batch = match self.jobs.next_pending_batch(job_id, job.batch_size).await {
            Ok(batch) => batch,
            Err(e) => {
                // Nothing committed; free the job for the next advance
                let _ = self.jobs.release_lease(job_id, lease).await;
                return Err(e);
            }
        };

        // No pending recipients left: the only path to `completed`
        if batch.is_empty() {
            let finished = self.jobs.finalize(job_id, lease).await?;

            info!(
                job_id = %job_id,
                sent = finished.sent_count,
                failed = finished.failed_count,
                "Job finalized"
            );
            return Ok(BatchReport {
                batch_number: finished.current_batch,
                sent: 0,
                failed: 0,
                job_completed: true,
                next_batch_in: None,
            });
        }

        let batch_number = batch[0].batch_number;
        let from = format!("{} <{}>", settings.from_name, settings.from_email);
        let emails: Vec<OutboundEmail> = batch
            .iter()
            .map(|r| OutboundEmail {
                from: from.clone(),
                to: r.email.clone(),
                subject: placeholder::render(&job.subject, &r.email, r.name.as_deref()),
                html: placeholder::render(&job.html_content, &r.email, r.name.as_deref()),
            })
            .collect();

        // One call for the whole batch; the transport reports a single
        // outcome, so the batch succeeds or fails as a unit.
        let outcome = match self.mailer.send_batch(&api_key, &emails).await {
            Ok(()) => BatchOutcome::Sent,
            Err(e) => {
                warn!(
                    job_id = %job_id,
                    batch = batch_number,
                    provider = self.mailer.name(),
                    error = %e,
                    "Batch send failed; marking batch failed and continuing"
                );
                BatchOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };

        let (sent, failed) = match &outcome {
            BatchOutcome::Sent => (batch.len() as i32, 0),
            BatchOutcome::Failed { .. } => (0, batch.len() as i32),
        };

        let recipient_ids = batch.iter().map(|r| r.id).collect();
        self.jobs
            .commit_batch(job_id, lease, batch_number, recipient_ids, outcome)
            .await?;

        let remaining = self.jobs.count_pending(job_id).await?;

        info!(
            job_id = %job_id,
            batch = batch_number,
            sent,
            failed,
            remaining,
            "Advanced job by one batch"
        );

        Ok(BatchReport {
            batch_number,
            sent,
            failed,
            job_completed: remaining == 0,
            next_batch_in: (remaining > 0).then_some(job.delay_between_batches_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Job, Recipient, RecipientStatus, SenderSettings};
    use crate::repository::{DispatchLease, MockJobRepository, MockSettingsRepository};
    use crate::transport::MockBatchMailer;
    use chrono::Utc;
    use mockall::predicate::{always, eq};

    const VAULT_SECRET: &str = "unit-test-secret-0123456789abcdef";

    fn vault() -> CredentialVault {
        CredentialVault::new(VAULT_SECRET).unwrap()
    }

    fn processing_job(id: Uuid) -> Job {
        Job {
            id,
            subject: "Hello {{name}}".to_string(),
            html_content: "<p>Hi {{name}}, this is for {{email}}</p>".to_string(),
            total_recipients: 4,
            sent_count: 2,
            failed_count: 0,
            skipped_count: 0,
            status: JobStatus::Processing,
            current_batch: 1,
            total_batches: 2,
            batch_size: 2,
            delay_between_batches_ms: 10_000,
            error_log: Vec::new(),
            started_at: Some(Utc::now()),
            completed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn recipient(job_id: Uuid, email: &str, batch: i32) -> Recipient {
        Recipient {
            id: Uuid::now_v7(),
            job_id,
            email: email.to_string(),
            name: None,
            batch_number: batch,
            status: RecipientStatus::Pending,
            error_message: None,
            sent_at: None,
            created_at: Utc::now(),
        }
    }

    fn settings_repo() -> MockSettingsRepository {
        let encrypted = vault().encrypt("re_live_key_12345").unwrap();
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
        settings
    }

    fn lease() -> DispatchLease {
        DispatchLease {
            token: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn test_advance_sends_batch_and_reports_delay() {
        let job_id = Uuid::now_v7();
        let job = processing_job(job_id);

        let mut jobs = MockJobRepository::new();
        jobs.expect_get_job()
            .with(eq(job_id))
            .returning(move |_| Ok(Some(job.clone())));
        jobs.expect_acquire_lease()
            .with(eq(job_id), eq(DISPATCH_LEASE_SECS))
            .returning(|_, _| Ok(lease()));
        jobs.expect_next_pending_batch()
            .with(eq(job_id), eq(2))
            .returning(move |id, _| {
                Ok(vec![recipient(id, "c@example.com", 1), recipient(id, "d@example.com", 1)])
            });
        jobs.expect_commit_batch()
            .withf(|_, _, batch_number, ids, outcome| {
                *batch_number == 1 && ids.len() == 2 && *outcome == BatchOutcome::Sent
            })
            .returning(|id, _, _, _, _| Ok(processing_job(id)));
        jobs.expect_count_pending()
            .with(eq(job_id))
            .returning(|_| Ok(0));

        let mut mailer = MockBatchMailer::new();
        mailer
            .expect_send_batch()
            .withf(|key, emails| {
                key == "re_live_key_12345"
                    && emails.len() == 2
                    // Placeholders rendered per recipient, name falling back
                    // to the email local part
                    && emails[0].subject == "Hello c"
                    && emails[0].html.contains("c@example.com")
                    && emails[0].from == "Relay <noreply@example.com>"
            })
            .returning(|_, _| Ok(()));

        let driver = DispatchDriver::new(
            Arc::new(jobs),
            Arc::new(settings_repo()),
            Arc::new(mailer),
            vault(),
        );

        let report = driver.advance(job_id).await.unwrap();
        assert_eq!(report.batch_number, 1);
        assert_eq!(report.sent, 2);
        assert_eq!(report.failed, 0);
        assert!(report.job_completed);
        assert_eq!(report.next_batch_in, None);
    }

    #[tokio::test]
    async fn test_advance_reports_next_delay_when_batches_remain() {
        let job_id = Uuid::now_v7();
        let job = processing_job(job_id);

        let mut jobs = MockJobRepository::new();
        jobs.expect_get_job()
            .returning(move |_| Ok(Some(job.clone())));
        jobs.expect_acquire_lease().returning(|_, _| Ok(lease()));
        jobs.expect_next_pending_batch()
            .returning(move |id, _| Ok(vec![recipient(id, "c@example.com", 1)]));
        jobs.expect_commit_batch()
            .returning(|id, _, _, _, _| Ok(processing_job(id)));
        jobs.expect_count_pending().returning(|_| Ok(2));

        let mut mailer = MockBatchMailer::new();
        mailer.expect_send_batch().returning(|_, _| Ok(()));

        let driver = DispatchDriver::new(
            Arc::new(jobs),
            Arc::new(settings_repo()),
            Arc::new(mailer),
            vault(),
        );

        let report = driver.advance(job_id).await.unwrap();
        assert!(!report.job_completed);
        assert_eq!(report.next_batch_in, Some(10_000));
    }

    #[tokio::test]
    async fn test_advance_marks_whole_batch_failed_on_transport_error() {
        let job_id = Uuid::now_v7();
        let job = processing_job(job_id);

        let mut jobs = MockJobRepository::new();
        jobs.expect_get_job()
            .returning(move |_| Ok(Some(job.clone())));
        jobs.expect_acquire_lease().returning(|_, _| Ok(lease()));
        jobs.expect_next_pending_batch()
            .returning(move |id, _| {
                Ok(vec![recipient(id, "c@example.com", 1), recipient(id, "d@example.com", 1)])
            });
        jobs.expect_commit_batch()
            .withf(|_, _, batch_number, ids, outcome| {
                *batch_number == 1
                    && ids.len() == 2
                    && matches!(outcome, BatchOutcome::Failed { error } if error.contains("rate limited"))
            })
            .returning(|id, _, _, _, _| Ok(processing_job(id)));
        jobs.expect_count_pending().returning(|_| Ok(0));

        let mut mailer = MockBatchMailer::new();
        mailer
            .expect_send_batch()
            .returning(|_, _| Err(CampaignError::Transport("rate limited".to_string())));
        mailer.expect_name().return_const("resend");

        let driver = DispatchDriver::new(
            Arc::new(jobs),
            Arc::new(settings_repo()),
            Arc::new(mailer),
            vault(),
        );

        // A transport failure is absorbed: the step succeeds, the batch is
        // recorded failed, and later batches stay pending.
        let report = driver.advance(job_id).await.unwrap();
        assert_eq!(report.sent, 0);
        assert_eq!(report.failed, 2);
    }

    #[tokio::test]
    async fn test_advance_finalizes_when_drained() {
        let job_id = Uuid::now_v7();
        let job = processing_job(job_id);

        let mut jobs = MockJobRepository::new();
        jobs.expect_get_job()
            .returning(move |_| Ok(Some(job.clone())));
        jobs.expect_acquire_lease().returning(|_, _| Ok(lease()));
        jobs.expect_next_pending_batch()
            .returning(|_, _| Ok(Vec::new()));
        jobs.expect_finalize()
            .with(eq(job_id), always())
            .returning(|id, _| {
                let mut job = processing_job(id);
                job.status = JobStatus::Completed;
                job.current_batch = 2;
                job.completed_at = Some(Utc::now());
                Ok(job)
            });

        let driver = DispatchDriver::new(
            Arc::new(jobs),
            Arc::new(settings_repo()),
            Arc::new(MockBatchMailer::new()),
            vault(),
        );

        let report = driver.advance(job_id).await.unwrap();
        assert!(report.job_completed);
        assert_eq!(report.sent, 0);
        assert_eq!(report.next_batch_in, None);
    }

    #[tokio::test]
    async fn test_advance_requires_processing_status() {
        let job_id = Uuid::now_v7();
        let mut job = processing_job(job_id);
        job.status = JobStatus::Paused;

        let mut jobs = MockJobRepository::new();
        jobs.expect_get_job()
            .returning(move |_| Ok(Some(job.clone())));
        // Neither the settings nor the lease may be touched

        let driver = DispatchDriver::new(
            Arc::new(jobs),
            Arc::new(MockSettingsRepository::new()),
            Arc::new(MockBatchMailer::new()),
            vault(),
        );

        let err = driver.advance(job_id).await.unwrap_err();
        assert!(matches!(err, CampaignError::StateConflict(_)));
        assert!(err.to_string().contains("paused"));
    }

    #[tokio::test]
    async fn test_advance_decrypt_failure_is_credential_error() {
        let job_id = Uuid::now_v7();
        let job = processing_job(job_id);

        let mut jobs = MockJobRepository::new();
        jobs.expect_get_job()
            .returning(move |_| Ok(Some(job.clone())));
        // No lease acquisition: the step bails before touching the job

        let mut settings = MockSettingsRepository::new();
        settings.expect_get().returning(|| {
            Ok(Some(SenderSettings {
                id: Uuid::now_v7(),
                api_key: "not-an-encrypted-value".to_string(),
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
            vault(),
        );

        let err = driver.advance(job_id).await.unwrap_err();
        assert!(matches!(err, CampaignError::Credential(_)));
    }

    #[tokio::test]
    async fn test_advance_conflict_when_lease_is_held() {
        let job_id = Uuid::now_v7();
        let job = processing_job(job_id);

        let mut jobs = MockJobRepository::new();
        jobs.expect_get_job()
            .returning(move |_| Ok(Some(job.clone())));
        jobs.expect_acquire_lease().returning(|_, _| {
            Err(CampaignError::StateConflict(
                "another advance is already in progress for this job".to_string(),
            ))
        });

        let driver = DispatchDriver::new(
            Arc::new(jobs),
            Arc::new(settings_repo()),
            Arc::new(MockBatchMailer::new()),
            vault(),
        );

        // The losing side of a concurrent advance observes a conflict and
        // performs no sends
        let err = driver.advance(job_id).await.unwrap_err();
        assert!(matches!(err, CampaignError::StateConflict(_)));
    }
}
