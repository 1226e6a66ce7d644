//! PostgreSQL implementations of the campaign repositories.
//!
//! Writes that affect the progress-counter invariant share a transaction:
//! intake (job + recipient rows), batch commit (recipient statuses + job
//! counters + lease release), finalize and cancel (status flip + history
//! snapshot).

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbBackend,
    EntityTrait, FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Statement,
    TransactionTrait,
};
use std::collections::HashSet;
use std::str::FromStr;
use uuid::Uuid;

use crate::entity::{history, job, recipient, settings, suppression};
use crate::error::{CampaignError, CampaignResult};
use crate::models::{
    AddSuppressionsReport, ErrorLogEntry, HistoryPage, HistoryQuery, HistoryStatus, Job,
    JobStatus, NewJob, NewRecipient, Recipient, RecipientCounts, RecipientStatus, SenderSettings,
    SuppressionPage, SuppressionQuery, ERROR_LOG_CAP,
};
use crate::repository::{
    BatchOutcome, DispatchLease, HistoryRepository, JobRepository, SettingsRepository,
    SuppressionRepository,
};

/// Recipient rows inserted per statement at intake. Bounds statement size;
/// unrelated to the dispatch batch size.
const RECIPIENT_WRITE_CHUNK: usize = 1000;

#[derive(Clone)]
pub struct PgJobRepository {
    db: DatabaseConnection,
}

impl PgJobRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn encode_error_log(log: &[ErrorLogEntry]) -> CampaignResult<Option<sea_orm::prelude::Json>> {
        if log.is_empty() {
            Ok(None)
        } else {
            Ok(Some(serde_json::to_value(log)?))
        }
    }
}

#[derive(FromQueryResult)]
struct MinBatchRow {
    min_batch: Option<i32>,
}

#[derive(FromQueryResult)]
struct StatusCountRow {
    status: String,
    count: i64,
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn create_job(
        &self,
        new_job: NewJob,
        recipients: Vec<NewRecipient>,
    ) -> CampaignResult<Job> {
        let txn = self.db.begin().await?;
        let now = Utc::now();
        let job_id = Uuid::now_v7();

        let model = job::ActiveModel {
            id: Set(job_id),
            subject: Set(new_job.subject),
            html_content: Set(new_job.html_content),
            total_recipients: Set(new_job.total_recipients),
            sent_count: Set(0),
            failed_count: Set(0),
            skipped_count: Set(new_job.skipped_count),
            status: Set(JobStatus::Pending),
            current_batch: Set(0),
            total_batches: Set(new_job.total_batches),
            batch_size: Set(new_job.batch_size),
            delay_between_batches_ms: Set(new_job.delay_between_batches_ms),
            error_log: Set(None),
            lease_token: Set(None),
            lease_until: Set(None),
            started_at: Set(None),
            completed_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        let inserted = model.insert(&txn).await?;

        // Uuid::now_v7 is time-ordered, so insertion order doubles as the
        // stable ascending cursor used by next_pending_batch.
        for chunk in recipients.chunks(RECIPIENT_WRITE_CHUNK) {
            let rows: Vec<recipient::ActiveModel> = chunk
                .iter()
                .map(|r| recipient::ActiveModel {
                    id: Set(Uuid::now_v7()),
                    job_id: Set(job_id),
                    email: Set(r.email.clone()),
                    name: Set(r.name.clone()),
                    batch_number: Set(r.batch_number),
                    status: Set(RecipientStatus::Pending),
                    error_message: Set(None),
                    sent_at: Set(None),
                    created_at: Set(now.into()),
                })
                .collect();

            // Any chunk failure rolls the whole transaction back, job row
            // included: intake is all-or-nothing.
            recipient::Entity::insert_many(rows).exec(&txn).await?;
        }

        txn.commit().await?;

        tracing::info!(
            job_id = %job_id,
            recipients = new_job.total_recipients - new_job.skipped_count,
            batches = new_job.total_batches,
            "Created campaign job"
        );
        Ok(inserted.into())
    }

    async fn get_job(&self, id: Uuid) -> CampaignResult<Option<Job>> {
        let model = job::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(Into::into))
    }

    async fn list_jobs(&self, limit: u64) -> CampaignResult<Vec<Job>> {
        let models = job::Entity::find()
            .order_by_desc(job::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn transition(
        &self,
        id: Uuid,
        from: JobStatus,
        to: JobStatus,
        mark_started: bool,
    ) -> CampaignResult<Job> {
        let now = Utc::now();

        let mut update = job::Entity::update_many()
            .col_expr(job::Column::Status, Expr::value(to))
            .col_expr(job::Column::UpdatedAt, Expr::value(now))
            .filter(job::Column::Id.eq(id))
            .filter(job::Column::Status.eq(from));

        if mark_started {
            update = update.col_expr(job::Column::StartedAt, Expr::value(now));
        }

        let result = update.exec(&self.db).await?;

        if result.rows_affected == 0 {
            // Lost a race or the caller's snapshot was stale
            let current = self
                .get_job(id)
                .await?
                .ok_or_else(|| CampaignError::NotFound(format!("job {} not found", id)))?;
            return Err(CampaignError::StateConflict(format!(
                "job is {}, not {}",
                current.status, from
            )));
        }

        tracing::info!(job_id = %id, from = %from, to = %to, "Job status changed");

        self.get_job(id)
            .await?
            .ok_or_else(|| CampaignError::NotFound(format!("job {} not found", id)))
    }

    async fn cancel(&self, id: Uuid) -> CampaignResult<Job> {
        let txn = self.db.begin().await?;
        let now = Utc::now();

        let model = job::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| CampaignError::NotFound(format!("job {} not found", id)))?;

        if model.status.is_terminal() {
            return Err(CampaignError::StateConflict(format!(
                "cannot cancel a {} job",
                model.status
            )));
        }

        let result = job::Entity::update_many()
            .col_expr(job::Column::Status, Expr::value(JobStatus::Failed))
            .col_expr(job::Column::CompletedAt, Expr::value(now))
            .col_expr(job::Column::LeaseToken, Expr::value(Option::<Uuid>::None))
            .col_expr(
                job::Column::LeaseUntil,
                Expr::value(Option::<chrono::DateTime<Utc>>::None),
            )
            .col_expr(job::Column::UpdatedAt, Expr::value(now))
            .filter(job::Column::Id.eq(id))
            .filter(job::Column::Status.eq(model.status))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            return Err(CampaignError::StateConflict(
                "job changed state during cancel; retry".to_string(),
            ));
        }

        // Terminal snapshot, written in the same transaction as the flip
        history::ActiveModel {
            id: Set(Uuid::now_v7()),
            subject: Set(model.subject.clone()),
            recipient_count: Set(model.total_recipients),
            sent_count: Set(model.sent_count),
            failed_count: Set(model.failed_count),
            skipped_count: Set(model.skipped_count),
            status: Set(HistoryStatus::Failed),
            error_log: Set(model.error_log.clone()),
            created_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;

        let cancelled = job::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| CampaignError::NotFound(format!("job {} not found", id)))?;

        txn.commit().await?;

        tracing::info!(job_id = %id, "Job cancelled");
        Ok(cancelled.into())
    }

    async fn delete_job(&self, id: Uuid) -> CampaignResult<bool> {
        let result = job::Entity::delete_many()
            .filter(job::Column::Id.eq(id))
            .filter(job::Column::Status.ne(JobStatus::Processing))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            if self.get_job(id).await?.is_some() {
                return Err(CampaignError::StateConflict(
                    "cannot delete a processing job; pause it first".to_string(),
                ));
            }
            return Ok(false);
        }

        tracing::info!(job_id = %id, "Deleted job");
        Ok(true)
    }

    async fn recipient_counts(&self, job_id: Uuid) -> CampaignResult<RecipientCounts> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT status, COUNT(*) AS count \
             FROM campaign_recipients WHERE job_id = $1 GROUP BY status",
            [job_id.into()],
        );

        let rows = StatusCountRow::find_by_statement(stmt).all(&self.db).await?;

        let mut counts = RecipientCounts::default();
        for row in rows {
            match RecipientStatus::from_str(&row.status) {
                Ok(RecipientStatus::Pending) => counts.pending = row.count,
                Ok(RecipientStatus::Sent) => counts.sent = row.count,
                Ok(RecipientStatus::Failed) => counts.failed = row.count,
                Ok(RecipientStatus::Skipped) => counts.skipped = row.count,
                Err(_) => {
                    return Err(CampaignError::Internal(format!(
                        "unknown recipient status in ledger: {}",
                        row.status
                    )))
                }
            }
        }

        Ok(counts)
    }

    async fn acquire_lease(&self, job_id: Uuid, ttl_secs: i64) -> CampaignResult<DispatchLease> {
        let token = Uuid::new_v4();
        let now = Utc::now();
        let until = now + Duration::seconds(ttl_secs);

        // One conditional UPDATE is the whole guard: it succeeds only while
        // the job is processing and no unexpired lease is held.
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE campaign_jobs \
             SET lease_token = $2, lease_until = $3, updated_at = $4 \
             WHERE id = $1 AND status = 'processing' \
               AND (lease_until IS NULL OR lease_until < $4)",
            [job_id.into(), token.into(), until.into(), now.into()],
        );

        let result = self.db.execute_raw(stmt).await?;

        if result.rows_affected() == 1 {
            return Ok(DispatchLease { token });
        }

        // Figure out which precondition failed for a useful error
        match self.get_job(job_id).await? {
            None => Err(CampaignError::NotFound(format!("job {} not found", job_id))),
            Some(job) if job.status != JobStatus::Processing => Err(
                CampaignError::StateConflict(format!("job is {}, not processing", job.status)),
            ),
            Some(_) => Err(CampaignError::StateConflict(
                "another advance is already in progress for this job".to_string(),
            )),
        }
    }

    async fn release_lease(&self, job_id: Uuid, lease: DispatchLease) -> CampaignResult<()> {
        job::Entity::update_many()
            .col_expr(job::Column::LeaseToken, Expr::value(Option::<Uuid>::None))
            .col_expr(
                job::Column::LeaseUntil,
                Expr::value(Option::<chrono::DateTime<Utc>>::None),
            )
            .filter(job::Column::Id.eq(job_id))
            .filter(job::Column::LeaseToken.eq(lease.token))
            .exec(&self.db)
            .await?;

        Ok(())
    }

    async fn next_pending_batch(
        &self,
        job_id: Uuid,
        batch_size: i32,
    ) -> CampaignResult<Vec<Recipient>> {
        let row = recipient::Entity::find()
            .select_only()
            .column_as(recipient::Column::BatchNumber.min(), "min_batch")
            .filter(recipient::Column::JobId.eq(job_id))
            .filter(recipient::Column::Status.eq(RecipientStatus::Pending))
            .into_model::<MinBatchRow>()
            .one(&self.db)
            .await?;

        let Some(batch_number) = row.and_then(|r| r.min_batch) else {
            return Ok(Vec::new());
        };

        let models = recipient::Entity::find()
            .filter(recipient::Column::JobId.eq(job_id))
            .filter(recipient::Column::Status.eq(RecipientStatus::Pending))
            .filter(recipient::Column::BatchNumber.eq(batch_number))
            .order_by_asc(recipient::Column::Id)
            .limit(batch_size.max(0) as u64)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn commit_batch(
        &self,
        job_id: Uuid,
        lease: DispatchLease,
        batch_number: i32,
        recipient_ids: Vec<Uuid>,
        outcome: BatchOutcome,
    ) -> CampaignResult<Job> {
        let txn = self.db.begin().await?;
        let now = Utc::now();

        let model = job::Entity::find_by_id(job_id)
            .one(&txn)
            .await?
            .ok_or_else(|| CampaignError::NotFound(format!("job {} not found", job_id)))?;

        if model.lease_token != Some(lease.token) {
            // The lease expired mid-flight and another advance claimed the
            // job; committing would double-count. The batch stays pending.
            return Err(CampaignError::StateConflict(
                "dispatch lease expired before commit; batch will be retried".to_string(),
            ));
        }

        let affected = recipient_ids.len() as i32;

        let mut update = recipient::Entity::update_many()
            .filter(recipient::Column::Id.is_in(recipient_ids));
        update = match &outcome {
            BatchOutcome::Sent => update
                .col_expr(recipient::Column::Status, Expr::value(RecipientStatus::Sent))
                .col_expr(recipient::Column::SentAt, Expr::value(now)),
            BatchOutcome::Failed { error } => update
                .col_expr(
                    recipient::Column::Status,
                    Expr::value(RecipientStatus::Failed),
                )
                .col_expr(recipient::Column::ErrorMessage, Expr::value(error.clone())),
        };
        update.exec(&txn).await?;

        let mut error_log = job::parse_error_log(model.error_log.clone());
        let (sent_inc, failed_inc) = match &outcome {
            BatchOutcome::Sent => (affected, 0),
            BatchOutcome::Failed { error } => {
                error_log.push(ErrorLogEntry {
                    batch: batch_number,
                    error: error.clone(),
                    timestamp: now,
                });
                if error_log.len() > ERROR_LOG_CAP {
                    let drop = error_log.len() - ERROR_LOG_CAP;
                    error_log.drain(..drop);
                }
                (0, affected)
            }
        };

        let sent_count = model.sent_count + sent_inc;
        let failed_count = model.failed_count + failed_inc;

        let mut active: job::ActiveModel = model.into();
        active.sent_count = Set(sent_count);
        active.failed_count = Set(failed_count);
        active.current_batch = Set(batch_number + 1);
        active.error_log = Set(Self::encode_error_log(&error_log)?);
        active.lease_token = Set(None);
        active.lease_until = Set(None);
        active.updated_at = Set(now.into());
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        tracing::info!(
            job_id = %job_id,
            batch = batch_number,
            sent = sent_inc,
            failed = failed_inc,
            "Committed batch outcome"
        );
        Ok(updated.into())
    }

    async fn finalize(&self, job_id: Uuid, lease: DispatchLease) -> CampaignResult<Job> {
        let txn = self.db.begin().await?;
        let now = Utc::now();

        let model = job::Entity::find_by_id(job_id)
            .one(&txn)
            .await?
            .ok_or_else(|| CampaignError::NotFound(format!("job {} not found", job_id)))?;

        if model.lease_token != Some(lease.token) {
            return Err(CampaignError::StateConflict(
                "dispatch lease expired before finalize".to_string(),
            ));
        }

        // Guarded flip keeps the history write exactly-once: a lost race
        // updates zero rows and inserts nothing.
        let result = job::Entity::update_many()
            .col_expr(job::Column::Status, Expr::value(JobStatus::Completed))
            .col_expr(job::Column::CompletedAt, Expr::value(now))
            .col_expr(job::Column::LeaseToken, Expr::value(Option::<Uuid>::None))
            .col_expr(
                job::Column::LeaseUntil,
                Expr::value(Option::<chrono::DateTime<Utc>>::None),
            )
            .col_expr(job::Column::UpdatedAt, Expr::value(now))
            .filter(job::Column::Id.eq(job_id))
            .filter(job::Column::Status.eq(JobStatus::Processing))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            return Err(CampaignError::StateConflict(format!(
                "job is {}, not processing",
                model.status
            )));
        }

        let history_status = if model.failed_count > 0 {
            HistoryStatus::Partial
        } else {
            HistoryStatus::Completed
        };

        history::ActiveModel {
            id: Set(Uuid::now_v7()),
            subject: Set(model.subject.clone()),
            recipient_count: Set(model.total_recipients),
            sent_count: Set(model.sent_count),
            failed_count: Set(model.failed_count),
            skipped_count: Set(model.skipped_count),
            status: Set(history_status),
            error_log: Set(model.error_log.clone()),
            created_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;

        let finished = job::Entity::find_by_id(job_id)
            .one(&txn)
            .await?
            .ok_or_else(|| CampaignError::NotFound(format!("job {} not found", job_id)))?;

        txn.commit().await?;

        tracing::info!(job_id = %job_id, status = %history_status, "Job completed");
        Ok(finished.into())
    }

    async fn count_pending(&self, job_id: Uuid) -> CampaignResult<u64> {
        let count = recipient::Entity::find()
            .filter(recipient::Column::JobId.eq(job_id))
            .filter(recipient::Column::Status.eq(RecipientStatus::Pending))
            .count(&self.db)
            .await?;

        Ok(count)
    }
}

#[derive(Clone)]
pub struct PgSuppressionRepository {
    db: DatabaseConnection,
}

impl PgSuppressionRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SuppressionRepository for PgSuppressionRepository {
    async fn all_emails(&self) -> CampaignResult<HashSet<String>> {
        let emails: Vec<String> = suppression::Entity::find()
            .select_only()
            .column(suppression::Column::Email)
            .into_tuple()
            .all(&self.db)
            .await?;

        Ok(emails.into_iter().map(|e| e.to_lowercase()).collect())
    }

    async fn add(
        &self,
        emails: Vec<String>,
        reason: Option<String>,
    ) -> CampaignResult<AddSuppressionsReport> {
        let existing: HashSet<String> = suppression::Entity::find()
            .select_only()
            .column(suppression::Column::Email)
            .filter(suppression::Column::Email.is_in(emails.clone()))
            .into_tuple::<String>()
            .all(&self.db)
            .await?
            .into_iter()
            .collect();

        let (fresh, duplicates): (Vec<String>, Vec<String>) =
            emails.into_iter().partition(|e| !existing.contains(e));

        if !fresh.is_empty() {
            let now = Utc::now();
            let rows: Vec<suppression::ActiveModel> = fresh
                .iter()
                .map(|email| suppression::ActiveModel {
                    id: Set(Uuid::now_v7()),
                    email: Set(email.clone()),
                    reason: Set(reason.clone()),
                    created_at: Set(now.into()),
                })
                .collect();

            suppression::Entity::insert_many(rows).exec(&self.db).await?;

            tracing::info!(added = fresh.len(), "Added suppression entries");
        }

        Ok(AddSuppressionsReport {
            added: fresh.len(),
            skipped: duplicates.len(),
            duplicates,
        })
    }

    async fn list(&self, query: SuppressionQuery) -> CampaignResult<SuppressionPage> {
        let mut select = suppression::Entity::find();

        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            select = select.filter(
                Condition::any()
                    .add(suppression::Column::Email.contains(search.to_lowercase()))
                    .add(suppression::Column::Reason.contains(search)),
            );
        }

        let total = select.clone().count(&self.db).await?;

        let models = select
            .order_by_desc(suppression::Column::CreatedAt)
            .paginate(&self.db, query.limit)
            .fetch_page(query.page - 1)
            .await?;

        Ok(SuppressionPage {
            suppressions: models.into_iter().map(Into::into).collect(),
            total,
            page: query.page,
            limit: query.limit,
            total_pages: total.div_ceil(query.limit),
        })
    }

    async fn delete_by_id(&self, id: Uuid) -> CampaignResult<bool> {
        let result = suppression::Entity::delete_many()
            .filter(suppression::Column::Id.eq(id))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }

    async fn delete_by_email(&self, email: &str) -> CampaignResult<bool> {
        let result = suppression::Entity::delete_many()
            .filter(suppression::Column::Email.eq(email.to_lowercase()))
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected > 0)
    }
}

#[derive(Clone)]
pub struct PgSettingsRepository {
    db: DatabaseConnection,
}

impl PgSettingsRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SettingsRepository for PgSettingsRepository {
    async fn get(&self) -> CampaignResult<Option<SenderSettings>> {
        let model = settings::Entity::find()
            .order_by_desc(settings::Column::CreatedAt)
            .one(&self.db)
            .await?;

        Ok(model.map(Into::into))
    }

    async fn save(
        &self,
        api_key: String,
        from_email: String,
        from_name: String,
    ) -> CampaignResult<SenderSettings> {
        let now = Utc::now();

        let existing = settings::Entity::find()
            .order_by_desc(settings::Column::CreatedAt)
            .one(&self.db)
            .await?;

        let saved = match existing {
            Some(model) => {
                let mut active: settings::ActiveModel = model.into();
                active.api_key = Set(api_key);
                active.from_email = Set(from_email);
                active.from_name = Set(from_name);
                active.updated_at = Set(now.into());
                active.update(&self.db).await?
            }
            None => {
                settings::ActiveModel {
                    id: Set(Uuid::now_v7()),
                    api_key: Set(api_key),
                    from_email: Set(from_email),
                    from_name: Set(from_name),
                    created_at: Set(now.into()),
                    updated_at: Set(now.into()),
                }
                .insert(&self.db)
                .await?
            }
        };

        tracing::info!(settings_id = %saved.id, "Saved sender settings");
        Ok(saved.into())
    }
}

#[derive(Clone)]
pub struct PgHistoryRepository {
    db: DatabaseConnection,
}

impl PgHistoryRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl HistoryRepository for PgHistoryRepository {
    async fn list(&self, query: HistoryQuery) -> CampaignResult<HistoryPage> {
        let mut select = history::Entity::find();

        if let Some(status) = query.status {
            select = select.filter(history::Column::Status.eq(status));
        }

        let total = select.clone().count(&self.db).await?;

        let models = select
            .order_by_desc(history::Column::CreatedAt)
            .paginate(&self.db, query.limit)
            .fetch_page(query.page - 1)
            .await?;

        Ok(HistoryPage {
            history: models.into_iter().map(Into::into).collect(),
            total,
        })
    }
}
