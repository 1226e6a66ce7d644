use crate::models::{ErrorLogEntry, Job, JobStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// SeaORM entity for the campaign_jobs table
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "campaign_jobs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub subject: String,
    #[sea_orm(column_type = "Text")]
    pub html_content: String,
    pub total_recipients: i32,
    pub sent_count: i32,
    pub failed_count: i32,
    pub skipped_count: i32,
    pub status: JobStatus,
    pub current_batch: i32,
    pub total_batches: i32,
    pub batch_size: i32,
    pub delay_between_batches_ms: i64,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub error_log: Option<Json>,
    pub lease_token: Option<Uuid>,
    pub lease_until: Option<DateTimeWithTimeZone>,
    pub started_at: Option<DateTimeWithTimeZone>,
    pub completed_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Deserialize the jsonb error log, tolerating an absent column value.
pub fn parse_error_log(value: Option<Json>) -> Vec<ErrorLogEntry> {
    value
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

// Conversion from SeaORM Model to the domain Job (lease bookkeeping stays
// internal to the repository layer)
impl From<Model> for Job {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            subject: model.subject,
            html_content: model.html_content,
            total_recipients: model.total_recipients,
            sent_count: model.sent_count,
            failed_count: model.failed_count,
            skipped_count: model.skipped_count,
            status: model.status,
            current_batch: model.current_batch,
            total_batches: model.total_batches,
            batch_size: model.batch_size,
            delay_between_batches_ms: model.delay_between_batches_ms,
            error_log: parse_error_log(model.error_log),
            started_at: model.started_at.map(Into::into),
            completed_at: model.completed_at.map(Into::into),
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}
