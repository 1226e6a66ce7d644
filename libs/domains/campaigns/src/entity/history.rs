use crate::models::{HistoryRecord, HistoryStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// SeaORM entity for the send_history table
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "send_history")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub subject: String,
    pub recipient_count: i32,
    pub sent_count: i32,
    pub failed_count: i32,
    pub skipped_count: i32,
    pub status: HistoryStatus,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub error_log: Option<Json>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for HistoryRecord {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            subject: model.subject,
            recipient_count: model.recipient_count,
            sent_count: model.sent_count,
            failed_count: model.failed_count,
            skipped_count: model.skipped_count,
            status: model.status,
            error_log: super::job::parse_error_log(model.error_log),
            created_at: model.created_at.into(),
        }
    }
}
