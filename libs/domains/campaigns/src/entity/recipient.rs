use crate::models::{Recipient, RecipientStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// SeaORM entity for the campaign_recipients table
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "campaign_recipients")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub job_id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub batch_number: i32,
    pub status: RecipientStatus,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    pub sent_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::job::Entity",
        from = "Column::JobId",
        to = "super::job::Column::Id",
        on_delete = "Cascade"
    )]
    Job,
}

impl Related<super::job::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Job.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Recipient {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            job_id: model.job_id,
            email: model.email,
            name: model.name,
            batch_number: model.batch_number,
            status: model.status,
            error_message: model.error_message,
            sent_at: model.sent_at.map(Into::into),
            created_at: model.created_at.into(),
        }
    }
}
