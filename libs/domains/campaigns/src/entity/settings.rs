use crate::models::SenderSettings;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// SeaORM entity for the sender_settings table
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sender_settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Encrypted provider API key (never stored in plaintext)
    #[sea_orm(column_type = "Text")]
    pub api_key: String,
    pub from_email: String,
    pub from_name: String,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for SenderSettings {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            api_key: model.api_key,
            from_email: model.from_email,
            from_name: model.from_name,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}
