use crate::models::Suppression;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// SeaORM entity for the suppressions table
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "suppressions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Stored lowercased; lookups are case-insensitive by construction
    #[sea_orm(unique)]
    pub email: String,
    pub reason: Option<String>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Suppression {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            reason: model.reason,
            created_at: model.created_at.into(),
        }
    }
}
