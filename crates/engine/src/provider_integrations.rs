//! Provider connection per user.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Public view of a provider integration. The token is never exposed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub user_id: Uuid,
    pub client_id: String,
    pub permissions: String,
    pub webhook_url: Option<String>,
    pub active: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Summary of the per-card failures of the last sync, if any.
    pub sync_error: Option<String>,
    pub card_count: u64,
    pub connected_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "provider_integrations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub user_id: Uuid,
    pub token: String,
    pub client_id: String,
    pub webhook_url: Option<String>,
    pub permissions: String,
    pub active: bool,
    pub last_sync_at: Option<DateTimeUtc>,
    pub sync_error: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub(crate) fn status(&self, card_count: u64) -> ProviderStatus {
        ProviderStatus {
            user_id: self.user_id,
            client_id: self.client_id.clone(),
            permissions: self.permissions.clone(),
            webhook_url: self.webhook_url.clone(),
            active: self.active,
            last_sync_at: self.last_sync_at,
            sync_error: self.sync_error.clone(),
            card_count,
            connected_at: self.created_at,
        }
    }
}
