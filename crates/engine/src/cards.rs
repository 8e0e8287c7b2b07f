//! The module contains `Card` struct and its persistence model.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, EngineError};

/// A card.
///
/// Either a manual card maintained by the user, or a card mirrored from a
/// provider account. For provider cards `balance` is whatever the provider
/// last reported; for manual cards it is the running sum of the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub masked_pan: String,
    /// Minor units, may be negative down to `-credit_limit`.
    pub balance: i64,
    pub credit_limit: i64,
    pub currency: Currency,
    /// Provider account type (`black`, `white`, `iron`, ...). Empty for
    /// manual cards.
    pub card_type: String,
    pub is_manual: bool,
    pub external_account_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    /// How much can still be spent before the credit limit is hit.
    pub fn available(&self) -> i64 {
        self.balance.saturating_add(self.credit_limit)
    }
}

/// Input of [`Engine::create_manual_card`](crate::Engine::create_manual_card).
#[derive(Clone, Debug, Default)]
pub struct NewCard {
    pub name: String,
    pub masked_pan: Option<String>,
    /// Opening balance in minor units.
    pub balance: i64,
    pub credit_limit: i64,
    pub currency: Currency,
}

/// Partial update of a manual card. `None` keeps the current value.
#[derive(Clone, Debug, Default)]
pub struct UpdateCard {
    pub name: Option<String>,
    pub masked_pan: Option<String>,
    pub credit_limit: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "cards")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub masked_pan: String,
    pub balance: i64,
    pub credit_limit: i64,
    pub currency_code: i32,
    pub card_type: String,
    pub is_manual: bool,
    #[sea_orm(unique)]
    pub external_account_id: Option<String>,
    /// Polling position of a provider card; moved only by statement polling.
    pub statement_cursor: Option<DateTimeUtc>,
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
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Card> for ActiveModel {
    fn from(card: &Card) -> Self {
        Self {
            id: ActiveValue::Set(card.id),
            user_id: ActiveValue::Set(card.user_id),
            name: ActiveValue::Set(card.name.clone()),
            masked_pan: ActiveValue::Set(card.masked_pan.clone()),
            balance: ActiveValue::Set(card.balance),
            credit_limit: ActiveValue::Set(card.credit_limit),
            currency_code: ActiveValue::Set(card.currency.into()),
            card_type: ActiveValue::Set(card.card_type.clone()),
            is_manual: ActiveValue::Set(card.is_manual),
            external_account_id: ActiveValue::Set(card.external_account_id.clone()),
            statement_cursor: ActiveValue::NotSet,
            created_at: ActiveValue::Set(card.created_at),
            updated_at: ActiveValue::Set(card.updated_at),
        }
    }
}

impl TryFrom<Model> for Card {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            name: model.name,
            masked_pan: model.masked_pan,
            balance: model.balance,
            credit_limit: model.credit_limit,
            currency: Currency::try_from(model.currency_code)?,
            card_type: model.card_type,
            is_manual: model.is_manual,
            external_account_id: model.external_account_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(balance: i64, credit_limit: i64) -> Card {
        let now = Utc::now();
        Card {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Cash".to_string(),
            masked_pan: String::new(),
            balance,
            credit_limit,
            currency: Currency::UAH,
            card_type: String::new(),
            is_manual: true,
            external_account_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn available_includes_credit_limit() {
        assert_eq!(card(1000, 500).available(), 1500);
        assert_eq!(card(i64::MAX, 1).available(), i64::MAX);
    }
}
