//! Transaction primitives.
//!
//! A `Transaction` is one ledger entry on one card. Its signed effect on the
//! card balance is derived from `kind` and `amount`, see
//! [`TransactionKind::signed_amount`].

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, EngineError};

/// Shared by transactions and categories: a category only classifies
/// transactions of its own kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Expense,
    Income,
    Transfer,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Income => "income",
            Self::Transfer => "transfer",
        }
    }

    /// Effect of `amount` on the card balance.
    ///
    /// Transfers are single-entry and move money out of the card they are
    /// recorded on.
    pub fn signed_amount(self, amount: i64) -> i64 {
        match self {
            Self::Income => amount,
            Self::Expense | Self::Transfer => -amount,
        }
    }
}

impl core::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TransactionKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "expense" => Ok(Self::Expense),
            "income" => Ok(Self::Income),
            "transfer" => Ok(Self::Transfer),
            other => Err(EngineError::InvalidTransaction(format!(
                "invalid transaction kind: {other}"
            ))),
        }
    }
}

/// Where a transaction comes from.
///
/// Imported records mirror the provider statement and are immutable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Provenance {
    Manual,
    Imported { external_id: String },
}

impl Provenance {
    pub fn external_id(&self) -> Option<&str> {
        match self {
            Self::Manual => None,
            Self::Imported { external_id } => Some(external_id),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub card_id: Uuid,
    pub category_id: Option<Uuid>,
    /// Magnitude in minor units, never negative.
    pub amount: i64,
    /// Signed amount in `operation_currency` as reported by the provider;
    /// equal to the signed effect for manual records.
    pub operation_amount: i64,
    pub kind: TransactionKind,
    /// Currency of the card, which `amount` is denominated in.
    pub currency: Currency,
    /// Currency of the purchase itself, e.g. EUR paid from a UAH card.
    pub operation_currency: Currency,
    pub description: String,
    pub comment: Option<String>,
    pub transaction_date: DateTime<Utc>,
    /// Card balance right after this transaction was applied.
    pub balance_after: i64,
    pub provenance: Provenance,
    pub mcc: i32,
    pub commission_rate: i64,
    pub cashback_amount: i64,
    pub hold: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn is_imported(&self) -> bool {
        matches!(self.provenance, Provenance::Imported { .. })
    }

    pub fn signed_amount(&self) -> i64 {
        self.kind.signed_amount(self.amount)
    }
}

/// Input of [`Engine::create_transaction`](crate::Engine::create_transaction).
#[derive(Clone, Debug)]
pub struct NewTransaction {
    pub card_id: Uuid,
    pub category_id: Option<Uuid>,
    pub amount: i64,
    pub kind: TransactionKind,
    pub currency: Currency,
    pub description: String,
    pub comment: Option<String>,
    /// Defaults to now.
    pub transaction_date: Option<DateTime<Utc>>,
}

/// Replacement values for a manual transaction.
///
/// The card and the provenance of a transaction cannot change.
#[derive(Clone, Debug)]
pub struct UpdateTransaction {
    pub category_id: Option<Uuid>,
    pub amount: i64,
    pub kind: TransactionKind,
    pub currency: Currency,
    pub description: String,
    pub comment: Option<String>,
    /// `None` keeps the current date.
    pub transaction_date: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub card_id: Uuid,
    pub category_id: Option<Uuid>,
    pub amount: i64,
    pub operation_amount: i64,
    pub kind: String,
    pub currency_code: i32,
    pub operation_currency_code: i32,
    pub description: String,
    pub comment: Option<String>,
    pub transaction_date: DateTimeUtc,
    pub balance_after: i64,
    #[sea_orm(unique)]
    pub external_id: Option<String>,
    pub mcc: i32,
    pub commission_rate: i64,
    pub cashback_amount: i64,
    pub hold: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::cards::Entity",
        from = "Column::CardId",
        to = "super::cards::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Card,
    #[sea_orm(
        belongs_to = "super::categories::Entity",
        from = "Column::CategoryId",
        to = "super::categories::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Category,
}

impl Related<super::cards::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Card.def()
    }
}

impl Related<super::categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id),
            user_id: ActiveValue::Set(tx.user_id),
            card_id: ActiveValue::Set(tx.card_id),
            category_id: ActiveValue::Set(tx.category_id),
            amount: ActiveValue::Set(tx.amount),
            operation_amount: ActiveValue::Set(tx.operation_amount),
            kind: ActiveValue::Set(tx.kind.as_str().to_string()),
            currency_code: ActiveValue::Set(tx.currency.into()),
            operation_currency_code: ActiveValue::Set(tx.operation_currency.into()),
            description: ActiveValue::Set(tx.description.clone()),
            comment: ActiveValue::Set(tx.comment.clone()),
            transaction_date: ActiveValue::Set(tx.transaction_date),
            balance_after: ActiveValue::Set(tx.balance_after),
            external_id: ActiveValue::Set(tx.provenance.external_id().map(ToString::to_string)),
            mcc: ActiveValue::Set(tx.mcc),
            commission_rate: ActiveValue::Set(tx.commission_rate),
            cashback_amount: ActiveValue::Set(tx.cashback_amount),
            hold: ActiveValue::Set(tx.hold),
            created_at: ActiveValue::Set(tx.created_at),
            updated_at: ActiveValue::Set(tx.updated_at),
        }
    }
}

impl TryFrom<Model> for Transaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let provenance = match model.external_id {
            Some(external_id) => Provenance::Imported { external_id },
            None => Provenance::Manual,
        };
        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            card_id: model.card_id,
            category_id: model.category_id,
            amount: model.amount,
            operation_amount: model.operation_amount,
            kind: TransactionKind::try_from(model.kind.as_str())?,
            currency: Currency::try_from(model.currency_code)?,
            operation_currency: Currency::try_from(model.operation_currency_code)?,
            description: model.description,
            comment: model.comment,
            transaction_date: model.transaction_date,
            balance_after: model.balance_after,
            provenance,
            mcc: model.mcc,
            commission_rate: model.commission_rate,
            cashback_amount: model.cashback_amount,
            hold: model.hold,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_amount_by_kind() {
        assert_eq!(TransactionKind::Income.signed_amount(250), 250);
        assert_eq!(TransactionKind::Expense.signed_amount(250), -250);
        assert_eq!(TransactionKind::Transfer.signed_amount(250), -250);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(matches!(
            TransactionKind::try_from("refund"),
            Err(EngineError::InvalidTransaction(_))
        ));
    }

    #[test]
    fn provenance_follows_external_id() {
        let now = Utc::now();
        let model = Model {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            card_id: Uuid::new_v4(),
            category_id: None,
            amount: 500,
            operation_amount: -500,
            kind: "expense".to_string(),
            currency_code: 980,
            operation_currency_code: 978,
            description: "Coffee".to_string(),
            comment: None,
            transaction_date: now,
            balance_after: 1500,
            external_id: Some("ZuHWzqkKGVo=".to_string()),
            mcc: 5814,
            commission_rate: 0,
            cashback_amount: 0,
            hold: false,
            created_at: now,
            updated_at: now,
        };
        let tx = Transaction::try_from(model).unwrap();
        assert!(tx.is_imported());
        assert_eq!(tx.provenance.external_id(), Some("ZuHWzqkKGVo="));
        assert_eq!(tx.signed_amount(), -500);
        assert_eq!(tx.operation_currency, Currency::EUR);
    }
}
