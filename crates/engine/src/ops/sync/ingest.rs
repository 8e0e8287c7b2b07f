use chrono::Utc;
use uuid::Uuid;

use sea_orm::{DatabaseTransaction, QueryFilter, SqlErr, TransactionTrait, prelude::*};

use crate::{
    Currency, EngineError, Provenance, ResultEngine, StatementItem, Transaction, cards,
    transactions,
};

use super::super::Engine;

pub(super) enum Ingested {
    Inserted(Transaction),
    Duplicate,
}

impl Engine {
    /// Store one provider statement item on `card`. Callers hold the card
    /// lock and commit the transaction.
    ///
    /// The provider balance is authoritative: `balance_after` is copied from
    /// the item, and the card takes it over when no stored transaction of
    /// the card is more recent.
    pub(super) async fn ingest_item(
        &self,
        db: &DatabaseTransaction,
        card: &cards::Model,
        item: &StatementItem,
    ) -> ResultEngine<Ingested> {
        let already = transactions::Entity::find()
            .filter(transactions::Column::ExternalId.eq(item.id.as_str()))
            .one(db)
            .await?;
        if already.is_some() {
            tracing::debug!(external_id = %item.id, card_id = %card.id, "duplicate statement item");
            return Ok(Ingested::Duplicate);
        }

        let occurred_at = item.occurred_at()?;
        let amount = item.amount.checked_abs().ok_or_else(|| {
            EngineError::ProviderApi(format!("statement item {} amount out of range", item.id))
        })?;

        let newer = transactions::Entity::find()
            .filter(transactions::Column::CardId.eq(card.id))
            .filter(transactions::Column::TransactionDate.gt(occurred_at))
            .one(db)
            .await?;

        let now = Utc::now();
        let tx = Transaction {
            id: Uuid::new_v4(),
            user_id: card.user_id,
            card_id: card.id,
            category_id: None,
            amount,
            operation_amount: item.operation_amount,
            kind: item.kind(),
            currency: Currency::try_from(card.currency_code)?,
            operation_currency: Currency::try_from(item.currency_code).map_err(|_| {
                EngineError::ProviderApi(format!(
                    "statement item {} has currency code {}",
                    item.id, item.currency_code
                ))
            })?,
            description: item.description.trim().to_string(),
            comment: item.comment.clone().filter(|c| !c.trim().is_empty()),
            transaction_date: occurred_at,
            balance_after: item.balance,
            provenance: Provenance::Imported {
                external_id: item.id.clone(),
            },
            mcc: item.mcc,
            commission_rate: item.commission_rate,
            cashback_amount: item.cashback_amount,
            hold: item.hold,
            created_at: now,
            updated_at: now,
        };

        // Savepoint, so a unique violation leaves the outer transaction usable.
        let savepoint = db.begin().await?;
        match transactions::ActiveModel::from(&tx).insert(&savepoint).await {
            Ok(_) => savepoint.commit().await?,
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                savepoint.rollback().await?;
                tracing::debug!(external_id = %item.id, "statement item stored concurrently");
                return Ok(Ingested::Duplicate);
            }
            Err(err) => return Err(err.into()),
        }

        if newer.is_none() {
            if item.balance < -card.credit_limit {
                tracing::warn!(
                    card_id = %card.id,
                    balance = item.balance,
                    credit_limit = card.credit_limit,
                    "provider balance is below the credit limit"
                );
            }
            self.set_card_balance(db, card.id, item.balance).await?;
        }

        Ok(Ingested::Inserted(tx))
    }
}
