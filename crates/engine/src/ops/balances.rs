use chrono::Utc;
use uuid::Uuid;

use sea_orm::{DatabaseTransaction, QueryFilter, prelude::*, sea_query::Expr};

use crate::{EngineError, ResultEngine, cards};

use super::Engine;

impl Engine {
    /// Adds `delta` to the card balance and returns the new balance.
    ///
    /// A sum outside the `i64` range is rejected with `InvalidTransaction`
    /// before anything is written.
    ///
    /// The write is a single relative `UPDATE` guarded by
    /// `balance + delta >= -credit_limit`, so it never overwrites a
    /// concurrent writer and never breaks the credit limit. Callers hold the
    /// card lock.
    pub(super) async fn apply_card_delta(
        &self,
        db: &DatabaseTransaction,
        card_id: Uuid,
        delta: i64,
    ) -> ResultEngine<i64> {
        let card = cards::Entity::find_by_id(card_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::CardNotFound(card_id.to_string()))?;
        if card.balance.checked_add(delta).is_none() {
            return Err(EngineError::InvalidTransaction(format!(
                "card balance {} cannot hold {delta} more",
                card.balance
            )));
        }

        let result = cards::Entity::update_many()
            .col_expr(
                cards::Column::Balance,
                Expr::col(cards::Column::Balance).add(delta),
            )
            .col_expr(cards::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(cards::Column::Id.eq(card_id))
            .filter(
                Expr::expr(Expr::col(cards::Column::Balance).add(delta))
                    .gte(Expr::col(cards::Column::CreditLimit).mul(-1)),
            )
            .exec(db)
            .await?;

        let card = cards::Entity::find_by_id(card_id)
            .one(db)
            .await?
            .ok_or_else(|| EngineError::CardNotFound(card_id.to_string()))?;

        if result.rows_affected == 0 {
            return Err(EngineError::InsufficientFunds(format!(
                "card balance {} cannot absorb {delta} with credit limit {}",
                card.balance, card.credit_limit
            )));
        }
        Ok(card.balance)
    }

    /// Overwrites the card balance with the provider-reported one.
    pub(super) async fn set_card_balance(
        &self,
        db: &DatabaseTransaction,
        card_id: Uuid,
        balance: i64,
    ) -> ResultEngine<()> {
        cards::Entity::update_many()
            .col_expr(cards::Column::Balance, Expr::value(balance))
            .col_expr(cards::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(cards::Column::Id.eq(card_id))
            .exec(db)
            .await?;
        Ok(())
    }
}
