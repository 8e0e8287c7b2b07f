use chrono::Utc;
use uuid::Uuid;

use sea_orm::{ActiveValue, DatabaseTransaction, TransactionTrait, prelude::*};

use crate::{
    Currency, EngineError, NewTransaction, Provenance, ResultEngine, Transaction,
    TransactionKind, UpdateTransaction, cards, transactions,
    util::{normalize_optional_text, normalize_required_name},
};

use super::super::{Engine, with_tx};

/// Fields of a manual entry after validation against its card.
struct ValidEntry {
    description: String,
    comment: Option<String>,
}

struct EntryInput<'a> {
    category_id: Option<Uuid>,
    amount: i64,
    kind: TransactionKind,
    currency: Currency,
    description: &'a str,
    comment: Option<&'a str>,
}

fn ensure_manual(model: &transactions::Model) -> ResultEngine<()> {
    if let Some(external_id) = &model.external_id {
        return Err(EngineError::CannotModifyExternal(format!(
            "transaction {} was imported as {external_id}",
            model.id
        )));
    }
    Ok(())
}

impl Engine {
    /// Checks shared by creation and update, in reporting order: category
    /// ownership and kind, then amount, currency and description.
    async fn validate_entry(
        &self,
        db: &DatabaseTransaction,
        user_id: Uuid,
        card: &cards::Model,
        input: &EntryInput<'_>,
    ) -> ResultEngine<ValidEntry> {
        if let Some(category_id) = input.category_id {
            let category = self.require_category(db, user_id, category_id).await?;
            if category.kind != input.kind.as_str() {
                return Err(EngineError::InvalidTransaction(format!(
                    "category kind is {}, transaction kind is {}",
                    category.kind, input.kind
                )));
            }
        }

        if input.amount <= 0 {
            return Err(EngineError::InvalidTransaction(
                "amount must be > 0".to_string(),
            ));
        }
        if i32::from(input.currency) != card.currency_code {
            return Err(EngineError::InvalidTransaction(format!(
                "card currency is {:03}, got {:03}",
                card.currency_code,
                input.currency.code()
            )));
        }
        let description = normalize_required_name(
            input.description,
            "description",
            EngineError::InvalidTransaction,
        )?;

        Ok(ValidEntry {
            description,
            comment: normalize_optional_text(input.comment),
        })
    }

    /// Record a manual transaction and apply it to the card balance.
    ///
    /// Income adds `amount`, expense and transfer subtract it. Fails with
    /// `InsufficientFunds` when the card would fall below `-credit_limit`;
    /// nothing is written in that case.
    pub async fn create_transaction(
        &self,
        user_id: Uuid,
        input: NewTransaction,
    ) -> ResultEngine<Transaction> {
        let _guard = self.card_locks.lock(input.card_id).await;
        with_tx!(self, |db_tx| {
            let card = self.require_card(&db_tx, user_id, input.card_id).await?;
            let entry = self
                .validate_entry(
                    &db_tx,
                    user_id,
                    &card,
                    &EntryInput {
                        category_id: input.category_id,
                        amount: input.amount,
                        kind: input.kind,
                        currency: input.currency,
                        description: &input.description,
                        comment: input.comment.as_deref(),
                    },
                )
                .await?;

            let delta = input.kind.signed_amount(input.amount);
            let balance_after = self.apply_card_delta(&db_tx, card.id, delta).await?;

            let now = Utc::now();
            let tx = Transaction {
                id: Uuid::new_v4(),
                user_id,
                card_id: card.id,
                category_id: input.category_id,
                amount: input.amount,
                operation_amount: delta,
                kind: input.kind,
                currency: input.currency,
                operation_currency: input.currency,
                description: entry.description,
                comment: entry.comment,
                transaction_date: input.transaction_date.unwrap_or(now),
                balance_after,
                provenance: Provenance::Manual,
                mcc: 0,
                commission_rate: 0,
                cashback_amount: 0,
                hold: false,
                created_at: now,
                updated_at: now,
            };
            transactions::ActiveModel::from(&tx).insert(&db_tx).await?;
            Ok(tx)
        })
    }

    /// Card of a manual transaction, checked before taking the card lock.
    async fn manual_transaction_card(&self, user_id: Uuid, id: Uuid) -> ResultEngine<Uuid> {
        with_tx!(self, |db_tx| {
            let model = self.require_transaction(&db_tx, user_id, id).await?;
            ensure_manual(&model)?;
            Ok(model.card_id)
        })
    }

    /// Replace the values of a manual transaction.
    ///
    /// The card balance moves by the difference between the new and the old
    /// effect, under the same credit-limit guard as creation.
    pub async fn update_transaction(
        &self,
        user_id: Uuid,
        transaction_id: Uuid,
        input: UpdateTransaction,
    ) -> ResultEngine<Transaction> {
        let card_id = self.manual_transaction_card(user_id, transaction_id).await?;
        let _guard = self.card_locks.lock(card_id).await;
        with_tx!(self, |db_tx| {
            let model = self
                .require_transaction(&db_tx, user_id, transaction_id)
                .await?;
            ensure_manual(&model)?;
            let card = self.require_card(&db_tx, user_id, model.card_id).await?;
            let entry = self
                .validate_entry(
                    &db_tx,
                    user_id,
                    &card,
                    &EntryInput {
                        category_id: input.category_id,
                        amount: input.amount,
                        kind: input.kind,
                        currency: input.currency,
                        description: &input.description,
                        comment: input.comment.as_deref(),
                    },
                )
                .await?;

            let old_delta =
                TransactionKind::try_from(model.kind.as_str())?.signed_amount(model.amount);
            let new_delta = input.kind.signed_amount(input.amount);
            let diff = new_delta.checked_sub(old_delta).ok_or_else(|| {
                EngineError::InvalidTransaction(format!(
                    "changing {old_delta} into {new_delta} overflows the balance"
                ))
            })?;
            let balance_after = match diff {
                0 => card.balance,
                diff => self.apply_card_delta(&db_tx, card.id, diff).await?,
            };

            let transaction_date = input.transaction_date.unwrap_or(model.transaction_date);
            let mut active: transactions::ActiveModel = model.into();
            active.category_id = ActiveValue::Set(input.category_id);
            active.amount = ActiveValue::Set(input.amount);
            active.operation_amount = ActiveValue::Set(new_delta);
            active.kind = ActiveValue::Set(input.kind.as_str().to_string());
            active.currency_code = ActiveValue::Set(input.currency.into());
            active.operation_currency_code = ActiveValue::Set(input.currency.into());
            active.description = ActiveValue::Set(entry.description);
            active.comment = ActiveValue::Set(entry.comment);
            active.transaction_date = ActiveValue::Set(transaction_date);
            active.balance_after = ActiveValue::Set(balance_after);
            active.updated_at = ActiveValue::Set(Utc::now());
            let model = active.update(&db_tx).await?;
            Transaction::try_from(model)
        })
    }

    /// Delete a manual transaction and reverse its effect on the card.
    ///
    /// Reversing an income can itself break the credit limit, in which case
    /// the delete is refused with `InsufficientFunds`.
    pub async fn delete_transaction(
        &self,
        user_id: Uuid,
        transaction_id: Uuid,
    ) -> ResultEngine<()> {
        let card_id = self.manual_transaction_card(user_id, transaction_id).await?;
        let _guard = self.card_locks.lock(card_id).await;
        with_tx!(self, |db_tx| {
            let model = self
                .require_transaction(&db_tx, user_id, transaction_id)
                .await?;
            ensure_manual(&model)?;

            let delta =
                TransactionKind::try_from(model.kind.as_str())?.signed_amount(model.amount);
            self.apply_card_delta(&db_tx, model.card_id, -delta).await?;
            transactions::Entity::delete_by_id(model.id)
                .exec(&db_tx)
                .await?;
            Ok(())
        })
    }
}
