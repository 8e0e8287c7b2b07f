use chrono::Utc;
use uuid::Uuid;

use sea_orm::{ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*};

use crate::{
    Card, EngineError, NewCard, ResultEngine, UpdateCard, cards, transactions,
    util::{normalize_optional_text, normalize_required_name},
};

use super::{Engine, with_tx};

fn validate_credit_limit(credit_limit: i64) -> ResultEngine<()> {
    if credit_limit < 0 {
        return Err(EngineError::InvalidCard(
            "credit_limit must be >= 0".to_string(),
        ));
    }
    Ok(())
}

fn require_manual(model: &cards::Model) -> ResultEngine<()> {
    if !model.is_manual {
        return Err(EngineError::ProviderCard(format!(
            "card {} is managed by the provider",
            model.id
        )));
    }
    Ok(())
}

impl Engine {
    /// Create a card maintained by hand.
    ///
    /// The opening `balance` may be negative only within `credit_limit`.
    pub async fn create_manual_card(&self, user_id: Uuid, input: NewCard) -> ResultEngine<Card> {
        let name = normalize_required_name(&input.name, "card name", EngineError::InvalidCard)?;
        validate_credit_limit(input.credit_limit)?;
        if input.balance < -input.credit_limit {
            return Err(EngineError::InvalidCard(format!(
                "opening balance {} is below credit limit {}",
                input.balance, input.credit_limit
            )));
        }

        with_tx!(self, |db_tx| {
            self.require_user(&db_tx, user_id).await?;

            let now = Utc::now();
            let card = Card {
                id: Uuid::new_v4(),
                user_id,
                name,
                masked_pan: normalize_optional_text(input.masked_pan.as_deref())
                    .unwrap_or_default(),
                balance: input.balance,
                credit_limit: input.credit_limit,
                currency: input.currency,
                card_type: String::new(),
                is_manual: true,
                external_account_id: None,
                created_at: now,
                updated_at: now,
            };
            cards::ActiveModel::from(&card).insert(&db_tx).await?;
            Ok(card)
        })
    }

    /// Return a card snapshot from DB.
    pub async fn card(&self, user_id: Uuid, card_id: Uuid) -> ResultEngine<Card> {
        with_tx!(self, |db_tx| {
            let model = self.require_card(&db_tx, user_id, card_id).await?;
            Card::try_from(model)
        })
    }

    /// Every card of the user, manual and provider ones, oldest first.
    pub async fn cards(&self, user_id: Uuid) -> ResultEngine<Vec<Card>> {
        with_tx!(self, |db_tx| {
            let models = cards::Entity::find()
                .filter(cards::Column::UserId.eq(user_id))
                .order_by_asc(cards::Column::CreatedAt)
                .order_by_asc(cards::Column::Id)
                .all(&db_tx)
                .await?;
            models
                .into_iter()
                .map(Card::try_from)
                .collect::<ResultEngine<Vec<_>>>()
        })
    }

    /// Rename a manual card or change its credit limit.
    ///
    /// Lowering the limit is refused when the current balance would fall
    /// below it.
    pub async fn update_card(
        &self,
        user_id: Uuid,
        card_id: Uuid,
        input: UpdateCard,
    ) -> ResultEngine<Card> {
        let name = input
            .name
            .as_deref()
            .map(|name| normalize_required_name(name, "card name", EngineError::InvalidCard))
            .transpose()?;
        if let Some(credit_limit) = input.credit_limit {
            validate_credit_limit(credit_limit)?;
        }

        let _guard = self.card_locks.lock(card_id).await;
        with_tx!(self, |db_tx| {
            let model = self.require_card(&db_tx, user_id, card_id).await?;
            require_manual(&model)?;

            if let Some(credit_limit) = input.credit_limit
                && model.balance < -credit_limit
            {
                return Err(EngineError::InsufficientFunds(format!(
                    "balance {} exceeds new credit limit {credit_limit}",
                    model.balance
                )));
            }

            let mut active: cards::ActiveModel = model.into();
            if let Some(name) = name {
                active.name = ActiveValue::Set(name);
            }
            if let Some(masked_pan) = input.masked_pan {
                active.masked_pan = ActiveValue::Set(masked_pan.trim().to_string());
            }
            if let Some(credit_limit) = input.credit_limit {
                active.credit_limit = ActiveValue::Set(credit_limit);
            }
            active.updated_at = ActiveValue::Set(Utc::now());
            let model = active.update(&db_tx).await?;
            Card::try_from(model)
        })
    }

    /// Delete a manual card together with its transactions.
    pub async fn delete_card(&self, user_id: Uuid, card_id: Uuid) -> ResultEngine<()> {
        let _guard = self.card_locks.lock(card_id).await;
        with_tx!(self, |db_tx| {
            let model = self.require_card(&db_tx, user_id, card_id).await?;
            require_manual(&model)?;

            transactions::Entity::delete_many()
                .filter(transactions::Column::CardId.eq(card_id))
                .exec(&db_tx)
                .await?;
            cards::Entity::delete_by_id(card_id).exec(&db_tx).await?;
            Ok(())
        })
    }
}
