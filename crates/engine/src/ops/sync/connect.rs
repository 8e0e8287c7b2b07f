use chrono::Utc;
use uuid::Uuid;

use sea_orm::{
    ActiveValue, DatabaseTransaction, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
    prelude::*,
};

use crate::{
    Account, Card, ClientInfo, Currency, EngineError, ProviderStatus, ResultEngine, cards,
    provider_integrations, transactions,
};

use super::super::{Engine, with_tx};

impl Engine {
    /// Connect the user to the provider with a personal API token.
    ///
    /// Fetches the client info, stores the integration (replacing a previous
    /// token) and reconciles every provider account with a card: unseen
    /// accounts become new cards, known ones are refreshed in place and keep
    /// their id. Returns the reconciled cards.
    pub async fn connect(&self, user_id: Uuid, token: &str) -> ResultEngine<Vec<Card>> {
        let token = token.trim();
        if token.is_empty() {
            return Err(EngineError::TokenInvalid);
        }
        with_tx!(self, |db_tx| self.require_user(&db_tx, user_id).await)?;

        let info = self.provider.client_info(token).await?;

        let account_ids: Vec<String> = info.accounts.iter().map(|a| a.id.clone()).collect();
        let known: Vec<Uuid> = with_tx!(self, |db_tx| {
            cards::Entity::find()
                .filter(cards::Column::ExternalAccountId.is_in(account_ids.clone()))
                .all(&db_tx)
                .await
                .map(|models| models.into_iter().map(|m| m.id).collect::<Vec<_>>())
                .map_err(EngineError::from)
        })?;
        let _guards = self.card_locks.lock_all(&known).await;

        let cards = with_tx!(self, |db_tx| {
            self.upsert_integration(&db_tx, user_id, token, &info).await?;
            let mut cards = Vec::with_capacity(info.accounts.len());
            for account in &info.accounts {
                cards.push(self.reconcile_account(&db_tx, user_id, account).await?);
            }
            Ok::<_, EngineError>(cards)
        })?;

        tracing::info!(
            user_id = %user_id,
            client_id = %info.client_id,
            cards = cards.len(),
            "provider connected"
        );
        Ok(cards)
    }

    async fn upsert_integration(
        &self,
        db: &DatabaseTransaction,
        user_id: Uuid,
        token: &str,
        info: &ClientInfo,
    ) -> ResultEngine<()> {
        let now = Utc::now();
        match self.find_integration(db, user_id).await? {
            Some(model) => {
                let mut active: provider_integrations::ActiveModel = model.into();
                active.token = ActiveValue::Set(token.to_string());
                active.client_id = ActiveValue::Set(info.client_id.clone());
                active.webhook_url = ActiveValue::Set(info.webhook_url.clone());
                active.permissions = ActiveValue::Set(info.permissions.clone());
                active.active = ActiveValue::Set(true);
                active.sync_error = ActiveValue::Set(None);
                active.updated_at = ActiveValue::Set(now);
                active.update(db).await?;
            }
            None => {
                provider_integrations::ActiveModel {
                    id: ActiveValue::Set(Uuid::new_v4()),
                    user_id: ActiveValue::Set(user_id),
                    token: ActiveValue::Set(token.to_string()),
                    client_id: ActiveValue::Set(info.client_id.clone()),
                    webhook_url: ActiveValue::Set(info.webhook_url.clone()),
                    permissions: ActiveValue::Set(info.permissions.clone()),
                    active: ActiveValue::Set(true),
                    last_sync_at: ActiveValue::Set(None),
                    sync_error: ActiveValue::Set(None),
                    created_at: ActiveValue::Set(now),
                    updated_at: ActiveValue::Set(now),
                }
                .insert(db)
                .await?;
            }
        }
        Ok(())
    }

    /// Create or refresh the card mirroring `account`.
    async fn reconcile_account(
        &self,
        db: &DatabaseTransaction,
        user_id: Uuid,
        account: &Account,
    ) -> ResultEngine<Card> {
        let currency = Currency::try_from(account.currency_code)?;
        let now = Utc::now();

        let existing = cards::Entity::find()
            .filter(cards::Column::ExternalAccountId.eq(account.id.as_str()))
            .one(db)
            .await?;

        let model = match existing {
            Some(model) if model.user_id != user_id => {
                return Err(EngineError::Unauthorized(format!(
                    "provider account {} is linked to another user",
                    account.id
                )));
            }
            Some(model) => {
                let card_id = model.id;
                let mut active: cards::ActiveModel = model.into();
                active.balance = ActiveValue::Set(account.balance);
                active.credit_limit = ActiveValue::Set(account.credit_limit);
                active.card_type = ActiveValue::Set(account.account_type.clone());
                active.masked_pan = ActiveValue::Set(account.primary_pan().to_string());
                active.currency_code = ActiveValue::Set(currency.into());
                active.is_manual = ActiveValue::Set(false);
                active.updated_at = ActiveValue::Set(now);
                let model = active.update(db).await?;
                tracing::info!(card_id = %card_id, account_id = %account.id, "provider card refreshed");
                model
            }
            None => {
                let card = Card {
                    id: Uuid::new_v4(),
                    user_id,
                    name: account.display_name(),
                    masked_pan: account.primary_pan().to_string(),
                    balance: account.balance,
                    credit_limit: account.credit_limit,
                    currency,
                    card_type: account.account_type.clone(),
                    is_manual: false,
                    external_account_id: Some(account.id.clone()),
                    created_at: now,
                    updated_at: now,
                };
                let model = cards::ActiveModel::from(&card).insert(db).await?;
                tracing::info!(card_id = %card.id, account_id = %account.id, "provider card created");
                model
            }
        };
        Card::try_from(model)
    }

    /// Remove the integration, its cards and their transactions. Manual cards
    /// and manual transactions on them are untouched.
    pub async fn disconnect(&self, user_id: Uuid) -> ResultEngine<()> {
        let card_ids = with_tx!(self, |db_tx| {
            self.require_integration(&db_tx, user_id).await?;
            self.provider_card_ids(&db_tx, user_id).await
        })?;
        let _guards = self.card_locks.lock_all(&card_ids).await;

        with_tx!(self, |db_tx| {
            let integration = self.require_integration(&db_tx, user_id).await?;
            let card_ids = self.provider_card_ids(&db_tx, user_id).await?;

            transactions::Entity::delete_many()
                .filter(transactions::Column::CardId.is_in(card_ids.clone()))
                .exec(&db_tx)
                .await?;
            cards::Entity::delete_many()
                .filter(cards::Column::Id.is_in(card_ids))
                .exec(&db_tx)
                .await?;
            provider_integrations::Entity::delete_by_id(integration.id)
                .exec(&db_tx)
                .await?;
            Ok::<_, EngineError>(())
        })?;

        tracing::info!(user_id = %user_id, cards = card_ids.len(), "provider disconnected");
        Ok(())
    }

    async fn provider_card_ids(
        &self,
        db: &DatabaseTransaction,
        user_id: Uuid,
    ) -> ResultEngine<Vec<Uuid>> {
        let models = cards::Entity::find()
            .filter(cards::Column::UserId.eq(user_id))
            .filter(cards::Column::IsManual.eq(false))
            .all(db)
            .await?;
        Ok(models.into_iter().map(|m| m.id).collect())
    }

    /// Connection state of the user. The token is not part of the answer.
    pub async fn status(&self, user_id: Uuid) -> ResultEngine<ProviderStatus> {
        with_tx!(self, |db_tx| {
            let integration = self.require_integration(&db_tx, user_id).await?;
            let card_count = cards::Entity::find()
                .filter(cards::Column::UserId.eq(user_id))
                .filter(cards::Column::IsManual.eq(false))
                .count(&db_tx)
                .await?;
            Ok(integration.status(card_count))
        })
    }

    /// Users with an active integration, for periodic polling.
    pub async fn connected_users(&self) -> ResultEngine<Vec<Uuid>> {
        with_tx!(self, |db_tx| {
            let models = provider_integrations::Entity::find()
                .filter(provider_integrations::Column::Active.eq(true))
                .order_by_asc(provider_integrations::Column::CreatedAt)
                .all(&db_tx)
                .await?;
            Ok(models.into_iter().map(|m| m.user_id).collect::<Vec<_>>())
        })
    }
}
