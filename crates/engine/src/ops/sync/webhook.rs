use sea_orm::{QueryFilter, TransactionTrait, prelude::*};

use crate::{
    EngineError, ResultEngine, StatementItemEvent, WebhookEnvelope, cards,
};

use super::super::{Engine, with_tx};
use super::{WebhookOutcome, ingest::Ingested};

const STATEMENT_ITEM: &str = "StatementItem";

impl Engine {
    /// Ingest a provider push notification.
    ///
    /// Statement events go through the same path as polling, so replays and
    /// overlap with a concurrent sync are harmless. Other event types are
    /// logged and ignored.
    pub async fn handle_webhook(&self, payload: &[u8]) -> ResultEngine<WebhookOutcome> {
        let envelope: WebhookEnvelope = serde_json::from_slice(payload)
            .map_err(|err| EngineError::InvalidWebhook(err.to_string()))?;
        if envelope.event_type != STATEMENT_ITEM {
            tracing::warn!(event_type = %envelope.event_type, "ignoring webhook event");
            return Ok(WebhookOutcome::Ignored);
        }
        let event: StatementItemEvent = serde_json::from_value(envelope.data)
            .map_err(|err| EngineError::InvalidWebhook(err.to_string()))?;

        let card = with_tx!(self, |db_tx| {
            cards::Entity::find()
                .filter(cards::Column::ExternalAccountId.eq(event.account.as_str()))
                .one(&db_tx)
                .await
                .map_err(EngineError::from)
        })?
        .ok_or_else(|| EngineError::UnknownAccount(event.account.clone()))?;

        let _guard = self.card_locks.lock(card.id).await;
        let outcome = with_tx!(self, |db_tx| {
            let current = cards::Entity::find_by_id(card.id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::UnknownAccount(event.account.clone()))?;
            self.ingest_item(&db_tx, &current, &event.statement_item)
                .await
        })?;

        Ok(match outcome {
            Ingested::Inserted(tx) => {
                tracing::info!(
                    card_id = %tx.card_id,
                    external_id = %event.statement_item.id,
                    "webhook statement item ingested"
                );
                WebhookOutcome::Ingested(tx)
            }
            Ingested::Duplicate => WebhookOutcome::Duplicate,
        })
    }
}
