use chrono::{DateTime, Duration, Months, Utc};
use uuid::Uuid;

use sea_orm::{
    ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*, sea_query::Expr,
};

use crate::{
    EngineError, ResultEngine, cards,
    provider::{STATEMENT_MAX_WINDOW_SECS, StatementItem},
    provider_integrations,
};

use super::super::{Engine, with_tx};
use super::{CardSyncFailure, SyncReport, ingest::Ingested};

/// Start of polling for a card that was never polled.
fn default_cursor(now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(1))
        .unwrap_or_else(|| now - Duration::days(31))
}

fn window_end(from: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    (from + Duration::seconds(STATEMENT_MAX_WINDOW_SECS)).min(now)
}

#[derive(Default)]
struct CardSync {
    imported: usize,
    duplicates: usize,
}

impl Engine {
    /// Poll the provider statement of every provider card of the user.
    ///
    /// Cards are synced independently: a failing card is logged and reported
    /// in [`SyncReport::failures`] while the others carry on. Only a missing
    /// integration or a storage failure outside a card aborts the call.
    pub async fn sync_user_data(&self, user_id: Uuid) -> ResultEngine<SyncReport> {
        let (integration, provider_cards) = with_tx!(self, |db_tx| {
            let integration = self.require_integration(&db_tx, user_id).await?;
            let provider_cards = cards::Entity::find()
                .filter(cards::Column::UserId.eq(user_id))
                .filter(cards::Column::IsManual.eq(false))
                .filter(cards::Column::ExternalAccountId.is_not_null())
                .order_by_asc(cards::Column::CreatedAt)
                .all(&db_tx)
                .await?;
            Ok::<_, EngineError>((integration, provider_cards))
        })?;

        let mut report = SyncReport::default();
        for card in provider_cards {
            let Some(account_id) = card.external_account_id.clone() else {
                continue;
            };
            match self.sync_card(&integration.token, &card, &account_id).await {
                Ok(synced) => {
                    report.cards_synced += 1;
                    report.imported += synced.imported;
                    report.duplicates += synced.duplicates;
                }
                Err(err) => {
                    tracing::error!(
                        card_id = %card.id,
                        account_id = %account_id,
                        error = %err,
                        "card sync failed"
                    );
                    report.failures.push(CardSyncFailure {
                        card_id: card.id,
                        account_id,
                        kind: err.kind(),
                        message: err.to_string(),
                    });
                }
            }
        }

        with_tx!(self, |db_tx| {
            let now = Utc::now();
            let mut active: provider_integrations::ActiveModel = integration.into();
            active.last_sync_at = ActiveValue::Set(Some(now));
            active.sync_error = ActiveValue::Set(report.error_summary());
            active.updated_at = ActiveValue::Set(now);
            active.update(&db_tx).await?;
            Ok::<_, EngineError>(())
        })?;

        tracing::info!(
            user_id = %user_id,
            cards = report.cards_synced,
            imported = report.imported,
            duplicates = report.duplicates,
            failures = report.failures.len(),
            "provider sync finished"
        );
        Ok(report)
    }

    /// Fetch, deduplicate and store the new statement items of one card.
    ///
    /// Polling resumes from the card's statement cursor, which only this
    /// path moves. Manual entries and webhook deliveries leave it alone, so
    /// they cannot hide older provider items. The range up to now is walked
    /// in windows the provider accepts; the cursor is stored after each one.
    async fn sync_card(
        &self,
        token: &str,
        card: &cards::Model,
        account_id: &str,
    ) -> ResultEngine<CardSync> {
        let _sync_guard = self.sync_locks.lock(card.id).await;

        let stored = with_tx!(self, |db_tx| {
            cards::Entity::find_by_id(card.id)
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::CardNotFound(card.id.to_string()))
        })?;
        let now = Utc::now();
        let mut cursor = stored.statement_cursor.unwrap_or_else(|| default_cursor(now));

        let mut synced = CardSync::default();
        while cursor < now {
            let end = window_end(cursor, now);
            let items = self
                .provider
                .statement(token, account_id, cursor.timestamp(), end.timestamp())
                .await?;
            let newest = items.last().map(|item| item.time);
            self.ingest_window(card.id, &items, &mut synced).await?;

            let next = if end < now {
                end
            } else {
                match newest.and_then(|time| DateTime::from_timestamp(time, 0)) {
                    Some(newest) => newest.max(cursor),
                    None => cursor,
                }
            };
            self.store_statement_cursor(card.id, next).await?;
            if end >= now {
                break;
            }
            cursor = next;
        }
        Ok(synced)
    }

    /// Store the items of one window, oldest first, one item per transaction.
    async fn ingest_window(
        &self,
        card_id: Uuid,
        items: &[StatementItem],
        synced: &mut CardSync,
    ) -> ResultEngine<()> {
        let _card_guard = self.card_locks.lock(card_id).await;
        for item in items {
            let outcome = with_tx!(self, |db_tx| {
                let current = cards::Entity::find_by_id(card_id)
                    .one(&db_tx)
                    .await?
                    .ok_or_else(|| EngineError::CardNotFound(card_id.to_string()))?;
                self.ingest_item(&db_tx, &current, item).await
            })?;
            match outcome {
                Ingested::Inserted(_) => synced.imported += 1,
                Ingested::Duplicate => synced.duplicates += 1,
            }
        }
        Ok(())
    }

    async fn store_statement_cursor(
        &self,
        card_id: Uuid,
        cursor: DateTime<Utc>,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            cards::Entity::update_many()
                .col_expr(cards::Column::StatementCursor, Expr::value(cursor))
                .filter(cards::Column::Id.eq(card_id))
                .exec(&db_tx)
                .await?;
            Ok::<_, EngineError>(())
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn default_cursor_is_one_calendar_month_back() {
        let now = Utc.with_ymd_and_hms(2026, 3, 31, 12, 0, 0).unwrap();
        let cursor = default_cursor(now);
        assert_eq!(cursor, Utc.with_ymd_and_hms(2026, 2, 28, 12, 0, 0).unwrap());
    }

    #[test]
    fn one_month_back_fits_a_single_window() {
        let now = Utc.with_ymd_and_hms(2026, 8, 31, 0, 0, 0).unwrap();
        assert_eq!(window_end(default_cursor(now), now), now);
    }

    #[test]
    fn old_cursor_is_split_into_bounded_windows() {
        let now = Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap();
        let from = now - Duration::days(50);
        let first = window_end(from, now);
        assert_eq!(first, from + Duration::days(31) + Duration::hours(1));
        assert_eq!(window_end(first, now), now);
    }
}
