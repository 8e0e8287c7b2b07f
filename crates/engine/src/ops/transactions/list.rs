use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sea_orm::{Condition, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*};

use crate::{EngineError, ResultEngine, Transaction, TransactionKind, transactions};

use super::super::{Engine, with_tx};

const MAX_PAGE_SIZE: u64 = 500;

/// Filters for searching transactions.
///
/// `from` is inclusive and `to` is exclusive (`[from, to)`), both in UTC.
/// Amount bounds are inclusive and apply to the unsigned `amount`.
#[derive(Clone, Debug, Default)]
pub struct TransactionFilter {
    /// Case-insensitive substring of the description.
    pub query: Option<String>,
    pub kind: Option<TransactionKind>,
    pub category_id: Option<Uuid>,
    pub card_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub min_amount: Option<i64>,
    pub max_amount: Option<i64>,
}

fn validate_filter(filter: &TransactionFilter) -> ResultEngine<()> {
    if let (Some(from), Some(to)) = (filter.from, filter.to)
        && from >= to
    {
        return Err(EngineError::InvalidTransaction(
            "invalid range: from must be < to".to_string(),
        ));
    }
    if let (Some(min), Some(max)) = (filter.min_amount, filter.max_amount)
        && min > max
    {
        return Err(EngineError::InvalidTransaction(
            "invalid range: min_amount must be <= max_amount".to_string(),
        ));
    }
    Ok(())
}

trait ApplyTxFilters: QueryFilter + Sized {
    fn apply_tx_filters(self, filter: &TransactionFilter) -> Self;
}

impl<T> ApplyTxFilters for T
where
    T: QueryFilter + Sized,
{
    fn apply_tx_filters(mut self, filter: &TransactionFilter) -> Self {
        if let Some(query) = filter.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            self = self.filter(transactions::Column::Description.contains(query));
        }
        if let Some(kind) = filter.kind {
            self = self.filter(transactions::Column::Kind.eq(kind.as_str()));
        }
        if let Some(category_id) = filter.category_id {
            self = self.filter(transactions::Column::CategoryId.eq(category_id));
        }
        if let Some(card_id) = filter.card_id {
            self = self.filter(transactions::Column::CardId.eq(card_id));
        }
        if let Some(from) = filter.from {
            self = self.filter(transactions::Column::TransactionDate.gte(from));
        }
        if let Some(to) = filter.to {
            self = self.filter(transactions::Column::TransactionDate.lt(to));
        }
        if let Some(min) = filter.min_amount {
            self = self.filter(transactions::Column::Amount.gte(min));
        }
        if let Some(max) = filter.max_amount {
            self = self.filter(transactions::Column::Amount.lte(max));
        }
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct TransactionsCursor {
    transaction_date: DateTime<Utc>,
    transaction_id: Uuid,
}

impl TransactionsCursor {
    fn encode(&self) -> ResultEngine<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    fn decode(input: &str) -> ResultEngine<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(input.as_bytes())
            .map_err(|_| EngineError::InvalidCursor("invalid transactions cursor".to_string()))?;
        serde_json::from_slice::<Self>(&bytes)
            .map_err(|_| EngineError::InvalidCursor("invalid transactions cursor".to_string()))
    }
}

impl Engine {
    pub async fn transaction(
        &self,
        user_id: Uuid,
        transaction_id: Uuid,
    ) -> ResultEngine<Transaction> {
        with_tx!(self, |db_tx| {
            let model = self
                .require_transaction(&db_tx, user_id, transaction_id)
                .await?;
            Transaction::try_from(model)
        })
    }

    /// Searches the user's transactions, with cursor-based pagination.
    ///
    /// Pagination is newest → older by `(transaction_date DESC, id DESC)`.
    /// The returned cursor is `Some` only when more rows remain.
    pub async fn search_transactions(
        &self,
        user_id: Uuid,
        filter: &TransactionFilter,
        limit: u64,
        cursor: Option<&str>,
    ) -> ResultEngine<(Vec<Transaction>, Option<String>)> {
        validate_filter(filter)?;
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        with_tx!(self, |db_tx| {
            if let Some(card_id) = filter.card_id {
                self.require_card(&db_tx, user_id, card_id).await?;
            }

            let mut query = transactions::Entity::find()
                .filter(transactions::Column::UserId.eq(user_id))
                .order_by_desc(transactions::Column::TransactionDate)
                .order_by_desc(transactions::Column::Id)
                .limit(limit + 1);

            if let Some(cursor) = cursor {
                let cursor = TransactionsCursor::decode(cursor)?;
                query = query.filter(
                    Condition::any()
                        .add(transactions::Column::TransactionDate.lt(cursor.transaction_date))
                        .add(
                            Condition::all()
                                .add(
                                    transactions::Column::TransactionDate
                                        .eq(cursor.transaction_date),
                                )
                                .add(transactions::Column::Id.lt(cursor.transaction_id)),
                        ),
                );
            }
            query = query.apply_tx_filters(filter);

            let rows = query.all(&db_tx).await?;
            let has_more = rows.len() > limit as usize;

            let out = rows
                .into_iter()
                .take(limit as usize)
                .map(Transaction::try_from)
                .collect::<ResultEngine<Vec<_>>>()?;

            let next_cursor = match out.last() {
                Some(last) if has_more => Some(
                    TransactionsCursor {
                        transaction_date: last.transaction_date,
                        transaction_id: last.id,
                    }
                    .encode()?,
                ),
                _ => None,
            };

            Ok((out, next_cursor))
        })
    }

    /// Transactions of one card, newest first.
    pub async fn card_transactions(
        &self,
        user_id: Uuid,
        card_id: Uuid,
        limit: u64,
        cursor: Option<&str>,
    ) -> ResultEngine<(Vec<Transaction>, Option<String>)> {
        let filter = TransactionFilter {
            card_id: Some(card_id),
            ..TransactionFilter::default()
        };
        self.search_transactions(user_id, &filter, limit, cursor)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_rejects_garbage() {
        assert!(matches!(
            TransactionsCursor::decode("not a cursor"),
            Err(EngineError::InvalidCursor(_))
        ));
    }

    #[test]
    fn filter_rejects_inverted_ranges() {
        let now = Utc::now();
        let dates = TransactionFilter {
            from: Some(now),
            to: Some(now),
            ..TransactionFilter::default()
        };
        assert!(validate_filter(&dates).is_err());

        let amounts = TransactionFilter {
            min_amount: Some(10),
            max_amount: Some(5),
            ..TransactionFilter::default()
        };
        assert!(validate_filter(&amounts).is_err());
        assert!(validate_filter(&TransactionFilter::default()).is_ok());
    }
}
