use sea_orm::DatabaseConnection;

use crate::{
    ResultEngine,
    locks::KeyedLocks,
    provider::{ProviderClient, ProviderConfig},
};

mod access;
mod balances;
mod cards;
mod categories;
mod sync;
mod transactions;
mod users;

pub use sync::{CardSyncFailure, SyncReport, WebhookOutcome};
pub use transactions::TransactionFilter;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Entry point of every ledger, category and provider operation.
///
/// `Engine` is `Send + Sync` and every method takes `&self`: share it behind
/// an `Arc` and call it from as many tasks as needed. Balance mutations on the
/// same card are serialized internally; everything else runs in parallel.
///
/// Lock order is always card locks (ascending id) first, then a database
/// connection, so a writer never waits for a card while holding a connection.
#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
    provider: ProviderClient,
    card_locks: KeyedLocks,
    sync_locks: KeyedLocks,
    category_locks: KeyedLocks,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    provider: ProviderConfig,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Override the provider endpoint and request timeout.
    pub fn provider(mut self, config: ProviderConfig) -> EngineBuilder {
        self.provider = config;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
            provider: ProviderClient::new(&self.provider)?,
            card_locks: KeyedLocks::default(),
            sync_locks: KeyedLocks::default(),
            category_locks: KeyedLocks::default(),
        })
    }
}
