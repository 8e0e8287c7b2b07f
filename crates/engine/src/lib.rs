//! Ledger engine of a personal-finance tracker.
//!
//! The engine owns three concerns on top of a sea-orm database:
//!
//! - the **ledger**: manual transactions keep `Card::balance` consistent and
//!   never let it drop below `-credit_limit`;
//! - the **category tree**: per-user hierarchies without cycles, with one
//!   kind per subtree;
//! - **provider sync**: mirroring bank accounts and statements from the
//!   provider API, by polling or webhook, with idempotent ingestion.
//!
//! Everything goes through [`Engine`], built with [`Engine::builder`].

pub use cards::{Card, NewCard, UpdateCard};
pub use categories::{Category, CategoryNode, NewCategory, default_categories};
pub use currency::Currency;
pub use error::{EngineError, ErrorKind};
pub use ops::{
    CardSyncFailure, Engine, EngineBuilder, SyncReport, TransactionFilter, WebhookOutcome,
};
pub use provider::{
    Account, ClientInfo, ProviderConfig, StatementItem, StatementItemEvent, WebhookEnvelope,
};
pub use provider_integrations::ProviderStatus;
pub use transactions::{
    NewTransaction, Provenance, Transaction, TransactionKind, UpdateTransaction,
};
pub use users::User;

mod cards;
mod categories;
mod currency;
mod error;
mod locks;
mod ops;
mod provider;
mod provider_integrations;
mod transactions;
mod users;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
