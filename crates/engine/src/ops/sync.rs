//! Provider synchronization: account reconciliation, polling and webhooks.
//!
//! Every provider record is ingested through one path keyed by its external
//! id, so polling and webhook delivery can overlap and replay freely.

use uuid::Uuid;

use crate::{ErrorKind, Transaction};

mod connect;
mod ingest;
mod statement;
mod webhook;

/// Outcome of [`Engine::sync_user_data`](crate::Engine::sync_user_data).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub cards_synced: usize,
    pub imported: usize,
    pub duplicates: usize,
    pub failures: Vec<CardSyncFailure>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// One line per failed card, stored as the integration sync error.
    fn error_summary(&self) -> Option<String> {
        if self.failures.is_empty() {
            return None;
        }
        Some(
            self.failures
                .iter()
                .map(|f| format!("{}: {}", f.account_id, f.message))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }
}

/// A card whose sync failed, while its siblings carried on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CardSyncFailure {
    pub card_id: Uuid,
    pub account_id: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Result of [`Engine::handle_webhook`](crate::Engine::handle_webhook).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    Ingested(Transaction),
    /// The statement item was already stored.
    Duplicate,
    /// Not a statement event.
    Ignored,
}
