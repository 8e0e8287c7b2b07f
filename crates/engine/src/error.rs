//! The module contains the error the engine can throw.
//!
//! Every variant belongs to one [`ErrorKind`], which callers use to map a
//! failure onto a transport status without matching every variant:
//!
//! - [`NotFound`] the referenced user, card, category, transaction or
//!   integration does not exist.
//! - [`Unauthorized`] the item exists but belongs to another user.
//! - [`Validation`] the input is malformed. A category whose kind differs
//!   from the transaction or parent it is attached to is reported here too,
//!   as `InvalidTransaction` or `InvalidCategory`, since the request can be
//!   fixed by the caller alone.
//! - [`Conflict`] the input is well formed but violates a ledger or
//!   hierarchy invariant.
//! - [`Provider`] the external banking API refused or failed the call.
//! - [`Internal`] storage or serialization failures.
//!
//!  [`NotFound`]: ErrorKind::NotFound
//!  [`Unauthorized`]: ErrorKind::Unauthorized
//!  [`Validation`]: ErrorKind::Validation
//!  [`Conflict`]: ErrorKind::Conflict
//!  [`Provider`]: ErrorKind::Provider
//!  [`Internal`]: ErrorKind::Internal
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("User not found: {0}")]
    UserNotFound(String),
    #[error("Card not found: {0}")]
    CardNotFound(String),
    #[error("Category not found: {0}")]
    CategoryNotFound(String),
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("Provider integration not found: {0}")]
    IntegrationNotFound(String),
    #[error("No card linked to provider account \"{0}\"")]
    UnknownAccount(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Invalid user: {0}")]
    InvalidUser(String),
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("Invalid category: {0}")]
    InvalidCategory(String),
    #[error("Invalid card: {0}")]
    InvalidCard(String),
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),
    #[error("Invalid webhook payload: {0}")]
    InvalidWebhook(String),
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("Circular reference: {0}")]
    CircularReference(String),
    #[error("Cannot modify imported transaction: {0}")]
    CannotModifyExternal(String),
    #[error("Operation not allowed on provider card: {0}")]
    ProviderCard(String),
    #[error("\"{0}\" already present!")]
    ExistingKey(String),
    #[error("Provider token is invalid or revoked")]
    TokenInvalid,
    #[error("Provider rate limit reached")]
    RateLimited { retry_after: Option<u64> },
    #[error("Provider API error: {0}")]
    ProviderApi(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Database(#[from] DbErr),
}

/// Coarse classification of an [`EngineError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Unauthorized,
    Validation,
    Conflict,
    Provider,
    Internal,
}

impl ErrorKind {
    /// Stable machine readable code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Unauthorized => "unauthorized",
            Self::Validation => "validation",
            Self::Conflict => "conflict",
            Self::Provider => "provider",
            Self::Internal => "internal",
        }
    }
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UserNotFound(_)
            | Self::CardNotFound(_)
            | Self::CategoryNotFound(_)
            | Self::TransactionNotFound(_)
            | Self::IntegrationNotFound(_)
            | Self::UnknownAccount(_) => ErrorKind::NotFound,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::InvalidUser(_)
            | Self::InvalidTransaction(_)
            | Self::InvalidCategory(_)
            | Self::InvalidCard(_)
            | Self::InvalidCursor(_)
            | Self::InvalidWebhook(_) => ErrorKind::Validation,
            Self::InsufficientFunds(_)
            | Self::CircularReference(_)
            | Self::CannotModifyExternal(_)
            | Self::ProviderCard(_)
            | Self::ExistingKey(_) => ErrorKind::Conflict,
            Self::TokenInvalid
            | Self::RateLimited { .. }
            | Self::ProviderApi(_)
            | Self::Http(_) => ErrorKind::Provider,
            Self::Serialization(_) | Self::Database(_) => ErrorKind::Internal,
        }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::UserNotFound(a), Self::UserNotFound(b)) => a == b,
            (Self::CardNotFound(a), Self::CardNotFound(b)) => a == b,
            (Self::CategoryNotFound(a), Self::CategoryNotFound(b)) => a == b,
            (Self::TransactionNotFound(a), Self::TransactionNotFound(b)) => a == b,
            (Self::IntegrationNotFound(a), Self::IntegrationNotFound(b)) => a == b,
            (Self::UnknownAccount(a), Self::UnknownAccount(b)) => a == b,
            (Self::Unauthorized(a), Self::Unauthorized(b)) => a == b,
            (Self::InvalidUser(a), Self::InvalidUser(b)) => a == b,
            (Self::InvalidTransaction(a), Self::InvalidTransaction(b)) => a == b,
            (Self::InvalidCategory(a), Self::InvalidCategory(b)) => a == b,
            (Self::InvalidCard(a), Self::InvalidCard(b)) => a == b,
            (Self::InvalidCursor(a), Self::InvalidCursor(b)) => a == b,
            (Self::InvalidWebhook(a), Self::InvalidWebhook(b)) => a == b,
            (Self::InsufficientFunds(a), Self::InsufficientFunds(b)) => a == b,
            (Self::CircularReference(a), Self::CircularReference(b)) => a == b,
            (Self::CannotModifyExternal(a), Self::CannotModifyExternal(b)) => a == b,
            (Self::ProviderCard(a), Self::ProviderCard(b)) => a == b,
            (Self::ExistingKey(a), Self::ExistingKey(b)) => a == b,
            (Self::TokenInvalid, Self::TokenInvalid) => true,
            (Self::RateLimited { retry_after: a }, Self::RateLimited { retry_after: b }) => a == b,
            (Self::ProviderApi(a), Self::ProviderApi(b)) => a == b,
            (Self::Http(a), Self::Http(b)) => a.to_string() == b.to_string(),
            (Self::Serialization(a), Self::Serialization(b)) => a.to_string() == b.to_string(),
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_group_variants() {
        assert_eq!(
            EngineError::CardNotFound("x".to_string()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            EngineError::CircularReference("x".to_string()).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            EngineError::RateLimited { retry_after: Some(60) }.kind(),
            ErrorKind::Provider
        );
        assert_eq!(
            EngineError::Database(DbErr::Custom("boom".to_string())).kind(),
            ErrorKind::Internal
        );
        assert_eq!(
            EngineError::InvalidTransaction("category kind".to_string()).kind(),
            ErrorKind::Validation
        );
        let malformed = serde_json::from_str::<u8>("x").unwrap_err();
        assert_eq!(EngineError::from(malformed).kind(), ErrorKind::Internal);
        assert_eq!(ErrorKind::Validation.code(), "validation");
    }
}
