//! The module contains the errors the engine can throw.
//!
//! The errors are:
//!
//! - [`InvalidPayload`] thrown when a webhook event misses a required field.
//! - [`InvalidStatus`] thrown when a stored status tag is not known.
//! - [`Database`] thrown when the store fails; the only retryable kind.
//!
//!  [`InvalidPayload`]: EngineError::InvalidPayload
//!  [`InvalidStatus`]: EngineError::InvalidStatus
//!  [`Database`]: EngineError::Database
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("Invalid status: {0}")]
    InvalidStatus(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl EngineError {
    /// Whether the caller should ask the sender to deliver the event again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidPayload(a), Self::InvalidPayload(b)) => a == b,
            (Self::InvalidStatus(a), Self::InvalidStatus(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
