//! Error types for the message store

use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// A string that is not a valid `user@server` identity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid jid: {0:?}")]
pub struct InvalidJid(pub String);

/// Errors that can occur while persisting or loading messages.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row could not be turned back into an event
    #[error("Corrupt message record: {0}")]
    CorruptRecord(String),
}

impl From<InvalidJid> for StoreError {
    fn from(e: InvalidJid) -> Self {
        StoreError::CorruptRecord(e.to_string())
    }
}
