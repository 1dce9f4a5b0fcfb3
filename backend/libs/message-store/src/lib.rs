//! # Message Store
//!
//! Append/lookup persistence for raw chat events, keyed by
//! `(account, chat, message id)`.
//!
//! Every message the bot receives or sends is appended here so that later
//! events can refer back to it by id: a reaction only carries the key of the
//! message it targets, and a pending access request only remembers the id of
//! the view-once message it is about.
//!
//! ## Semantics
//!
//! - **Append** is an idempotent put. Appending the same key twice keeps the
//!   last write; a given id is not expected to change content.
//! - **Lookup** of an unknown key is `Ok(None)`, never an error. Messages that
//!   predate the bot's observation window are simply absent.
//! - Errors are never retried here; callers decide what a failure means for
//!   the event they are processing.
//!
//! ## Implementations
//!
//! - [`PgMessageStore`]: PostgreSQL via sqlx (`messages` table)
//! - [`InMemoryMessageStore`]: process-local map, for tests and local runs

use async_trait::async_trait;

pub mod envelope;
mod error;
pub mod event;
pub mod jid;
mod memory;
mod postgres;

pub use envelope::{
    ContextInfo, MediaDescriptor, MediaKind, MediaMessage, MessageEnvelope, Payload,
    ReactionMessage, TargetKey, Unwrapped, ViewOnceMedia, WrapperKind, DEFAULT_UNWRAP_DEPTH,
};
pub use error::{InvalidJid, StoreError, StoreResult};
pub use event::{MessageEvent, MessageKey};
pub use jid::Jid;
pub use memory::InMemoryMessageStore;
pub use postgres::PgMessageStore;

/// DDL for the `messages` table used by [`PgMessageStore`].
pub const SCHEMA: &str = include_str!("../migrations/0001_create_messages.sql");

/// Persistence of chat events.
///
/// Implementations must be safe to share across worker tasks.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Store `event` under `(event.account_id, event.key.chat, event.key.id)`.
    async fn append(&self, event: &MessageEvent) -> StoreResult<()>;

    /// Load a previously appended event.
    ///
    /// Returns `Ok(None)` when nothing is stored under the key.
    async fn lookup(
        &self,
        account_id: i64,
        chat: &Jid,
        message_id: &str,
    ) -> StoreResult<Option<MessageEvent>>;
}
