//! Access request persistence.
//!
//! The access request manager is the only writer. State changes go through
//! [`AccessRequestRepository::transition`], which only succeeds while the
//! request is still pending, so concurrent reactions cannot both win.

use async_trait::async_trait;
use message_store::Jid;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{AccessRequest, Decision, NewAccessRequest};

mod memory;
mod postgres;

pub use memory::InMemoryAccessRequestRepository;
pub use postgres::PgAccessRequestRepository;

#[async_trait]
pub trait AccessRequestRepository: Send + Sync {
    /// Request for a given view-once message in a scope, if one exists.
    async fn find_by_target(
        &self,
        account_id: i64,
        scope: &Jid,
        requested_message_id: &str,
    ) -> AppResult<Option<AccessRequest>>;

    /// Request whose prompt has the given id.
    async fn find_by_confirmation(
        &self,
        account_id: i64,
        scope: &Jid,
        confirm_message_id: &str,
    ) -> AppResult<Option<AccessRequest>>;

    /// Insert a pending request.
    ///
    /// Returns `None` when a request for the same target already exists in
    /// the scope; the existing row is left untouched.
    async fn insert_pending(&self, new: NewAccessRequest) -> AppResult<Option<AccessRequest>>;

    /// Move a pending request to its terminal state.
    ///
    /// Returns `false` when the request was already decided.
    async fn transition(&self, id: Uuid, decision: Decision) -> AppResult<bool>;

    async fn record_delivery_failure(&self, id: Uuid, error: &str) -> AppResult<()>;
}
