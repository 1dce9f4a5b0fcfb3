use async_trait::async_trait;
use chrono::Utc;
use message_store::Jid;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use super::AccessRequestRepository;
use crate::error::AppResult;
use crate::models::{AccessRequest, Decision, NewAccessRequest};

/// Vec-backed repository with the same uniqueness and compare-and-set rules
/// as the PostgreSQL table. Cloning shares the rows.
#[derive(Clone, Default)]
pub struct InMemoryAccessRequestRepository {
    rows: Arc<Mutex<Vec<AccessRequest>>>,
}

impl InMemoryAccessRequestRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every stored request, oldest first.
    pub fn all(&self) -> Vec<AccessRequest> {
        self.rows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn find(&self, predicate: impl Fn(&AccessRequest) -> bool) -> Option<AccessRequest> {
        self.rows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .rev()
            .find(|row| predicate(row))
            .cloned()
    }
}

#[async_trait]
impl AccessRequestRepository for InMemoryAccessRequestRepository {
    async fn find_by_target(
        &self,
        account_id: i64,
        scope: &Jid,
        requested_message_id: &str,
    ) -> AppResult<Option<AccessRequest>> {
        Ok(self.find(|row| {
            row.account_id == account_id
                && &row.scope_entity_id == scope
                && row.requested_message_id == requested_message_id
        }))
    }

    async fn find_by_confirmation(
        &self,
        account_id: i64,
        scope: &Jid,
        confirm_message_id: &str,
    ) -> AppResult<Option<AccessRequest>> {
        Ok(self.find(|row| {
            row.account_id == account_id
                && &row.scope_entity_id == scope
                && row.confirm_message_id == confirm_message_id
        }))
    }

    async fn insert_pending(&self, new: NewAccessRequest) -> AppResult<Option<AccessRequest>> {
        let mut rows = self
            .rows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let exists = rows.iter().any(|row| {
            row.account_id == new.account_id
                && row.scope_entity_id == new.scope_entity_id
                && row.requested_message_id == new.requested_message_id
        });
        if exists {
            return Ok(None);
        }

        let request = new.into_pending();
        rows.push(request.clone());
        Ok(Some(request))
    }

    async fn transition(&self, id: Uuid, decision: Decision) -> AppResult<bool> {
        let mut rows = self
            .rows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match rows
            .iter_mut()
            .find(|row| row.id == id && !row.state.is_terminal())
        {
            Some(row) => {
                row.state = decision.resulting_state();
                row.decided_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn record_delivery_failure(&self, id: Uuid, error: &str) -> AppResult<()> {
        let mut rows = self
            .rows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(row) = rows.iter_mut().find(|row| row.id == id) {
            row.delivery_error = Some(error.to_string());
        }
        Ok(())
    }
}
