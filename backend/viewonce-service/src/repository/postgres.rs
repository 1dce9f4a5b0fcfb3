use async_trait::async_trait;
use message_store::Jid;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use super::AccessRequestRepository;
use crate::error::{AppError, AppResult};
use crate::models::{AccessRequest, Decision, NewAccessRequest, RequestState};

const COLUMNS: &str = "id, account_id, scope_entity_id, requester_jid, requested_message_id, \
                       confirm_message_id, accepted, created_at, decided_at, delivery_error";

#[derive(Clone)]
pub struct PgAccessRequestRepository {
    pool: PgPool,
}

impl PgAccessRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_jid(row: &PgRow, column: &str) -> AppResult<Jid> {
    let value: String = row.try_get(column)?;
    Jid::parse(&value).map_err(|e| AppError::Persistence(format!("{column}: {e}")))
}

fn map_row(row: &PgRow) -> AppResult<AccessRequest> {
    Ok(AccessRequest {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        scope_entity_id: parse_jid(row, "scope_entity_id")?,
        requester_jid: parse_jid(row, "requester_jid")?,
        requested_message_id: row.try_get("requested_message_id")?,
        confirm_message_id: row.try_get("confirm_message_id")?,
        state: RequestState::from_accepted(row.try_get("accepted")?),
        created_at: row.try_get("created_at")?,
        decided_at: row.try_get("decided_at")?,
        delivery_error: row.try_get("delivery_error")?,
    })
}

#[async_trait]
impl AccessRequestRepository for PgAccessRequestRepository {
    async fn find_by_target(
        &self,
        account_id: i64,
        scope: &Jid,
        requested_message_id: &str,
    ) -> AppResult<Option<AccessRequest>> {
        let query = format!(
            "SELECT {COLUMNS} FROM access_requests \
             WHERE account_id = $1 AND scope_entity_id = $2 AND requested_message_id = $3"
        );

        let row = sqlx::query(&query)
            .bind(account_id)
            .bind(scope.to_string())
            .bind(requested_message_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(map_row).transpose()
    }

    async fn find_by_confirmation(
        &self,
        account_id: i64,
        scope: &Jid,
        confirm_message_id: &str,
    ) -> AppResult<Option<AccessRequest>> {
        let query = format!(
            "SELECT {COLUMNS} FROM access_requests \
             WHERE account_id = $1 AND scope_entity_id = $2 AND confirm_message_id = $3 \
             ORDER BY created_at DESC LIMIT 1"
        );

        let row = sqlx::query(&query)
            .bind(account_id)
            .bind(scope.to_string())
            .bind(confirm_message_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(map_row).transpose()
    }

    async fn insert_pending(&self, new: NewAccessRequest) -> AppResult<Option<AccessRequest>> {
        let query = format!(
            "INSERT INTO access_requests (\
                 id, account_id, scope_entity_id, requester_jid, \
                 requested_message_id, confirm_message_id\
             ) VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (account_id, scope_entity_id, requested_message_id) DO NOTHING \
             RETURNING {COLUMNS}"
        );

        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(new.account_id)
            .bind(new.scope_entity_id.to_string())
            .bind(new.requester_jid.to_string())
            .bind(&new.requested_message_id)
            .bind(&new.confirm_message_id)
            .fetch_optional(&self.pool)
            .await?;

        if row.is_none() {
            debug!(
                scope = %new.scope_entity_id,
                requested_message_id = %new.requested_message_id,
                "Access request already exists"
            );
        }

        row.as_ref().map(map_row).transpose()
    }

    async fn transition(&self, id: Uuid, decision: Decision) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE access_requests
            SET accepted = $2, decided_at = NOW()
            WHERE id = $1 AND accepted IS NULL
            "#,
        )
        .bind(id)
        .bind(decision.resulting_state().as_accepted())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_delivery_failure(&self, id: Uuid, error: &str) -> AppResult<()> {
        sqlx::query("UPDATE access_requests SET delivery_error = $2 WHERE id = $1")
            .bind(id)
            .bind(error)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
