use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::envelope::{MessageEnvelope, DEFAULT_UNWRAP_DEPTH};
use crate::error::StoreResult;
use crate::event::{MessageEvent, MessageKey};
use crate::jid::Jid;
use crate::MessageStore;

/// PostgreSQL-backed store over the `messages` table.
///
/// Besides the structured payload, each row keeps the derived plain text in
/// `content` so that messages can be searched without decoding JSON.
#[derive(Clone)]
pub struct PgMessageStore {
    pool: PgPool,
    unwrap_depth: usize,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            unwrap_depth: DEFAULT_UNWRAP_DEPTH,
        }
    }

    /// Override the wrapper bound used when deriving `content`.
    pub fn with_unwrap_depth(mut self, unwrap_depth: usize) -> Self {
        self.unwrap_depth = unwrap_depth;
        self
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn append(&self, event: &MessageEvent) -> StoreResult<()> {
        let content = event.payload.plain_text(self.unwrap_depth);

        sqlx::query(
            r#"
            INSERT INTO messages (
                account_id,
                entity_jid,
                message_id,
                sender_jid,
                is_from_me,
                sent_at,
                payload,
                raw,
                content
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (account_id, entity_jid, message_id) DO UPDATE
            SET sender_jid = EXCLUDED.sender_jid,
                is_from_me = EXCLUDED.is_from_me,
                sent_at = EXCLUDED.sent_at,
                payload = EXCLUDED.payload,
                raw = EXCLUDED.raw,
                content = EXCLUDED.content
            "#,
        )
        .bind(event.account_id)
        .bind(event.key.chat.to_string())
        .bind(&event.key.id)
        .bind(event.sender.to_string())
        .bind(event.is_from_me)
        .bind(event.timestamp)
        .bind(Json(&event.payload))
        .bind(event.raw.as_ref().map(Json))
        .bind(content)
        .execute(&self.pool)
        .await?;

        debug!(
            account_id = event.account_id,
            chat = %event.key.chat,
            message_id = %event.key.id,
            "Message stored"
        );

        Ok(())
    }

    async fn lookup(
        &self,
        account_id: i64,
        chat: &Jid,
        message_id: &str,
    ) -> StoreResult<Option<MessageEvent>> {
        let row = sqlx::query(
            r#"
            SELECT sender_jid, is_from_me, sent_at, payload, raw
            FROM messages
            WHERE account_id = $1 AND entity_jid = $2 AND message_id = $3
            "#,
        )
        .bind(account_id)
        .bind(chat.to_string())
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            debug!(
                account_id,
                chat = %chat,
                message_id = %message_id,
                "Message not found"
            );
            return Ok(None);
        };

        let sender: String = row.try_get("sender_jid")?;
        let is_from_me: bool = row.try_get("is_from_me")?;
        let timestamp: DateTime<Utc> = row.try_get("sent_at")?;
        let Json(payload): Json<MessageEnvelope> = row.try_get("payload")?;
        let raw: Option<Json<serde_json::Value>> = row.try_get("raw")?;

        Ok(Some(MessageEvent {
            account_id,
            key: MessageKey::new(chat.clone(), message_id),
            sender: Jid::parse(&sender)?,
            is_from_me,
            timestamp,
            payload,
            raw: raw.map(|Json(value)| value),
        }))
    }
}
