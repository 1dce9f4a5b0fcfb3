use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::envelope::MessageEnvelope;
use crate::jid::Jid;

/// Address of one message inside one chat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageKey {
    pub chat: Jid,
    pub id: String,
}

impl MessageKey {
    pub fn new(chat: Jid, id: impl Into<String>) -> Self {
        Self {
            chat,
            id: id.into(),
        }
    }
}

/// A chat message as observed (or sent) by the bot account.
///
/// Unique per `(account_id, key.chat, key.id)` and immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    #[serde(default)]
    pub account_id: i64,
    pub key: MessageKey,
    pub sender: Jid,
    #[serde(default)]
    pub is_from_me: bool,
    pub timestamp: DateTime<Utc>,
    pub payload: MessageEnvelope,
    /// Transport-native form of the event, kept as-is for replay
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

impl MessageEvent {
    pub fn id(&self) -> &str {
        &self.key.id
    }

    pub fn chat(&self) -> &Jid {
        &self.key.chat
    }

    /// Chat this event belongs to from the bot's point of view.
    ///
    /// Replies to the status feed are handled in the sender's direct chat.
    pub fn effective_chat(&self) -> Jid {
        if self.key.chat.is_status_broadcast() {
            self.sender.to_non_ad()
        } else {
            self.key.chat.clone()
        }
    }

    /// Account-level identity of the sender.
    pub fn sender_account(&self) -> Jid {
        self.sender.to_non_ad()
    }
}
