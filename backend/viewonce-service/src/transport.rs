//! Seams to the chat transport and the media relay.
//!
//! Both live outside this service. The production implementation is the
//! HTTP bridge client in [`crate::bridge`]; tests substitute recording mocks.

use async_trait::async_trait;
use bytes::Bytes;
use message_store::{Jid, MediaDescriptor, MediaKind, MessageEvent};
use serde::Serialize;

use crate::error::AppResult;

/// Message a bot reply quotes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotedMessage {
    pub id: String,
    pub sender: Jid,
}

impl From<&MessageEvent> for QuotedMessage {
    fn from(event: &MessageEvent) -> Self {
        Self {
            id: event.key.id.clone(),
            sender: event.sender.clone(),
        }
    }
}

/// Media that has already been uploaded and is ready to be sent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingMedia {
    pub kind: MediaKind,
    pub descriptor: MediaDescriptor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    pub mimetype: String,
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a text message and return its transport-assigned id.
    async fn send_text(
        &self,
        chat: &Jid,
        text: &str,
        quoted: Option<&QuotedMessage>,
    ) -> AppResult<String>;

    async fn edit_text(&self, chat: &Jid, message_id: &str, text: &str) -> AppResult<()>;

    /// Send previously uploaded media and return the message id.
    async fn send_media(
        &self,
        chat: &Jid,
        media: &OutgoingMedia,
        quoted: Option<&QuotedMessage>,
    ) -> AppResult<String>;
}

#[async_trait]
pub trait MediaRelay: Send + Sync {
    /// Fetch and decrypt the original bytes behind a descriptor.
    async fn download(&self, descriptor: &MediaDescriptor, kind: MediaKind) -> AppResult<Bytes>;

    /// Upload bytes and return a fresh descriptor for them.
    async fn upload(&self, data: Bytes, kind: MediaKind) -> AppResult<MediaDescriptor>;
}
