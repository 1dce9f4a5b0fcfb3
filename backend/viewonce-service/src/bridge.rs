//! HTTP client for the chat bridge sidecar.
//!
//! The sidecar owns the chat protocol session. This client only speaks its
//! small REST surface:
//!
//! - `GET  /session`
//! - `POST /chats/{chat}/messages/text`
//! - `PUT  /chats/{chat}/messages/{id}`
//! - `POST /chats/{chat}/messages/media`
//! - `POST /media/download?kind=`
//! - `POST /media/upload?kind=`
use async_trait::async_trait;
use bytes::Bytes;
use message_store::{Jid, MediaDescriptor, MediaKind};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use crate::config::BridgeConfig;
use crate::context::Account;
use crate::error::{AppError, AppResult};
use crate::transport::{ChatTransport, MediaRelay, OutgoingMedia, QuotedMessage};

#[derive(Clone)]
pub struct BridgeClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendTextRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a QuotedMessage>,
}

#[derive(Debug, Serialize)]
struct EditTextRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct SendMediaRequest<'a> {
    #[serde(flatten)]
    media: &'a OutgoingMedia,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a QuotedMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

impl BridgeClient {
    pub fn new(config: &BridgeConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Config(format!("bridge client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn chat_url(&self, chat: &Jid, rest: &str) -> String {
        format!(
            "{}/chats/{}/{}",
            self.base_url,
            urlencoding::encode(&chat.to_string()),
            rest
        )
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.header("Authorization", format!("Bearer {}", token)),
            None => request,
        }
    }

    /// Send a request and turn network failures and non-2xx answers into
    /// transport errors.
    async fn execute(&self, operation: &str, request: RequestBuilder) -> AppResult<Response> {
        let response = self.authorized(request).send().await.map_err(|e| {
            error!(operation, error = %e, "Bridge request failed");
            AppError::Transport(format!("{operation}: {e}"))
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        error!(operation, status = %status, body = %body, "Bridge returned error");
        Err(AppError::Transport(format!(
            "{operation} failed ({status}): {body}"
        )))
    }

    /// Fetch the account the bridge is logged in as.
    pub async fn fetch_session(&self) -> AppResult<Account> {
        let url = format!("{}/session", self.base_url);
        let response = self.execute("session", self.client.get(&url)).await?;
        Ok(response.json::<Account>().await?)
    }
}

#[async_trait]
impl ChatTransport for BridgeClient {
    async fn send_text(
        &self,
        chat: &Jid,
        text: &str,
        quoted: Option<&QuotedMessage>,
    ) -> AppResult<String> {
        let url = self.chat_url(chat, "messages/text");
        let body = SendTextRequest {
            text,
            reply_to: quoted,
        };

        let response = self
            .execute("send_text", self.client.post(&url).json(&body))
            .await?;
        let sent: SentMessage = response.json().await?;

        debug!(chat = %chat, message_id = %sent.id, "Text sent");
        Ok(sent.id)
    }

    async fn edit_text(&self, chat: &Jid, message_id: &str, text: &str) -> AppResult<()> {
        let url = self.chat_url(
            chat,
            &format!("messages/{}", urlencoding::encode(message_id)),
        );

        self.execute(
            "edit_text",
            self.client.put(&url).json(&EditTextRequest { text }),
        )
        .await?;

        debug!(chat = %chat, message_id = %message_id, "Text edited");
        Ok(())
    }

    async fn send_media(
        &self,
        chat: &Jid,
        media: &OutgoingMedia,
        quoted: Option<&QuotedMessage>,
    ) -> AppResult<String> {
        let url = self.chat_url(chat, "messages/media");
        let body = SendMediaRequest {
            media,
            reply_to: quoted,
        };

        let response = self
            .execute("send_media", self.client.post(&url).json(&body))
            .await?;
        let sent: SentMessage = response.json().await?;

        debug!(chat = %chat, message_id = %sent.id, kind = %media.kind, "Media sent");
        Ok(sent.id)
    }
}

#[async_trait]
impl MediaRelay for BridgeClient {
    async fn download(&self, descriptor: &MediaDescriptor, kind: MediaKind) -> AppResult<Bytes> {
        let url = format!("{}/media/download", self.base_url);
        let request = self
            .client
            .post(&url)
            .query(&[("kind", kind.as_str())])
            .json(descriptor);

        let response = self.execute("download", request).await?;
        let data = response.bytes().await?;

        debug!(kind = %kind, size = data.len(), "Media downloaded");
        Ok(data)
    }

    async fn upload(&self, data: Bytes, kind: MediaKind) -> AppResult<MediaDescriptor> {
        let url = format!("{}/media/upload", self.base_url);
        let size = data.len();
        let request = self
            .client
            .post(&url)
            .query(&[("kind", kind.as_str())])
            .header("Content-Type", "application/octet-stream")
            .body(data);

        let response = self.execute("upload", request).await?;
        let descriptor: MediaDescriptor = response.json().await?;

        debug!(kind = %kind, size, "Media uploaded");
        Ok(descriptor)
    }
}
