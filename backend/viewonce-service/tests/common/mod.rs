//! Shared fixtures and recording mocks for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use message_store::{
    ContextInfo, InMemoryMessageStore, Jid, MediaDescriptor, MediaKind, MediaMessage,
    MessageEnvelope, MessageEvent, MessageKey, MessageStore, StoreError, StoreResult, TargetKey,
    WrapperKind,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use viewonce_service::context::{Account, BotContext};
use viewonce_service::error::{AppError, AppResult};
use uuid::Uuid;
use viewonce_service::models::{AccessRequest, Decision, NewAccessRequest, ReactionEvent};
use viewonce_service::repository::{AccessRequestRepository, InMemoryAccessRequestRepository};
use viewonce_service::services::{AccessRequestManager, RequestSettings};
use viewonce_service::transport::{ChatTransport, MediaRelay, OutgoingMedia, QuotedMessage};

pub const ACCOUNT_ID: i64 = 1;
pub const ORIGINAL_BYTES: &[u8] = b"original-view-once-bytes";

pub fn jid(value: &str) -> Jid {
    Jid::parse(value).unwrap()
}

pub fn bot() -> Jid {
    jid("628000:5@s.whatsapp.net")
}

pub fn group() -> Jid {
    jid("120363025246125486@g.us")
}

/// Owner of the view-once media (sends from a linked device)
pub fn alice() -> Jid {
    jid("628111:3@s.whatsapp.net")
}

/// Requester
pub fn bob() -> Jid {
    jid("628222@s.whatsapp.net")
}

/// Bystander
pub fn carol() -> Jid {
    jid("628333@s.whatsapp.net")
}

pub fn context() -> BotContext {
    BotContext::new(Account {
        id: ACCOUNT_ID,
        jid: bot(),
        push_name: Some("Kano".to_string()),
    })
}

pub fn descriptor(path: &str) -> MediaDescriptor {
    MediaDescriptor {
        direct_path: path.to_string(),
        url: None,
        media_key: "bWVkaWEta2V5".to_string(),
        file_sha256: None,
        file_enc_sha256: None,
        file_length: Some(ORIGINAL_BYTES.len() as u64),
    }
}

pub fn event(id: &str, sender: Jid, payload: MessageEnvelope) -> MessageEvent {
    MessageEvent {
        account_id: ACCOUNT_ID,
        key: MessageKey::new(group(), id),
        sender,
        is_from_me: false,
        timestamp: Utc::now(),
        payload,
        raw: None,
    }
}

pub fn image(view_once: bool) -> MessageEnvelope {
    MessageEnvelope::media(
        MediaKind::Image,
        MediaMessage {
            descriptor: descriptor("/v/t62.7118-24/original"),
            caption: Some("secret".to_string()),
            mimetype: Some("image/jpeg".to_string()),
            view_once,
            context: None,
        },
    )
}

/// Alice's view-once image in the group.
pub fn view_once_image(id: &str) -> MessageEvent {
    event(
        id,
        alice(),
        MessageEnvelope::wrapped(WrapperKind::ViewOnceV2, image(true)),
    )
}

/// A `.vo` reply from `sender` quoting `target`.
pub fn request(id: &str, sender: Jid, target: &MessageEvent) -> MessageEvent {
    event(
        id,
        sender,
        MessageEnvelope::reply(
            ".vo",
            ContextInfo {
                stanza_id: Some(target.key.id.clone()),
                participant: Some(target.sender.clone()),
                quoted: Some(Box::new(target.payload.clone())),
            },
        ),
    )
}

pub fn reaction(reactor: Jid, prompt_id: &str, emoji: &str) -> ReactionEvent {
    ReactionEvent {
        account_id: ACCOUNT_ID,
        chat: group(),
        reactor: reactor.to_non_ad(),
        target: TargetKey {
            chat: group(),
            id: prompt_id.to_string(),
            participant: None,
            from_me: true,
        },
        emoji: emoji.to_string(),
    }
}

/// Raw reaction message as it would arrive from the bridge.
pub fn reaction_message(id: &str, reactor: Jid, prompt_id: &str, emoji: &str) -> MessageEvent {
    let key = reaction(reactor.clone(), prompt_id, emoji).target;
    event(id, reactor, MessageEnvelope::reaction(key, emoji))
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text {
        chat: Jid,
        id: String,
        text: String,
        quoted: Option<String>,
    },
    Media {
        chat: Jid,
        id: String,
        media: OutgoingMedia,
        quoted: Option<String>,
    },
}

#[derive(Clone, Default)]
pub struct RecordingTransport {
    pub sent: Arc<Mutex<Vec<Sent>>>,
    pub edits: Arc<Mutex<Vec<(Jid, String, String)>>>,
    pub fail_sends: Arc<AtomicBool>,
    next_id: Arc<AtomicUsize>,
}

impl RecordingTransport {
    fn next_id(&self) -> String {
        format!("BOT{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|s| match s {
                Sent::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_text(&self) -> Option<String> {
        self.texts().pop()
    }

    pub fn media(&self) -> Vec<(Jid, OutgoingMedia, Option<String>)> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|s| match s {
                Sent::Media {
                    chat,
                    media,
                    quoted,
                    ..
                } => Some((chat.clone(), media.clone(), quoted.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn edits(&self) -> Vec<(Jid, String, String)> {
        self.edits.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_text(
        &self,
        chat: &Jid,
        text: &str,
        quoted: Option<&QuotedMessage>,
    ) -> AppResult<String> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(AppError::Transport("send_text failed (503)".into()));
        }
        let id = self.next_id();
        self.sent.lock().unwrap().push(Sent::Text {
            chat: chat.clone(),
            id: id.clone(),
            text: text.to_string(),
            quoted: quoted.map(|q| q.id.clone()),
        });
        Ok(id)
    }

    async fn edit_text(&self, chat: &Jid, message_id: &str, text: &str) -> AppResult<()> {
        self.edits
            .lock()
            .unwrap()
            .push((chat.clone(), message_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn send_media(
        &self,
        chat: &Jid,
        media: &OutgoingMedia,
        quoted: Option<&QuotedMessage>,
    ) -> AppResult<String> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(AppError::Transport("send_media failed (503)".into()));
        }
        let id = self.next_id();
        self.sent.lock().unwrap().push(Sent::Media {
            chat: chat.clone(),
            id: id.clone(),
            media: media.clone(),
            quoted: quoted.map(|q| q.id.clone()),
        });
        Ok(id)
    }
}

#[derive(Clone, Default)]
pub struct RecordingRelay {
    pub downloads: Arc<Mutex<Vec<(MediaDescriptor, MediaKind)>>>,
    pub uploads: Arc<Mutex<Vec<(Bytes, MediaKind)>>>,
    pub fail_download: Arc<AtomicBool>,
}

impl RecordingRelay {
    pub fn download_count(&self) -> usize {
        self.downloads.lock().unwrap().len()
    }

    pub fn uploads(&self) -> Vec<(Bytes, MediaKind)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaRelay for RecordingRelay {
    async fn download(&self, descriptor: &MediaDescriptor, kind: MediaKind) -> AppResult<Bytes> {
        self.downloads
            .lock()
            .unwrap()
            .push((descriptor.clone(), kind));
        if self.fail_download.load(Ordering::SeqCst) {
            return Err(AppError::Transport("download failed (404): media expired".into()));
        }
        Ok(Bytes::from_static(ORIGINAL_BYTES))
    }

    async fn upload(&self, data: Bytes, kind: MediaKind) -> AppResult<MediaDescriptor> {
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push((data, kind));
        Ok(descriptor(&format!("/uploaded/{}", uploads.len())))
    }
}

fn store_down() -> StoreError {
    StoreError::Database(sqlx::Error::PoolTimedOut)
}

/// Message store whose writes and reads can be made to fail.
///
/// Bot-sent messages (`is_from_me`) and everything else fail independently.
#[derive(Clone, Default)]
pub struct FlakyStore {
    pub inner: InMemoryMessageStore,
    pub fail_own_appends: Arc<AtomicBool>,
    pub fail_other_appends: Arc<AtomicBool>,
    pub fail_lookups: Arc<AtomicBool>,
}

#[async_trait]
impl MessageStore for FlakyStore {
    async fn append(&self, event: &MessageEvent) -> StoreResult<()> {
        let failing = if event.is_from_me {
            &self.fail_own_appends
        } else {
            &self.fail_other_appends
        };
        if failing.load(Ordering::SeqCst) {
            return Err(store_down());
        }
        self.inner.append(event).await
    }

    async fn lookup(
        &self,
        account_id: i64,
        chat: &Jid,
        message_id: &str,
    ) -> StoreResult<Option<MessageEvent>> {
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(store_down());
        }
        self.inner.lookup(account_id, chat, message_id).await
    }
}

/// Access request repository whose inserts can be made to fail.
#[derive(Clone, Default)]
pub struct FlakyRequests {
    pub inner: InMemoryAccessRequestRepository,
    pub fail_inserts: Arc<AtomicBool>,
}

#[async_trait]
impl AccessRequestRepository for FlakyRequests {
    async fn find_by_target(
        &self,
        account_id: i64,
        scope: &Jid,
        requested_message_id: &str,
    ) -> AppResult<Option<AccessRequest>> {
        self.inner
            .find_by_target(account_id, scope, requested_message_id)
            .await
    }

    async fn find_by_confirmation(
        &self,
        account_id: i64,
        scope: &Jid,
        confirm_message_id: &str,
    ) -> AppResult<Option<AccessRequest>> {
        self.inner
            .find_by_confirmation(account_id, scope, confirm_message_id)
            .await
    }

    async fn insert_pending(&self, new: NewAccessRequest) -> AppResult<Option<AccessRequest>> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(AppError::Persistence("connection reset".into()));
        }
        self.inner.insert_pending(new).await
    }

    async fn transition(&self, id: Uuid, decision: Decision) -> AppResult<bool> {
        self.inner.transition(id, decision).await
    }

    async fn record_delivery_failure(&self, id: Uuid, error: &str) -> AppResult<()> {
        self.inner.record_delivery_failure(id, error).await
    }
}

/// Manager wired to in-memory storage and recording mocks.
///
/// `store` and `requests` are the backing in-memory state; the manager goes
/// through `flaky_store` and `flaky_requests`, which pass everything through
/// until a failure flag is set.
pub struct Harness {
    pub store: InMemoryMessageStore,
    pub requests: InMemoryAccessRequestRepository,
    pub flaky_store: FlakyStore,
    pub flaky_requests: FlakyRequests,
    pub transport: RecordingTransport,
    pub relay: RecordingRelay,
    pub manager: Arc<AccessRequestManager>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(RequestSettings::default())
    }

    pub fn with_settings(settings: RequestSettings) -> Self {
        let store = InMemoryMessageStore::new();
        let requests = InMemoryAccessRequestRepository::new();
        let transport = RecordingTransport::default();
        let relay = RecordingRelay::default();

        let flaky_store = FlakyStore {
            inner: store.clone(),
            ..FlakyStore::default()
        };
        let flaky_requests = FlakyRequests {
            inner: requests.clone(),
            ..FlakyRequests::default()
        };

        let manager = Arc::new(AccessRequestManager::new(
            context(),
            Arc::new(flaky_store.clone()),
            Arc::new(flaky_requests.clone()),
            Arc::new(transport.clone()),
            Arc::new(relay.clone()),
            settings,
        ));

        Self {
            store,
            requests,
            flaky_store,
            flaky_requests,
            transport,
            relay,
            manager,
        }
    }
}
