//! Access request lifecycle
//!
//! A member asks to open someone else's view-once media by replying to it
//! with the request command. The bot posts a prompt, and the owner of the
//! media answers by reacting to that prompt:
//!
//! ```text
//! request ──► Pending ──(owner reacts accept)──► Accepted ──► media delivered
//!                    └──(owner reacts deny)────► Denied
//! ```
//!
//! ## Guarantees
//!
//! - At most one request per (scope, target message). Repeated requests
//!   report the existing state instead of creating a second row.
//! - Only the sender of the target message can decide. Reactions from anyone
//!   else are dropped without a reply.
//! - A decision is written with a compare-and-set. Once a request is
//!   Accepted or Denied, later reactions are no-ops and media is never
//!   delivered twice for the same request.
//! - Requesting your own view-once media skips the protocol and delivers
//!   directly.
//! - A request row is written only after both the requested message and
//!   the prompt are in the message store. If either cannot be stored the
//!   command fails and can simply be sent again.
//!
//! Delivery failures after acceptance do not move the request out of
//! `Accepted`; they are recorded in `delivery_error`.

use chrono::Utc;
use message_store::{
    ContextInfo, Jid, MediaKind, MediaMessage, MessageEnvelope, MessageEvent, MessageKey,
    MessageStore, DEFAULT_UNWRAP_DEPTH,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::DeliveryTarget;
use crate::context::BotContext;
use crate::error::AppResult;
use crate::models::{AccessRequest, Decision, NewAccessRequest, ReactionEvent, RequestState};
use crate::repository::AccessRequestRepository;
use crate::services::correlator::Correlator;
use crate::transport::{ChatTransport, MediaRelay, OutgoingMedia, QuotedMessage};

pub const NOT_A_REPLY: &str = "Reply to the view-once message you want to open.";
pub const NOT_VIEW_ONCE: &str = "That is not a view-once message.";
pub const REQUEST_DENIED: &str = "Request denied.";
pub const REQUEST_APPROVED: &str = "Request approved! Please wait…";
pub const DOWNLOAD_FAILED: &str = "Failed to download the media.";
pub const SAVE_FAILED: &str = "Failed to save the request.";

/// Reply for a request that already exists.
pub fn already_requested(state: RequestState) -> String {
    let detail = match state {
        RequestState::Accepted => " and it was approved",
        RequestState::Denied => " but it was denied",
        RequestState::Pending => ", still waiting for approval",
    };
    format!("Already requested{detail}")
}

#[derive(Debug, Clone)]
pub struct RequestSettings {
    pub accept_token: String,
    pub deny_token: String,
    pub unwrap_depth: usize,
    pub delivery_target: DeliveryTarget,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            accept_token: "✅".to_string(),
            deny_token: "❌".to_string(),
            unwrap_depth: DEFAULT_UNWRAP_DEPTH,
            delivery_target: DeliveryTarget::Chat,
        }
    }
}

impl RequestSettings {
    /// Exact-match the reaction text against the two tokens.
    pub fn decision(&self, emoji: &str) -> Option<Decision> {
        if emoji == self.accept_token {
            Some(Decision::Accept)
        } else if emoji == self.deny_token {
            Some(Decision::Deny)
        } else {
            None
        }
    }

    pub fn prompt(&self) -> String {
        format!(
            "React to this message with {} to approve or {} to deny.",
            self.accept_token, self.deny_token
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    /// The command did not quote anything
    NotAReply,
    NotViewOnce,
    /// Requester owns the media; delivered without a request
    SelfAccess(FulfillOutcome),
    AlreadyRequested(RequestState),
    Requested(AccessRequest),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The reacted message was never seen by the bot
    UnknownMessage,
    /// The reacted message is not a prompt
    NoRequest,
    AlreadyDecided,
    /// The requested message is no longer in the store
    TargetMissing,
    /// Reactor does not own the requested media
    NotOwner,
    UnknownEmoji,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReactionOutcome {
    Ignored(IgnoreReason),
    Denied {
        request_id: Uuid,
    },
    Accepted {
        request_id: Uuid,
        delivery: FulfillOutcome,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FulfillOutcome {
    Delivered {
        chat: Jid,
        message_id: String,
        kind: MediaKind,
    },
    NotViewOnce,
    Failed {
        error: String,
    },
}

pub struct AccessRequestManager {
    context: BotContext,
    store: Arc<dyn MessageStore>,
    requests: Arc<dyn AccessRequestRepository>,
    transport: Arc<dyn ChatTransport>,
    relay: Arc<dyn MediaRelay>,
    correlator: Correlator,
    settings: RequestSettings,
}

impl AccessRequestManager {
    pub fn new(
        context: BotContext,
        store: Arc<dyn MessageStore>,
        requests: Arc<dyn AccessRequestRepository>,
        transport: Arc<dyn ChatTransport>,
        relay: Arc<dyn MediaRelay>,
        settings: RequestSettings,
    ) -> Self {
        let correlator = Correlator::new(context.clone(), store.clone(), settings.unwrap_depth);

        Self {
            context,
            store,
            requests,
            transport,
            relay,
            correlator,
            settings,
        }
    }

    pub fn settings(&self) -> &RequestSettings {
        &self.settings
    }

    /// Handle a request command: find and store the quoted message, then
    /// [`Self::create`].
    ///
    /// A quoted message that cannot be stored aborts the request.
    pub async fn handle_request(&self, request: &MessageEvent) -> AppResult<CreateOutcome> {
        let chat = request.effective_chat();
        let quoted = QuotedMessage::from(request);

        let target = match self.correlator.resolve_reply(request, true).await {
            Ok(Some(target)) => target,
            Ok(None) => {
                debug!(
                    chat = %chat,
                    message_id = %request.id(),
                    "Request command without a quoted message"
                );
                self.send_notice(&chat, NOT_A_REPLY, Some(&quoted)).await?;
                return Ok(CreateOutcome::NotAReply);
            }
            Err(e) => {
                error!(chat = %chat, message_id = %request.id(), error = %e, "Failed to store requested message");
                self.notify(&chat, SAVE_FAILED, Some(&quoted)).await;
                return Err(e);
            }
        };

        self.create(request, &target).await
    }

    /// Open an access request from `request`'s sender for `target`.
    pub async fn create(
        &self,
        request: &MessageEvent,
        target: &MessageEvent,
    ) -> AppResult<CreateOutcome> {
        let requester = request.sender_account();
        let scope = request.effective_chat();
        let quoted = QuotedMessage::from(request);

        if requester.same_account(&target.sender) {
            info!(
                chat = %scope,
                requester = %requester,
                target_id = %target.id(),
                "Requester owns the media, delivering directly"
            );
            let delivery = self
                .fulfill(target, &requester, &scope, Some(&quoted))
                .await;
            return Ok(CreateOutcome::SelfAccess(delivery));
        }

        let unwrapped = target.payload.unwrap_bounded(self.settings.unwrap_depth);
        if unwrapped.view_once_media().is_none() {
            debug!(
                chat = %scope,
                target_id = %target.id(),
                depth = unwrapped.depth,
                "Requested message is not view-once media"
            );
            self.send_notice(&scope, NOT_VIEW_ONCE, Some(&quoted)).await?;
            return Ok(CreateOutcome::NotViewOnce);
        }

        let account_id = self.context.account_id();
        if let Some(existing) = self
            .requests
            .find_by_target(account_id, &scope, target.id())
            .await?
        {
            debug!(
                request_id = %existing.id,
                state = ?existing.state,
                "Access request already exists"
            );
            self.send_notice(&scope, &already_requested(existing.state), Some(&quoted))
                .await?;
            return Ok(CreateOutcome::AlreadyRequested(existing.state));
        }

        let confirm_message_id = self.send_prompt(&scope, &quoted).await?;

        let new = NewAccessRequest {
            account_id,
            scope_entity_id: scope.clone(),
            requester_jid: requester.clone(),
            requested_message_id: target.id().to_string(),
            confirm_message_id,
        };

        match self.requests.insert_pending(new).await {
            Ok(Some(created)) => {
                info!(
                    request_id = %created.id,
                    chat = %scope,
                    requester = %requester,
                    target_id = %created.requested_message_id,
                    confirm_id = %created.confirm_message_id,
                    "Access request created"
                );
                Ok(CreateOutcome::Requested(created))
            }
            Ok(None) => {
                // A concurrent request for the same target won the insert.
                self.send_notice(
                    &scope,
                    &already_requested(RequestState::Pending),
                    Some(&quoted),
                )
                .await?;
                Ok(CreateOutcome::AlreadyRequested(RequestState::Pending))
            }
            Err(e) => {
                error!(chat = %scope, error = %e, "Failed to save access request");
                self.notify(&scope, SAVE_FAILED, Some(&quoted)).await;
                Err(e)
            }
        }
    }

    /// Apply an owner's reaction to the prompt it targets.
    pub async fn on_reaction(&self, reaction: &ReactionEvent) -> AppResult<ReactionOutcome> {
        let Some(reacted) = self.correlator.resolve_reacted(reaction).await? else {
            return Ok(ReactionOutcome::Ignored(IgnoreReason::UnknownMessage));
        };

        let Some(request) = self
            .requests
            .find_by_confirmation(reaction.account_id, &reaction.chat, reacted.id())
            .await?
        else {
            return Ok(ReactionOutcome::Ignored(IgnoreReason::NoRequest));
        };

        if request.state.is_terminal() {
            debug!(request_id = %request.id, state = ?request.state, "Request already decided");
            return Ok(ReactionOutcome::Ignored(IgnoreReason::AlreadyDecided));
        }

        let Some(target) = self
            .store
            .lookup(
                request.account_id,
                &request.scope_entity_id,
                &request.requested_message_id,
            )
            .await?
        else {
            warn!(
                request_id = %request.id,
                target_id = %request.requested_message_id,
                "Requested message missing from store"
            );
            return Ok(ReactionOutcome::Ignored(IgnoreReason::TargetMissing));
        };

        if !reaction.reactor.same_account(&target.sender) {
            debug!(
                request_id = %request.id,
                reactor = %reaction.reactor,
                "Reaction from someone other than the media owner"
            );
            return Ok(ReactionOutcome::Ignored(IgnoreReason::NotOwner));
        }

        let Some(decision) = self.settings.decision(&reaction.emoji) else {
            return Ok(ReactionOutcome::Ignored(IgnoreReason::UnknownEmoji));
        };

        if !self.requests.transition(request.id, decision).await? {
            debug!(request_id = %request.id, "Lost the race to decide request");
            return Ok(ReactionOutcome::Ignored(IgnoreReason::AlreadyDecided));
        }

        match decision {
            Decision::Deny => {
                info!(request_id = %request.id, "Access request denied");
                self.edit_prompt(&request, REQUEST_DENIED).await;
                Ok(ReactionOutcome::Denied {
                    request_id: request.id,
                })
            }
            Decision::Accept => {
                info!(request_id = %request.id, "Access request accepted");
                self.edit_prompt(&request, REQUEST_APPROVED).await;

                let prompt = QuotedMessage {
                    id: request.confirm_message_id.clone(),
                    sender: self.context.jid().clone(),
                };
                let delivery = self
                    .fulfill(
                        &target,
                        &request.requester_jid,
                        &request.scope_entity_id,
                        Some(&prompt),
                    )
                    .await;

                let failure = match &delivery {
                    FulfillOutcome::Delivered { .. } => None,
                    FulfillOutcome::NotViewOnce => Some(NOT_VIEW_ONCE.to_string()),
                    FulfillOutcome::Failed { error } => Some(error.clone()),
                };
                if let Some(failure) = failure {
                    if let Err(e) = self
                        .requests
                        .record_delivery_failure(request.id, &failure)
                        .await
                    {
                        error!(request_id = %request.id, error = %e, "Failed to record delivery failure");
                    }
                }

                Ok(ReactionOutcome::Accepted {
                    request_id: request.id,
                    delivery,
                })
            }
        }
    }

    /// Re-send `target`'s view-once media.
    ///
    /// Delivers into `chat` (quoting `quoted`) or into the requester's direct
    /// chat, depending on the configured delivery target. Never retries.
    pub async fn fulfill(
        &self,
        target: &MessageEvent,
        requester: &Jid,
        chat: &Jid,
        quoted: Option<&QuotedMessage>,
    ) -> FulfillOutcome {
        let (destination, quoted) = match self.settings.delivery_target {
            DeliveryTarget::Chat => (chat.clone(), quoted),
            DeliveryTarget::Requester => (requester.to_non_ad(), None),
        };

        let unwrapped = target.payload.unwrap_bounded(self.settings.unwrap_depth);
        let Some(media) = unwrapped.view_once_media() else {
            self.notify(&destination, NOT_VIEW_ONCE, quoted).await;
            return FulfillOutcome::NotViewOnce;
        };
        let kind = media.kind;

        let data = match self.relay.download(&media.media.descriptor, kind).await {
            Ok(data) => data,
            Err(e) => {
                error!(target_id = %target.id(), kind = %kind, error = %e, "Media download failed");
                self.notify(&destination, DOWNLOAD_FAILED, quoted).await;
                return FulfillOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        let descriptor = match self.relay.upload(data, kind).await {
            Ok(descriptor) => descriptor,
            Err(e) => {
                error!(target_id = %target.id(), kind = %kind, error = %e, "Media upload failed");
                return FulfillOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        let outgoing = OutgoingMedia {
            kind,
            descriptor,
            caption: media
                .media
                .caption
                .clone()
                .filter(|_| kind.supports_caption()),
            mimetype: media
                .media
                .mimetype
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| kind.default_mimetype().to_string()),
        };

        match self
            .transport
            .send_media(&destination, &outgoing, quoted)
            .await
        {
            Ok(message_id) => {
                info!(
                    chat = %destination,
                    message_id = %message_id,
                    target_id = %target.id(),
                    kind = %kind,
                    "View-once media delivered"
                );
                let sent = MessageEnvelope::media(
                    kind,
                    MediaMessage {
                        descriptor: outgoing.descriptor,
                        caption: outgoing.caption,
                        mimetype: Some(outgoing.mimetype),
                        view_once: false,
                        context: None,
                    },
                );
                if let Err(e) = self.remember_sent(&destination, &message_id, sent).await {
                    warn!(chat = %destination, message_id = %message_id, error = %e, "Failed to store delivered media");
                }

                FulfillOutcome::Delivered {
                    chat: destination,
                    message_id,
                    kind,
                }
            }
            Err(e) => {
                error!(chat = %destination, kind = %kind, error = %e, "Sending media failed");
                FulfillOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Post the approval prompt and store it.
    ///
    /// A prompt that cannot be stored is an error; no request row may point
    /// at an unstored prompt.
    async fn send_prompt(&self, chat: &Jid, quoted: &QuotedMessage) -> AppResult<String> {
        let text = self.settings.prompt();
        let message_id = self.transport.send_text(chat, &text, Some(quoted)).await?;

        if let Err(e) = self
            .remember_sent(chat, &message_id, reply_payload(&text, Some(quoted)))
            .await
        {
            error!(chat = %chat, confirm_id = %message_id, error = %e, "Failed to store prompt");
            self.notify(chat, SAVE_FAILED, Some(quoted)).await;
            return Err(e);
        }

        Ok(message_id)
    }

    /// Send a text reply. Storing it is best-effort.
    async fn send_notice(
        &self,
        chat: &Jid,
        text: &str,
        quoted: Option<&QuotedMessage>,
    ) -> AppResult<String> {
        let message_id = self.transport.send_text(chat, text, quoted).await?;

        if let Err(e) = self
            .remember_sent(chat, &message_id, reply_payload(text, quoted))
            .await
        {
            warn!(chat = %chat, message_id = %message_id, error = %e, "Failed to store notice");
        }

        Ok(message_id)
    }

    /// Like [`Self::send_notice`], but send failures are only logged.
    async fn notify(&self, chat: &Jid, text: &str, quoted: Option<&QuotedMessage>) {
        if let Err(e) = self.send_notice(chat, text, quoted).await {
            warn!(chat = %chat, error = %e, "Failed to send notice");
        }
    }

    async fn edit_prompt(&self, request: &AccessRequest, text: &str) {
        if let Err(e) = self
            .transport
            .edit_text(&request.scope_entity_id, &request.confirm_message_id, text)
            .await
        {
            warn!(
                request_id = %request.id,
                confirm_id = %request.confirm_message_id,
                error = %e,
                "Failed to edit prompt"
            );
        }
    }

    async fn remember_sent(
        &self,
        chat: &Jid,
        message_id: &str,
        payload: MessageEnvelope,
    ) -> AppResult<()> {
        let event = MessageEvent {
            account_id: self.context.account_id(),
            key: MessageKey::new(chat.clone(), message_id),
            sender: self.context.jid().clone(),
            is_from_me: true,
            timestamp: Utc::now(),
            payload,
            raw: None,
        };

        self.store.append(&event).await?;
        Ok(())
    }
}

fn reply_payload(text: &str, quoted: Option<&QuotedMessage>) -> MessageEnvelope {
    match quoted {
        Some(quoted) => MessageEnvelope::reply(
            text,
            ContextInfo {
                stanza_id: Some(quoted.id.clone()),
                participant: Some(quoted.sender.clone()),
                quoted: None,
            },
        ),
        None => MessageEnvelope::text(text),
    }
}
