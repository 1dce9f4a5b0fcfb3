//! Resolves which earlier message a reply or a reaction refers to.
use message_store::{MessageEvent, MessageKey, MessageStore};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::context::BotContext;
use crate::error::AppResult;
use crate::models::ReactionEvent;

#[derive(Clone)]
pub struct Correlator {
    context: BotContext,
    store: Arc<dyn MessageStore>,
    unwrap_depth: usize,
}

impl Correlator {
    pub fn new(context: BotContext, store: Arc<dyn MessageStore>, unwrap_depth: usize) -> Self {
        Self {
            context,
            store,
            unwrap_depth,
        }
    }

    /// The message quoted by `event`, rebuilt from the copy the quoting
    /// client embeds.
    ///
    /// Returns `Ok(None)` when `event` is not a reply or the quote is missing
    /// its id, author or content. With `persist`, the rebuilt message is
    /// appended to the store so later flows can load it by id, and a failed
    /// append is returned as an error.
    pub async fn resolve_reply(
        &self,
        event: &MessageEvent,
        persist: bool,
    ) -> AppResult<Option<MessageEvent>> {
        let Some(context) = event.payload.context_info(self.unwrap_depth) else {
            return Ok(None);
        };
        let (Some(stanza_id), Some(participant), Some(quoted)) = (
            context.stanza_id.as_deref().filter(|id| !id.is_empty()),
            context.participant.as_ref(),
            context.quoted.as_deref(),
        ) else {
            return Ok(None);
        };

        let resolved = MessageEvent {
            account_id: event.account_id,
            key: MessageKey::new(event.effective_chat(), stanza_id),
            sender: participant.clone(),
            is_from_me: self.context.is_me(participant),
            timestamp: event.timestamp,
            payload: quoted.clone(),
            raw: None,
        };

        if persist {
            if let Err(e) = self.store.append(&resolved).await {
                warn!(
                    chat = %resolved.key.chat,
                    message_id = %resolved.key.id,
                    error = %e,
                    "Failed to store quoted message"
                );
                return Err(e.into());
            }
        }

        Ok(Some(resolved))
    }

    /// The stored message a reaction points at, if the bot has seen it.
    pub async fn resolve_reacted(&self, reaction: &ReactionEvent) -> AppResult<Option<MessageEvent>> {
        let found = self
            .store
            .lookup(reaction.account_id, &reaction.chat, &reaction.target.id)
            .await?;

        if found.is_none() {
            debug!(
                chat = %reaction.chat,
                message_id = %reaction.target.id,
                "Reacted message not in store"
            );
        }

        Ok(found)
    }
}
