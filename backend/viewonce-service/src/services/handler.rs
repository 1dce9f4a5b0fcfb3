use async_trait::async_trait;
use message_store::{MessageEvent, MessageStore};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::AppError;
use crate::models::ChatEvent;
use crate::services::access_request::{AccessRequestManager, ReactionOutcome};
use crate::services::command::CommandMatcher;
use crate::services::dispatcher::EventHandler;

/// Stores every inbound event, then routes request commands and reactions
/// to the access request manager.
pub struct RequestEventHandler {
    store: Arc<dyn MessageStore>,
    manager: Arc<AccessRequestManager>,
    commands: CommandMatcher,
}

impl RequestEventHandler {
    pub fn new(
        store: Arc<dyn MessageStore>,
        manager: Arc<AccessRequestManager>,
        commands: CommandMatcher,
    ) -> Self {
        Self {
            store,
            manager,
            commands,
        }
    }
}

fn log_failure(what: &str, error: &AppError) {
    if error.is_transport() {
        warn!(error = %error, "{} failed", what);
    } else {
        error!(error = %error, "{} failed", what);
    }
}

#[async_trait]
impl EventHandler for RequestEventHandler {
    async fn handle(&self, event: MessageEvent) {
        if let Err(e) = self.store.append(&event).await {
            warn!(
                chat = %event.key.chat,
                message_id = %event.key.id,
                error = %e,
                "Failed to store inbound message"
            );
        }

        let unwrap_depth = self.manager.settings().unwrap_depth;

        match ChatEvent::classify(event, unwrap_depth) {
            ChatEvent::Reaction(reaction) => match self.manager.on_reaction(&reaction).await {
                Ok(ReactionOutcome::Ignored(reason)) => {
                    debug!(chat = %reaction.chat, target_id = %reaction.target.id, ?reason, "Reaction ignored");
                }
                Ok(outcome) => {
                    info!(chat = %reaction.chat, ?outcome, "Reaction handled");
                }
                Err(e) => log_failure("Reaction handling", &e),
            },
            ChatEvent::Message(message) => {
                let text = message.payload.plain_text(unwrap_depth);
                if !self.commands.is_request(&text) {
                    return;
                }

                match self.manager.handle_request(&message).await {
                    Ok(outcome) => {
                        info!(chat = %message.effective_chat(), message_id = %message.id(), ?outcome, "Request command handled");
                    }
                    Err(e) => log_failure("Request command", &e),
                }
            }
        }
    }
}
