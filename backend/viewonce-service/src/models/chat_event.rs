use message_store::{Jid, MessageEvent, TargetKey};

/// A reaction, separated from ordinary messages before handling.
#[derive(Debug, Clone, PartialEq)]
pub struct ReactionEvent {
    pub account_id: i64,
    /// Effective chat the reaction was made in
    pub chat: Jid,
    /// Account-level identity of whoever reacted
    pub reactor: Jid,
    pub target: TargetKey,
    /// Empty when a reaction is removed
    pub emoji: String,
}

/// Inbound event after classification.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    Message(MessageEvent),
    Reaction(ReactionEvent),
}

impl ChatEvent {
    /// Split reactions from other messages, looking through at most
    /// `max_depth` wrapper layers.
    pub fn classify(event: MessageEvent, max_depth: usize) -> Self {
        let reaction = event.payload.as_reaction(max_depth).cloned();

        match reaction {
            Some(reaction) => ChatEvent::Reaction(ReactionEvent {
                account_id: event.account_id,
                chat: event.effective_chat(),
                reactor: event.sender_account(),
                target: reaction.key,
                emoji: reaction.text,
            }),
            None => ChatEvent::Message(event),
        }
    }
}
