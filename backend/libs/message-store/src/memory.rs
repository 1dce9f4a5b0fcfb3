use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::StoreResult;
use crate::event::MessageEvent;
use crate::jid::Jid;
use crate::MessageStore;

type StoreKey = (i64, Jid, String);

/// Map-backed store. Cloning shares the underlying map.
#[derive(Clone, Default)]
pub struct InMemoryMessageStore {
    messages: Arc<RwLock<HashMap<StoreKey, MessageEvent>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn append(&self, event: &MessageEvent) -> StoreResult<()> {
        let key = (
            event.account_id,
            event.key.chat.clone(),
            event.key.id.clone(),
        );

        let mut messages = self
            .messages
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        messages.insert(key, event.clone());
        Ok(())
    }

    async fn lookup(
        &self,
        account_id: i64,
        chat: &Jid,
        message_id: &str,
    ) -> StoreResult<Option<MessageEvent>> {
        let messages = self
            .messages
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(messages
            .get(&(account_id, chat.clone(), message_id.to_string()))
            .cloned())
    }
}
