//! Bot session context.
//!
//! Built once during startup from the bridge session and passed by value
//! (it is cheap to clone) to every component that needs to know who the bot is.

use message_store::Jid;
use serde::Deserialize;
use std::sync::Arc;

/// The chat account the bot is logged in as.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Account {
    #[serde(rename = "account_id")]
    pub id: i64,
    pub jid: Jid,
    #[serde(default)]
    pub push_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BotContext {
    account: Arc<Account>,
}

impl BotContext {
    pub fn new(account: Account) -> Self {
        Self {
            account: Arc::new(account),
        }
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn account_id(&self) -> i64 {
        self.account.id
    }

    pub fn jid(&self) -> &Jid {
        &self.account.jid
    }

    /// Whether `jid` is any device of the bot's own account.
    pub fn is_me(&self, jid: &Jid) -> bool {
        self.account.jid.same_account(jid)
    }
}
