//! Chat identities.
//!
//! A JID has the shape `user[.agent][:device]@server`. The agent and device
//! parts identify one linked device of an account; everything in this crate
//! that compares identities does so on the account-level ("non-AD") form.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::InvalidJid;

/// Server of individual user accounts
pub const USER_SERVER: &str = "s.whatsapp.net";

/// Server of group chats
pub const GROUP_SERVER: &str = "g.us";

/// Server of broadcast lists and the status feed
pub const BROADCAST_SERVER: &str = "broadcast";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Jid {
    user: String,
    agent: u8,
    device: u16,
    server: String,
}

impl Jid {
    /// Build an account-level JID from its user and server parts.
    pub fn new(user: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            agent: 0,
            device: 0,
            server: server.into(),
        }
    }

    /// The `status@broadcast` pseudo chat
    pub fn status_broadcast() -> Self {
        Self::new("status", BROADCAST_SERVER)
    }

    pub fn parse(value: &str) -> Result<Self, InvalidJid> {
        let (user_part, server) = value
            .rsplit_once('@')
            .ok_or_else(|| InvalidJid(value.to_string()))?;

        if server.is_empty() {
            return Err(InvalidJid(value.to_string()));
        }

        let (user_agent, device) = match user_part.split_once(':') {
            Some((head, device)) => {
                let device = device
                    .parse::<u16>()
                    .map_err(|_| InvalidJid(value.to_string()))?;
                (head, device)
            }
            None => (user_part, 0),
        };

        // A dot is only an agent separator when what follows is numeric.
        let (user, agent) = match user_agent.rsplit_once('.') {
            Some((user, agent)) => match agent.parse::<u8>() {
                Ok(agent) => (user, agent),
                Err(_) => (user_agent, 0),
            },
            None => (user_agent, 0),
        };

        Ok(Self {
            user: user.to_string(),
            agent,
            device,
            server: server.to_string(),
        })
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn device(&self) -> u16 {
        self.device
    }

    /// Strip agent and device, leaving the account-level identity.
    pub fn to_non_ad(&self) -> Jid {
        Self::new(self.user.clone(), self.server.clone())
    }

    /// Compare two identities at account level.
    pub fn same_account(&self, other: &Jid) -> bool {
        self.user == other.user && self.server == other.server
    }

    pub fn is_group(&self) -> bool {
        self.server == GROUP_SERVER
    }

    pub fn is_status_broadcast(&self) -> bool {
        self.user == "status" && self.server == BROADCAST_SERVER
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user)?;
        if self.agent > 0 {
            write!(f, ".{}", self.agent)?;
        }
        if self.device > 0 {
            write!(f, ":{}", self.device)?;
        }
        write!(f, "@{}", self.server)
    }
}

impl FromStr for Jid {
    type Err = InvalidJid;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Jid::parse(s)
    }
}

impl TryFrom<String> for Jid {
    type Error = InvalidJid;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Jid::parse(&value)
    }
}

impl From<Jid> for String {
    fn from(jid: Jid) -> Self {
        jid.to_string()
    }
}
