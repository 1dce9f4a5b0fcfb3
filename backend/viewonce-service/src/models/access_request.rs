use chrono::{DateTime, Utc};
use message_store::Jid;
use serde::Serialize;
use uuid::Uuid;

/// Lifecycle of an access request. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Pending,
    Accepted,
    Denied,
}

impl RequestState {
    /// Map the nullable `accepted` column.
    pub fn from_accepted(accepted: Option<bool>) -> Self {
        match accepted {
            None => RequestState::Pending,
            Some(true) => RequestState::Accepted,
            Some(false) => RequestState::Denied,
        }
    }

    pub fn as_accepted(self) -> Option<bool> {
        match self {
            RequestState::Pending => None,
            RequestState::Accepted => Some(true),
            RequestState::Denied => Some(false),
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, RequestState::Pending)
    }
}

/// The content owner's answer to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Deny,
}

impl Decision {
    pub fn resulting_state(self) -> RequestState {
        match self {
            Decision::Accept => RequestState::Accepted,
            Decision::Deny => RequestState::Denied,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessRequest {
    pub id: Uuid,
    pub account_id: i64,
    /// Chat under which requests are deduplicated
    pub scope_entity_id: Jid,
    pub requester_jid: Jid,
    /// Id of the view-once message being requested
    pub requested_message_id: String,
    /// Id of the prompt the owner reacts to
    pub confirm_message_id: String,
    pub state: RequestState,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    /// Set when delivery failed after the request was accepted
    pub delivery_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAccessRequest {
    pub account_id: i64,
    pub scope_entity_id: Jid,
    pub requester_jid: Jid,
    pub requested_message_id: String,
    pub confirm_message_id: String,
}

impl NewAccessRequest {
    /// A fresh pending row with a new id.
    pub fn into_pending(self) -> AccessRequest {
        AccessRequest {
            id: Uuid::new_v4(),
            account_id: self.account_id,
            scope_entity_id: self.scope_entity_id,
            requester_jid: self.requester_jid,
            requested_message_id: self.requested_message_id,
            confirm_message_id: self.confirm_message_id,
            state: RequestState::Pending,
            created_at: Utc::now(),
            decided_at: None,
            delivery_error: None,
        }
    }
}
