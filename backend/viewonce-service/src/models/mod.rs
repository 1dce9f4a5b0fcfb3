pub mod access_request;
pub mod chat_event;

pub use access_request::{AccessRequest, Decision, NewAccessRequest, RequestState};
pub use chat_event::{ChatEvent, ReactionEvent};
