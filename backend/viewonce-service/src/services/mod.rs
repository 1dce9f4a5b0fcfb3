pub mod access_request;
pub mod command;
pub mod correlator;
pub mod dispatcher;
pub mod handler;

pub use access_request::{
    AccessRequestManager, CreateOutcome, FulfillOutcome, IgnoreReason, ReactionOutcome,
    RequestSettings,
};
pub use command::CommandMatcher;
pub use correlator::Correlator;
pub use dispatcher::{EventDispatcher, EventHandler};
pub use handler::RequestEventHandler;
