use std::sync::Arc;

use crate::context::BotContext;
use crate::services::EventDispatcher;

#[derive(Clone)]
pub struct AppState {
    pub context: BotContext,
    pub dispatcher: Arc<EventDispatcher>,
}
