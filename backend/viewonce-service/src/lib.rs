//! View-once access bot
//!
//! Lets chat members ask to open view-once media that was sent to a chat,
//! and lets the media's owner approve or deny each request by reacting to a
//! bot prompt. Approved media is downloaded through the bridge and sent again.
//!
//! Inbound events arrive over HTTP from the chat bridge, are stored, and are
//! handled by a bounded pool of workers:
//!
//! ```text
//! bridge ──POST /api/v1/events──► EventDispatcher ──► RequestEventHandler
//!                                                       ├─ request command ─► AccessRequestManager::handle_request
//!                                                       └─ reaction ────────► AccessRequestManager::on_reaction
//! ```

pub mod bridge;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod migrations;
pub mod models;
pub mod repository;
pub mod routes;
pub mod services;
pub mod state;
pub mod transport;
