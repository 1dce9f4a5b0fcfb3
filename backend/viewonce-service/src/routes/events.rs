use actix_web::{web, HttpResponse};
use message_store::MessageEvent;
use serde_json::json;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// POST /api/v1/events
///
/// Accepts one chat event from the bridge. Waits for a worker slot, so a
/// saturated bot slows the caller down instead of dropping events.
pub async fn receive_event(
    state: web::Data<AppState>,
    body: web::Json<MessageEvent>,
) -> AppResult<HttpResponse> {
    let mut event = body.into_inner();
    let account_id = state.context.account_id();

    if event.account_id == 0 {
        event.account_id = account_id;
    } else if event.account_id != account_id {
        return Err(AppError::Validation(format!(
            "event for account {} delivered to account {}",
            event.account_id, account_id
        )));
    }

    let message_id = event.key.id.clone();
    debug!(chat = %event.key.chat, message_id = %message_id, "Event received");

    state.dispatcher.dispatch(event).await?;

    Ok(HttpResponse::Accepted().json(json!({
        "status": "accepted",
        "message_id": message_id,
    })))
}

/// GET /health
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}
