//! Bounded worker dispatch for inbound chat events.
//!
//! Each event runs on its own task. A semaphore caps how many run at once;
//! `dispatch` waits for a free slot, so bursts of traffic push back on the
//! ingress instead of queueing without limit.

use async_trait::async_trait;
use futures::FutureExt;
use message_store::MessageEvent;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::{AppError, AppResult};

#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle(&self, event: MessageEvent);
}

pub struct EventDispatcher {
    handler: Arc<dyn EventHandler>,
    semaphore: Arc<Semaphore>,
    worker_limit: usize,
}

impl EventDispatcher {
    pub fn new(handler: Arc<dyn EventHandler>, worker_limit: usize) -> Self {
        Self {
            handler,
            semaphore: Arc::new(Semaphore::new(worker_limit)),
            worker_limit,
        }
    }

    pub fn worker_limit(&self) -> usize {
        self.worker_limit
    }

    /// Slots not currently held by a worker.
    pub fn available_workers(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for a worker slot, then run `event` on its own task.
    ///
    /// The slot is released when the task finishes, including when the
    /// handler panics.
    pub async fn dispatch(&self, event: MessageEvent) -> AppResult<JoinHandle<()>> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to acquire worker slot: {}", e)))?;

        let handler = Arc::clone(&self.handler);

        Ok(tokio::spawn(async move {
            let _permit = permit;
            let chat = event.key.chat.clone();
            let message_id = event.key.id.clone();

            debug!(chat = %chat, message_id = %message_id, "Worker started");

            if let Err(panic) = AssertUnwindSafe(handler.handle(event)).catch_unwind().await {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(
                    chat = %chat,
                    message_id = %message_id,
                    panic = %reason,
                    "Event handler panicked"
                );
            }
        }))
    }

    /// Stop handing out slots. Pending and future `dispatch` calls fail.
    pub fn close(&self) {
        self.semaphore.close();
    }

    /// Wait until every running worker has finished, then close.
    ///
    /// New events still wait behind the workers already running, so call this
    /// after ingress has stopped.
    pub async fn shutdown(&self) {
        let all = u32::try_from(self.worker_limit).unwrap_or(u32::MAX);
        match self.semaphore.acquire_many(all).await {
            Ok(_drained) => info!(workers = self.worker_limit, "All workers finished"),
            Err(_) => debug!("Dispatcher already closed"),
        }
        self.semaphore.close();
    }
}
