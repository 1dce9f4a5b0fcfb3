mod common;

use async_trait::async_trait;
use common::*;
use message_store::{MessageEnvelope, MessageEvent, MessageStore};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use viewonce_service::models::RequestState;
use viewonce_service::services::{
    CommandMatcher, EventDispatcher, EventHandler, RequestEventHandler,
};

#[derive(Default)]
struct CountingHandler {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    handled: AtomicUsize,
}

#[async_trait]
impl EventHandler for CountingHandler {
    async fn handle(&self, event: MessageEvent) {
        if event.key.id == "BOOM" {
            panic!("handler exploded");
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.handled.fetch_add(1, Ordering::SeqCst);
    }
}

/// Blocks every event until the test adds permits to `gate`.
struct GatedHandler {
    gate: Arc<Semaphore>,
}

#[async_trait]
impl EventHandler for GatedHandler {
    async fn handle(&self, _event: MessageEvent) {
        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }
    }
}

fn text_event(id: &str) -> MessageEvent {
    event(id, bob(), MessageEnvelope::text("hello"))
}

#[tokio::test]
async fn test_concurrency_never_exceeds_limit() {
    let handler = Arc::new(CountingHandler::default());
    let dispatcher = EventDispatcher::new(handler.clone(), 3);

    let mut handles = Vec::new();
    for i in 0..20 {
        handles.push(dispatcher.dispatch(text_event(&format!("M{i}"))).await.unwrap());
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(handler.handled.load(Ordering::SeqCst), 20);
    assert!(handler.max_in_flight.load(Ordering::SeqCst) <= 3);
    assert_eq!(dispatcher.available_workers(), 3);
}

#[tokio::test]
async fn test_dispatch_waits_for_free_slot() {
    let gate = Arc::new(Semaphore::new(0));
    let dispatcher = EventDispatcher::new(Arc::new(GatedHandler { gate: gate.clone() }), 1);

    let first = dispatcher.dispatch(text_event("M1")).await.unwrap();
    assert_eq!(dispatcher.available_workers(), 0);

    let blocked =
        tokio::time::timeout(Duration::from_millis(50), dispatcher.dispatch(text_event("M2"))).await;
    assert!(blocked.is_err(), "dispatch should wait while the only slot is busy");

    gate.add_permits(2);
    first.await.unwrap();

    let second = dispatcher.dispatch(text_event("M3")).await.unwrap();
    second.await.unwrap();
    assert_eq!(dispatcher.available_workers(), 1);
}

#[tokio::test]
async fn test_panicking_handler_does_not_leak_slot() {
    let handler = Arc::new(CountingHandler::default());
    let dispatcher = EventDispatcher::new(handler.clone(), 2);

    let boom = dispatcher.dispatch(text_event("BOOM")).await.unwrap();
    let ok = dispatcher.dispatch(text_event("M1")).await.unwrap();

    assert!(boom.await.is_ok());
    assert!(ok.await.is_ok());
    assert_eq!(handler.handled.load(Ordering::SeqCst), 1);
    assert_eq!(dispatcher.available_workers(), 2);
}

#[tokio::test]
async fn test_closed_dispatcher_rejects_events() {
    let dispatcher = EventDispatcher::new(Arc::new(CountingHandler::default()), 2);
    dispatcher.close();

    assert!(dispatcher.dispatch(text_event("M1")).await.is_err());
}

#[tokio::test]
async fn test_shutdown_waits_for_running_workers() {
    let gate = Arc::new(Semaphore::new(0));
    let dispatcher = Arc::new(EventDispatcher::new(
        Arc::new(GatedHandler { gate: gate.clone() }),
        2,
    ));

    let running = dispatcher.dispatch(text_event("M1")).await.unwrap();

    let draining = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move { dispatcher.shutdown().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!draining.is_finished(), "shutdown returned while a worker was running");

    gate.add_permits(1);
    running.await.unwrap();
    tokio::time::timeout(Duration::from_secs(1), draining)
        .await
        .expect("shutdown finishes once workers are done")
        .unwrap();

    assert!(dispatcher.dispatch(text_event("M2")).await.is_err());
}

#[tokio::test]
async fn test_full_flow_through_dispatcher() {
    let h = Harness::new();
    let handler = Arc::new(RequestEventHandler::new(
        Arc::new(h.store.clone()),
        h.manager.clone(),
        CommandMatcher::default(),
    ));
    let dispatcher = EventDispatcher::new(handler, 10);

    let target = view_once_image("VO1");
    dispatcher.dispatch(target.clone()).await.unwrap().await.unwrap();
    dispatcher
        .dispatch(request("REQ1", bob(), &target))
        .await
        .unwrap()
        .await
        .unwrap();

    let pending = h.requests.all();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].state, RequestState::Pending);

    dispatcher
        .dispatch(reaction_message(
            "R1",
            alice(),
            &pending[0].confirm_message_id,
            "✅",
        ))
        .await
        .unwrap()
        .await
        .unwrap();

    assert_eq!(h.requests.all()[0].state, RequestState::Accepted);
    assert_eq!(h.transport.media().len(), 1);

    // Inbound events are stored, reactions included.
    assert!(h
        .store
        .lookup(ACCOUNT_ID, &group(), "R1")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_ordinary_messages_are_only_stored() {
    let h = Harness::new();
    let handler = Arc::new(RequestEventHandler::new(
        Arc::new(h.store.clone()),
        h.manager.clone(),
        CommandMatcher::default(),
    ));
    let dispatcher = EventDispatcher::new(handler, 10);

    let target = view_once_image("VO1");
    let mut chatter = request("M1", bob(), &target);
    chatter.payload = MessageEnvelope::text("nice picture");

    dispatcher.dispatch(chatter).await.unwrap().await.unwrap();

    assert!(h.transport.texts().is_empty());
    assert!(h.requests.all().is_empty());
    assert!(h
        .store
        .lookup(ACCOUNT_ID, &group(), "M1")
        .await
        .unwrap()
        .is_some());
}
