//! Request-mode queues: one request in flight, dispatch follows completion.

mod common;

use std::sync::Arc;

use common::{assert_no_call, named, next_call, sleeping, wait_until, EventLog, ManualTransport};
use gg_dispatch::{Engine, Mode, QueueEvent, QueueSettings, RequestHandle, SimulatedTransport};
use parking_lot::Mutex;
use serde_json::json;

#[tokio::test]
async fn slow_request_completes_before_fast_one_is_sent() {
    let engine = Engine::new(Arc::new(SimulatedTransport::default())).unwrap();
    let queue = engine.create_queue(QueueSettings::new("Q").mode(Mode::Request)).unwrap();
    let log = EventLog::attach(&queue);

    let a = engine.submit(sleeping("A", 20).with_queue("Q")).unwrap();
    let b = engine.submit(sleeping("B", 10).with_queue("Q")).unwrap();
    assert!(a.is_sent());
    assert!(!b.is_sent());

    wait_until(|| b.is_processed()).await;
    assert!(a.is_processed());
    assert_eq!(log.names_for("sent"), vec!["A", "B"]);
    assert!(log.position("complete A") < log.position("sent B"));
    assert_eq!(queue.counters().processed, 2);
}

#[tokio::test]
async fn at_most_one_request_is_in_flight() {
    let engine = Engine::new(Arc::new(SimulatedTransport::default())).unwrap();
    let tracked: Arc<Mutex<Vec<RequestHandle>>> = Arc::default();
    let violations = Arc::new(Mutex::new(0));

    let (seen, bad) = (Arc::clone(&tracked), Arc::clone(&violations));
    let queue = engine
        .create_queue(QueueSettings::new("Q").with_listener(move |_, event| {
            if let QueueEvent::Sent(_) = event {
                let in_flight = seen.lock().iter().filter(|r| r.is_sent() && !r.is_processed()).count();
                if in_flight > 1 {
                    *bad.lock() += 1;
                }
            }
        }))
        .unwrap();

    for i in 0..6u64 {
        let request = engine.submit(sleeping(&format!("r{i}"), 6 - i).with_queue(&queue)).unwrap();
        tracked.lock().push(request);
    }
    let all = tracked.lock().clone();
    wait_until(|| all.iter().all(RequestHandle::is_processed)).await;
    assert_eq!(*violations.lock(), 0);
    assert_eq!(queue.counters().sent, 6);
}

#[tokio::test]
async fn disabling_mid_flight_pauses_dispatch_until_reenabled() {
    let (transport, mut calls) = ManualTransport::new();
    let engine = Engine::new(transport).unwrap();
    let queue = engine.create_queue(QueueSettings::new("Q")).unwrap();
    let log = EventLog::attach(&queue);

    let a = engine.submit(named("A").with_queue("Q")).unwrap();
    let b = engine.submit(named("B").with_queue("Q")).unwrap();
    let call_a = next_call(&mut calls).await;

    queue.disable();
    call_a.succeed(json!("ok"));
    wait_until(|| a.is_processed()).await;
    assert!(!a.is_canceled() && !a.is_aborted());
    assert_no_call(&mut calls).await;
    assert!(!b.is_sent());
    assert!(!log.contains("allProcessed"));

    queue.enable();
    assert_eq!(next_call(&mut calls).await.name(), "B");
    assert!(log.position("disabled") < log.position("enabled"));
    assert!(log.position("enabled") < log.position("sent B"));
}

#[tokio::test]
async fn error_outcome_still_releases_the_queue() {
    let (transport, mut calls) = ManualTransport::new();
    let engine = Engine::new(transport).unwrap();
    engine.create_queue(QueueSettings::new("Q")).unwrap();
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);

    let a = engine
        .submit(named("A").with_queue("Q").on_error(move |d| sink.lock().push(d.args.clone())))
        .unwrap();
    let b = engine.submit(named("B").with_queue("Q")).unwrap();

    next_call(&mut calls).await.fail(json!("503"));
    let call_b = next_call(&mut calls).await;
    assert_eq!(call_b.name(), "B");
    assert!(a.is_error() && a.is_complete() && a.is_processed());
    assert_eq!(*errors.lock(), vec![vec![json!("503")]]);
    call_b.succeed(json!(null));
    wait_until(|| b.is_processed()).await;
}
