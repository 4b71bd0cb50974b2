//! Response-mode queues: everything is sent, callbacks follow queue order.

mod common;

use std::sync::Arc;

use common::{named, next_call, sleeping, wait_until, EventLog, ManualTransport};
use gg_dispatch::{Engine, Mode, Order, Outcome, PriorityPolicy, QueueSettings, SimulatedTransport};
use parking_lot::Mutex;
use serde_json::json;

fn recorder() -> Arc<Mutex<Vec<String>>> {
    Arc::new(Mutex::new(Vec::new()))
}

#[tokio::test]
async fn fifo_holds_fast_reply_until_slow_head_is_processed() {
    let engine = Engine::new(Arc::new(SimulatedTransport::default())).unwrap();
    let queue = engine.create_queue(QueueSettings::new("R").mode(Mode::Response)).unwrap();
    let log = EventLog::attach(&queue);
    let fired = recorder();
    let (fa, fb) = (Arc::clone(&fired), Arc::clone(&fired));

    let a = engine.submit(sleeping("A", 40).with_queue("R").on_success(move |_| fa.lock().push("A".into()))).unwrap();
    let b = engine.submit(sleeping("B", 5).with_queue("R").on_success(move |_| fb.lock().push("B".into()))).unwrap();
    assert!(a.is_sent() && b.is_sent());

    wait_until(|| b.is_processed()).await;
    assert!(log.position("received B") < log.position("received A"));
    assert_eq!(*fired.lock(), vec!["A", "B"]);
    assert_eq!(log.names_for("processed"), vec!["A", "B"]);
    assert_eq!(log.lines().last().map(String::as_str), Some("allProcessed"));
}

#[tokio::test]
async fn lifo_callbacks_follow_selection_order_not_arrival() {
    let (transport, mut calls) = ManualTransport::new();
    let engine = Engine::new(transport).unwrap();
    let queue = engine
        .create_queue(QueueSettings::new("R").order(Order::Lifo).mode(Mode::Response))
        .unwrap();
    let log = EventLog::attach(&queue);

    let a = engine.submit(named("A").with_queue("R")).unwrap();
    let b = engine.submit(named("B").with_queue("R")).unwrap();
    // lifo puts B ahead of A in the pending list
    assert!(queue.requests()[0].ptr_eq(&b));

    let first = next_call(&mut calls).await;
    let second = next_call(&mut calls).await;
    let (call_a, call_b) = if first.name() == "A" { (first, second) } else { (second, first) };

    call_a.succeed(json!("a"));
    wait_until(|| a.is_received()).await;
    assert!(!a.is_processed(), "A must wait for B, which is ahead of it");

    call_b.succeed(json!("b"));
    wait_until(|| a.is_processed()).await;
    assert_eq!(log.names_for("success"), vec!["B", "A"]);
}

#[tokio::test]
async fn priority_decides_processing_order() {
    let (transport, mut calls) = ManualTransport::new();
    let engine = Engine::new(transport).unwrap();
    let queue = engine
        .create_queue(QueueSettings::new("R").mode(Mode::Response).priority(PriorityPolicy::Asc))
        .unwrap();
    let log = EventLog::attach(&queue);

    let low = engine.submit(named("low").with_priority(9).with_queue(&queue)).unwrap();
    engine.submit(named("high").with_priority(1).with_queue(&queue)).unwrap();

    let mut pending = vec![next_call(&mut calls).await, next_call(&mut calls).await];
    pending.sort_by(|x, y| x.name().cmp(y.name()));
    let low_call = pending.pop().unwrap();
    let high_call = pending.pop().unwrap();

    low_call.succeed(json!(null));
    high_call.succeed(json!(null));
    wait_until(|| low.is_processed()).await;
    assert_eq!(log.names_for("processed"), vec!["high", "low"]);
}

#[tokio::test]
async fn aborted_request_never_runs_callbacks_and_unblocks_the_rest() {
    let (transport, mut calls) = ManualTransport::new();
    let engine = Engine::new(transport).unwrap();
    let queue = engine.create_queue(QueueSettings::new("R").mode(Mode::Response)).unwrap();
    let log = EventLog::attach(&queue);
    let fired = recorder();
    let sink = Arc::clone(&fired);

    let a = engine
        .submit(named("A").with_queue("R").on_complete(move |_| sink.lock().push("A".into())))
        .unwrap();
    let b = engine.submit(named("B").with_queue("R")).unwrap();
    let mut pending = vec![next_call(&mut calls).await, next_call(&mut calls).await];
    pending.sort_by(|x, y| x.name().cmp(y.name()));
    let call_b = pending.pop().unwrap();
    let call_a = pending.pop().unwrap();

    call_b.succeed(json!("b"));
    wait_until(|| b.is_received()).await;
    assert!(a.cancel(true));
    assert!(b.is_processed());

    call_a.succeed(json!("late"));
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(fired.lock().is_empty());
    assert!(!a.is_received());
    assert!(a.callback_args(Outcome::Complete).is_none());
    assert!(log.contains("aborted A"));
    assert!(!log.contains("processed A"));
    assert_eq!(queue.counters().aborted, 1);
}
