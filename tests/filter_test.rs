//! Admission filters: conditions, rewrites, observers and their lifecycle.

mod common;

use std::sync::Arc;

use common::{named, ManualTransport};
use gg_dispatch::engine::{PostFilter, PreFilter};
use gg_dispatch::{Condition, Engine, EngineError, QueueSettings, RequestHandle, RequestSettings};
use parking_lot::Mutex;

fn engine() -> Engine {
    let (transport, _calls) = ManualTransport::new();
    let engine = Engine::new(transport).unwrap();
    engine.create_queue(QueueSettings::new("default").disabled()).unwrap();
    engine.create_queue(QueueSettings::new("uploads").disabled()).unwrap();
    engine
}

fn route_to(id: &'static str) -> Option<PreFilter> {
    Some(Arc::new(move |s: RequestSettings| s.with_queue(id)))
}

#[tokio::test]
async fn pre_filter_reroutes_matching_requests() {
    let engine = engine();
    engine
        .register_filter(Condition::when(|s| s.payload["kind"] == "upload"), route_to("uploads"), None)
        .unwrap();

    let upload = engine
        .submit(RequestSettings::new(serde_json::json!({ "kind": "upload" })).with_queue("default"))
        .unwrap();
    let other = engine
        .submit(RequestSettings::new(serde_json::json!({ "kind": "ping" })).with_queue("default"))
        .unwrap();
    assert_eq!(upload.queue_id().as_deref(), Some("uploads"));
    assert_eq!(other.queue_id().as_deref(), Some("default"));
}

#[tokio::test]
async fn pre_filter_can_queue_an_unqueued_submission() {
    let engine = engine();
    engine.register_filter(Condition::Always, route_to("default"), None).unwrap();
    let request = engine.submit(named("A")).unwrap();
    assert_eq!(request.queue_id().as_deref(), Some("default"));
    assert!(!request.is_sent(), "the queue is disabled");
}

#[tokio::test]
async fn post_filters_observe_in_registration_order() {
    let engine = engine();
    let seen: Arc<Mutex<Vec<(u8, u64)>>> = Arc::default();
    for tag in [1u8, 2] {
        let sink = Arc::clone(&seen);
        let post: PostFilter = Arc::new(move |r: &RequestHandle| sink.lock().push((tag, r.id())));
        engine.register_filter(Condition::Always, None, Some(post)).unwrap();
    }
    let request = engine.submit(named("A").with_queue("default")).unwrap();
    assert_eq!(*seen.lock(), vec![(1, request.id()), (2, request.id())]);
}

#[tokio::test]
async fn condition_sees_raw_settings_before_rewrites() {
    let engine = engine();
    engine.register_filter(Condition::Always, route_to("uploads"), None).unwrap();
    let matched = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&matched);
    engine
        .register_filter(
            Condition::when(move |s| {
                sink.lock().push(s.queue_id().map(str::to_string));
                true
            }),
            None,
            Some(Arc::new(|_: &RequestHandle| {})),
        )
        .unwrap();
    engine.submit(named("A").with_queue("default")).unwrap();
    assert_eq!(*matched.lock(), vec![Some("default".to_string())]);
}

#[tokio::test]
async fn disabled_and_removed_filters_are_skipped() {
    let engine = engine();
    let handle = engine.register_filter(Condition::Always, route_to("uploads"), None).unwrap();

    handle.disable();
    let r1 = engine.submit(named("A").with_queue("default")).unwrap();
    assert_eq!(r1.queue_id().as_deref(), Some("default"));

    handle.enable();
    let r2 = engine.submit(named("B").with_queue("default")).unwrap();
    assert_eq!(r2.queue_id().as_deref(), Some("uploads"));

    assert!(handle.remove());
    assert_eq!(engine.filter_count(), 0);
    let r3 = engine.submit(named("C").with_queue("default")).unwrap();
    assert_eq!(r3.queue_id().as_deref(), Some("default"));
    assert_eq!(r2.queue_id().as_deref(), Some("uploads"), "admitted requests are unaffected");
}

#[tokio::test]
async fn filter_without_functions_is_a_configuration_error() {
    let engine = engine();
    let err = engine.register_filter(Condition::Always, None, None).unwrap_err();
    assert!(matches!(err, EngineError::InvalidFilter(_)));
    assert!(err.is_configuration());
}

#[tokio::test]
async fn rewrite_to_unknown_queue_fails_submission() {
    let engine = engine();
    engine.register_filter(Condition::Always, route_to("missing"), None).unwrap();
    let err = engine.submit(named("A")).unwrap_err();
    assert_eq!(err, EngineError::UnknownQueue("missing".into()));
}
