//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use gg_dispatch::scheduler::QueueEvent;
use gg_dispatch::{CallbackData, QueueHandle, Transport, TransportCall, TransportReply};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};

/// A transport call waiting for the test to answer it.
pub struct PendingCall {
    pub call: TransportCall,
    reply: oneshot::Sender<TransportReply>,
}

impl PendingCall {
    pub fn name(&self) -> &str {
        self.call.payload["name"].as_str().unwrap_or("")
    }

    pub fn succeed(self, arg: Value) {
        let _ = self.reply.send(TransportReply::success(CallbackData::from_args(vec![arg])));
    }

    pub fn fail(self, arg: Value) {
        let _ = self.reply.send(TransportReply::error(CallbackData::from_args(vec![arg])));
    }
}

/// Transport whose calls are answered by the test.
pub struct ManualTransport {
    calls: mpsc::UnboundedSender<PendingCall>,
}

impl ManualTransport {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<PendingCall>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { calls: tx }), rx)
    }
}

#[async_trait::async_trait]
impl Transport for ManualTransport {
    async fn dispatch(&self, call: TransportCall) -> TransportReply {
        let (tx, rx) = oneshot::channel();
        let _ = self.calls.send(PendingCall { call, reply: tx });
        match rx.await {
            Ok(reply) => reply,
            Err(_) => std::future::pending().await,
        }
    }
}

pub async fn next_call(calls: &mut mpsc::UnboundedReceiver<PendingCall>) -> PendingCall {
    tokio::time::timeout(Duration::from_secs(2), calls.recv())
        .await
        .expect("no transport call within 2s")
        .expect("transport dropped")
}

pub async fn assert_no_call(calls: &mut mpsc::UnboundedReceiver<PendingCall>) {
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(calls.try_recv().is_err(), "unexpected transport call");
}

pub async fn wait_until(cond: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached within 5s");
}

/// Queue events rendered as `"<event> <request name>"`.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn attach(queue: &QueueHandle) -> Self {
        let log = Self::default();
        let sink = log.clone();
        queue.add_listener(move |_, event| sink.push(event));
        log
    }

    pub fn push(&self, event: &QueueEvent) {
        let line = match event.request() {
            Some(r) => format!("{} {}", event.name(), r.payload()["name"].as_str().unwrap_or("?")),
            None => event.name().to_string(),
        };
        self.0.lock().push(line);
    }

    pub fn lines(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    /// Request names of events with the given name, in firing order.
    pub fn names_for(&self, event: &str) -> Vec<String> {
        let prefix = format!("{} ", event);
        self.lines()
            .iter()
            .filter_map(|l| l.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    pub fn position(&self, line: &str) -> usize {
        let lines = self.lines();
        lines
            .iter()
            .position(|l| l == line)
            .unwrap_or_else(|| panic!("missing '{line}' in {lines:?}"))
    }

    pub fn contains(&self, line: &str) -> bool {
        self.lines().iter().any(|l| l == line)
    }
}

pub fn named(name: &str) -> gg_dispatch::RequestSettings {
    gg_dispatch::RequestSettings::new(json!({ "name": name }))
}

pub fn sleeping(name: &str, ms: u64) -> gg_dispatch::RequestSettings {
    gg_dispatch::RequestSettings::new(json!({ "name": name, "sleep": ms }))
}
