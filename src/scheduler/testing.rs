//! Hand-driven transport for scheduler unit tests.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

use super::queue::{QueueConfig, QueueHandle};
use super::request::CallbackData;
use super::worker::Dispatcher;
use crate::engine::transport::{Transport, TransportCall, TransportReply};

/// A transport call waiting for the test to answer it.
pub(crate) struct PendingCall {
    pub call: TransportCall,
    reply: oneshot::Sender<TransportReply>,
}

impl PendingCall {
    pub fn reply(self, reply: TransportReply) {
        let _ = self.reply.send(reply);
    }

    pub fn succeed(self, arg: Value) {
        let data = CallbackData::new(json!({ "id": self.call.request_id }), vec![arg]);
        self.reply(TransportReply::success(data));
    }

    pub fn fail(self, arg: Value) {
        self.reply(TransportReply::error(CallbackData::from_args(vec![arg])));
    }

    pub fn name(&self) -> &str {
        self.call.payload["name"].as_str().unwrap_or("")
    }
}

pub(crate) struct ManualTransport {
    calls: mpsc::UnboundedSender<PendingCall>,
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

pub(crate) fn dispatcher() -> (Dispatcher, mpsc::UnboundedReceiver<PendingCall>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let transport = Arc::new(ManualTransport { calls: tx });
    (Dispatcher::new(transport, Handle::current()), rx)
}

pub(crate) fn queue(config: QueueConfig) -> (QueueHandle, mpsc::UnboundedReceiver<PendingCall>) {
    let (dispatcher, calls) = dispatcher();
    (QueueHandle::create(config, Vec::new(), dispatcher), calls)
}

/// Next call the transport received.
pub(crate) async fn next_call(calls: &mut mpsc::UnboundedReceiver<PendingCall>) -> PendingCall {
    tokio::time::timeout(Duration::from_secs(2), calls.recv())
        .await
        .expect("no transport call within 2s")
        .expect("transport dropped")
}

/// Poll until `cond` holds, yielding to spawned tasks in between.
pub(crate) async fn wait_until(cond: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("condition not reached within 2s");
}
