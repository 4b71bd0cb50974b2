//! Transport call tasks.
//!
//! Each dispatched request runs its transport call on its own task, raced
//! against the request's abort token. Replies for queued requests re-enter
//! the owning queue; unqueued requests run their callbacks directly.

use std::sync::Arc;
use std::time::Instant;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::queue::QueueHandle;
use super::request::RequestHandle;
use crate::engine::transport::{Transport, TransportCall, TransportReply};
use crate::telemetry::{RequestSpan, SpanExt};

/// Spawns transport calls on a tokio runtime.
#[derive(Clone)]
pub(crate) struct Dispatcher {
    transport: Arc<dyn Transport>,
    runtime: Handle,
}

impl Dispatcher {
    pub(crate) fn new(transport: Arc<dyn Transport>, runtime: Handle) -> Self {
        Self { transport, runtime }
    }

    pub(crate) fn spawn(
        &self,
        request: RequestHandle,
        queue: Option<QueueHandle>,
        abort: CancellationToken,
    ) -> JoinHandle<()> {
        let transport = Arc::clone(&self.transport);
        let queue_id = queue.as_ref().map(|q| q.id().to_string());
        let span = RequestSpan::new(request.id(), queue_id.as_deref());
        let call = TransportCall {
            request_id: request.id(),
            queue_id,
            payload: request.payload().clone(),
        };
        self.runtime.spawn(
            async move {
                let start = Instant::now();
                let reply = tokio::select! {
                    biased;
                    () = abort.cancelled() => {
                        tracing::Span::current().record_aborted();
                        return;
                    }
                    reply = transport.dispatch(call) => reply,
                };
                let span = tracing::Span::current();
                span.record_reply(&reply);
                span.record("latency_ms", start.elapsed().as_millis() as u64);
                match queue {
                    Some(queue) => queue.settle(request, reply),
                    None => settle_unqueued(&request, reply),
                }
            }
            .instrument(span),
        )
    }

    /// Dispatch a request that bypasses queue semantics.
    pub(crate) fn send_unqueued(&self, request: &RequestHandle) -> bool {
        let abort = CancellationToken::new();
        if !request.try_mark_sent(abort.clone()) {
            return false;
        }
        tracing::debug!(request_id = request.id(), "unqueued request sent");
        self.spawn(request.clone(), None, abort);
        true
    }
}

fn settle_unqueued(request: &RequestHandle, reply: TransportReply) {
    for (outcome, data) in reply.into_signals() {
        if request.begin_receive().is_none() {
            return;
        }
        request.execute_callback(outcome, &data);
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
