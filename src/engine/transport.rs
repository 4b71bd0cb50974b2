//! Transport seam.
//!
//! The engine never performs I/O itself. A [`Transport`] receives the opaque
//! payload and eventually yields one of `success`/`error` followed by
//! `complete`. Abort is handled by the engine dropping the call future.

use std::time::Duration;

use serde_json::{json, Value};

use crate::scheduler::{CallbackData, Outcome, RequestId};

/// What the transport is asked to perform.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportCall {
    pub request_id: RequestId,
    pub queue_id: Option<String>,
    pub payload: Value,
}

/// The terminal signal preceding `complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    Success,
    Error,
}

impl From<ReplyStatus> for Outcome {
    fn from(status: ReplyStatus) -> Self {
        match status {
            ReplyStatus::Success => Outcome::Success,
            ReplyStatus::Error => Outcome::Error,
        }
    }
}

/// Result of one transport call: a status with its data, then completion
/// data.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportReply {
    pub status: ReplyStatus,
    pub data: CallbackData,
    pub completion: CallbackData,
}

impl TransportReply {
    pub fn success(data: CallbackData) -> Self {
        Self::with_status(ReplyStatus::Success, data)
    }

    pub fn error(data: CallbackData) -> Self {
        Self::with_status(ReplyStatus::Error, data)
    }

    fn with_status(status: ReplyStatus, data: CallbackData) -> Self {
        let label = Outcome::from(status).as_str();
        let completion = CallbackData::new(data.context.clone(), vec![json!(label)]);
        Self { status, data, completion }
    }

    pub fn with_completion(mut self, completion: CallbackData) -> Self {
        self.completion = completion;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ReplyStatus::Success
    }

    /// Signals in delivery order.
    pub(crate) fn into_signals(self) -> [(Outcome, CallbackData); 2] {
        [(self.status.into(), self.data), (Outcome::Complete, self.completion)]
    }
}

/// External collaborator that performs the actual call.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn dispatch(&self, call: TransportCall) -> TransportReply;
}

/// Sleep-driven transport for demos and tests.
///
/// Payload fields: `sleep` (milliseconds, falls back to the default delay),
/// `fail` (bool) and `echo` (returned as the single success argument).
#[derive(Debug, Clone, Default)]
pub struct SimulatedTransport {
    default_delay: Duration,
}

impl SimulatedTransport {
    pub fn new(default_delay: Duration) -> Self {
        Self { default_delay }
    }

    fn delay_for(&self, payload: &Value) -> Duration {
        payload
            .get("sleep")
            .and_then(Value::as_u64)
            .map(Duration::from_millis)
            .unwrap_or(self.default_delay)
    }
}

#[async_trait::async_trait]
impl Transport for SimulatedTransport {
    async fn dispatch(&self, call: TransportCall) -> TransportReply {
        let delay = self.delay_for(&call.payload);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let context = json!({ "request_id": call.request_id, "queue": call.queue_id });
        let failed = call.payload.get("fail").and_then(Value::as_bool).unwrap_or(false);
        if failed {
            let reason = call
                .payload
                .get("error")
                .cloned()
                .unwrap_or_else(|| json!("simulated failure"));
            TransportReply::error(CallbackData::new(context, vec![reason]))
        } else {
            let echo = call.payload.get("echo").cloned().unwrap_or(call.payload);
            TransportReply::success(CallbackData::new(context, vec![echo]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(payload: Value) -> TransportCall {
        TransportCall { request_id: 7, queue_id: Some("q".into()), payload }
    }

    #[tokio::test]
    async fn simulated_success_echoes_payload() {
        let transport = SimulatedTransport::default();
        let reply = transport.dispatch(call(json!({ "echo": "hi" }))).await;
        assert!(reply.is_success());
        assert_eq!(reply.data.args, vec![json!("hi")]);
        assert_eq!(reply.data.context["request_id"], json!(7));
        assert_eq!(reply.completion.args, vec![json!("success")]);
    }

    #[tokio::test]
    async fn simulated_failure_reports_error_outcome() {
        let transport = SimulatedTransport::default();
        let reply = transport.dispatch(call(json!({ "fail": true, "error": "boom" }))).await;
        assert_eq!(reply.status, ReplyStatus::Error);
        assert_eq!(reply.data.args, vec![json!("boom")]);
    }

    #[test]
    fn signals_end_with_complete() {
        let reply = TransportReply::error(CallbackData::from_args(vec![]));
        let [(first, _), (last, _)] = reply.into_signals();
        assert_eq!(first, Outcome::Error);
        assert_eq!(last, Outcome::Complete);
    }

    #[test]
    fn sleep_overrides_default_delay() {
        let transport = SimulatedTransport::new(Duration::from_millis(50));
        assert_eq!(transport.delay_for(&json!({ "sleep": 5 })), Duration::from_millis(5));
        assert_eq!(transport.delay_for(&json!({})), Duration::from_millis(50));
    }
}
