//! Span utilities for request dispatch tracing.

use tracing::{info_span, Span};

use crate::engine::transport::TransportReply;
use crate::scheduler::RequestId;

/// Extension trait for recording dispatch results into a span.
pub trait SpanExt {
    /// Record the transport reply status.
    fn record_reply(&self, reply: &TransportReply);

    /// Mark the call as aborted before a reply arrived.
    fn record_aborted(&self);
}

impl SpanExt for Span {
    fn record_reply(&self, reply: &TransportReply) {
        if reply.is_success() {
            self.record("status", "success");
        } else {
            self.record("status", "error");
            if let Some(message) = reply.data.args.first() {
                self.record("error.message", message.to_string().as_str());
            }
        }
    }

    fn record_aborted(&self) {
        self.record("status", "aborted");
    }
}

/// Factory for creating standardized request spans.
pub struct RequestSpan;

impl RequestSpan {
    /// Create a span for one transport call.
    ///
    /// Fields included:
    /// - `request_id`: Process-unique request id
    /// - `queue_id`: Owning queue, empty for unqueued requests
    /// - `status`: `success`, `error` or `aborted`
    /// - `error.message`: First error argument, on error
    /// - `latency_ms`: Transport call duration
    pub fn new(request_id: RequestId, queue_id: Option<&str>) -> Span {
        info_span!(
            "dispatch_request",
            request_id,
            queue_id = queue_id.unwrap_or(""),
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
        )
    }
}
