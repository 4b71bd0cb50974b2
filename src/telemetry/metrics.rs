//! Dispatch metrics, labelled by queue id.

use metrics::{counter, gauge};

use crate::scheduler::Outcome;

pub fn record_added(queue: &str) {
    counter!("dispatch_requests_added_total", "queue" => queue.to_owned()).increment(1);
}

pub fn record_sent(queue: &str) {
    counter!("dispatch_requests_sent_total", "queue" => queue.to_owned()).increment(1);
}

pub fn record_processed(queue: &str) {
    counter!("dispatch_requests_processed_total", "queue" => queue.to_owned()).increment(1);
}

pub fn record_canceled(queue: &str) {
    counter!("dispatch_requests_canceled_total", "queue" => queue.to_owned()).increment(1);
}

pub fn record_aborted(queue: &str) {
    counter!("dispatch_requests_aborted_total", "queue" => queue.to_owned()).increment(1);
}

/// Outcome callback executed by a queue.
pub fn record_callback(queue: &str, outcome: Outcome) {
    counter!(
        "dispatch_callbacks_total",
        "queue" => queue.to_owned(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Current pending-list length.
pub fn record_pending(queue: &str, pending: usize) {
    gauge!("dispatch_queue_pending", "queue" => queue.to_owned()).set(pending as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_a_noop() {
        record_added("q");
        record_callback("q", Outcome::Complete);
        record_pending("q", 3);
    }
}
