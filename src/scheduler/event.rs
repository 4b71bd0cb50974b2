//! Typed events and ordered listener lists for requests and queues.
//!
//! Delivery is synchronous and follows registration order. Callers take a
//! snapshot before notifying, so a listener may register or remove
//! listeners while it runs.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use super::queue::QueueHandle;
use super::request::{Flag, Outcome, RequestHandle};

/// Observer attached to a single request.
pub type RequestListener = Arc<dyn Fn(&RequestHandle, RequestEvent) + Send + Sync>;

/// Observer attached to a queue.
pub type QueueListener = Arc<dyn Fn(&QueueHandle, &QueueEvent) + Send + Sync>;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// Token returned by `add_listener`, used to remove the listener later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Ordered list of listeners.
pub struct Listeners<L> {
    entries: Vec<(ListenerId, L)>,
}

impl<L: Clone> Listeners<L> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn add(&mut self, listener: L) -> ListenerId {
        let id = ListenerId(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed));
        self.entries.push((id, listener));
        id
    }

    /// Remove a listener. Returns false if it was not registered here.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        match self.entries.iter().position(|(entry, _)| *entry == id) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self) -> Vec<L> {
        self.entries.iter().map(|(_, l)| l.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<L: Clone> Default for Listeners<L> {
    fn default() -> Self {
        Self::new()
    }
}

/// Event delivered to request listeners. Every flag transition maps to the
/// same-named event; `Added` fires when a queue admits the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestEvent {
    Added,
    Sent,
    Received,
    Success,
    Error,
    Complete,
    Processed,
    Canceled,
    Aborted,
}

impl RequestEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Sent => "sent",
            Self::Received => "received",
            Self::Success => "success",
            Self::Error => "error",
            Self::Complete => "complete",
            Self::Processed => "processed",
            Self::Canceled => "canceled",
            Self::Aborted => "aborted",
        }
    }
}

impl From<Flag> for RequestEvent {
    fn from(flag: Flag) -> Self {
        match flag {
            Flag::Sent => Self::Sent,
            Flag::Received => Self::Received,
            Flag::Processed => Self::Processed,
            Flag::Canceled => Self::Canceled,
            Flag::Aborted => Self::Aborted,
            Flag::Success => Self::Success,
            Flag::Error => Self::Error,
            Flag::Complete => Self::Complete,
        }
    }
}

/// Event delivered to queue listeners.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    Added(RequestHandle),
    Sent(RequestHandle),
    AllSent,
    Received(RequestHandle),
    Success(RequestHandle),
    Error(RequestHandle),
    Complete(RequestHandle),
    Processed(RequestHandle),
    AllProcessed,
    Canceled(RequestHandle),
    Aborted(RequestHandle),
    Enabled,
    Disabled,
}

impl QueueEvent {
    pub(crate) fn for_outcome(outcome: Outcome, request: RequestHandle) -> Self {
        match outcome {
            Outcome::Success => Self::Success(request),
            Outcome::Error => Self::Error(request),
            Outcome::Complete => Self::Complete(request),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Added(_) => "added",
            Self::Sent(_) => "sent",
            Self::AllSent => "allSent",
            Self::Received(_) => "received",
            Self::Success(_) => "success",
            Self::Error(_) => "error",
            Self::Complete(_) => "complete",
            Self::Processed(_) => "processed",
            Self::AllProcessed => "allProcessed",
            Self::Canceled(_) => "canceled",
            Self::Aborted(_) => "aborted",
            Self::Enabled => "enabled",
            Self::Disabled => "disabled",
        }
    }

    /// The request this event concerns, if any.
    pub fn request(&self) -> Option<&RequestHandle> {
        match self {
            Self::Added(r)
            | Self::Sent(r)
            | Self::Received(r)
            | Self::Success(r)
            | Self::Error(r)
            | Self::Complete(r)
            | Self::Processed(r)
            | Self::Canceled(r)
            | Self::Aborted(r) => Some(r),
            Self::AllSent | Self::AllProcessed | Self::Enabled | Self::Disabled => None,
        }
    }
}
