//! A single unit of work: lifecycle flags, outcome callbacks and listeners.
//!
//! Flags are monotonic. At most one of `canceled`/`aborted` is ever set, and
//! once either is set no outcome callback runs.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use super::event::{ListenerId, Listeners, RequestEvent, RequestListener};
use super::priority::Prioritized;
use super::queue::{Command, Queue, QueueHandle, QueueRef};
use crate::engine::EngineError;

/// Process-unique request identifier.
pub type RequestId = u64;

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Callback run with the data carried by an outcome.
pub type Callback = Arc<dyn Fn(&CallbackData) + Send + Sync>;

/// One-shot hook run with the new handle before admission.
pub type Initializer = Box<dyn FnOnce(&RequestHandle) + Send>;

/// Outcome slots a request can carry callbacks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Error,
    Complete,
}

impl Outcome {
    pub const ALL: [Outcome; 3] = [Outcome::Success, Outcome::Error, Outcome::Complete];

    fn slot(self) -> usize {
        match self {
            Self::Success => 0,
            Self::Error => 1,
            Self::Complete => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Complete => "complete",
        }
    }
}

impl FromStr for Outcome {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            "complete" => Ok(Self::Complete),
            other => Err(EngineError::InvalidOutcome(other.to_string())),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flag {
    Sent,
    Received,
    Processed,
    Canceled,
    Aborted,
    Success,
    Error,
    Complete,
}

impl From<Outcome> for Flag {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => Self::Success,
            Outcome::Error => Self::Error,
            Outcome::Complete => Self::Complete,
        }
    }
}

impl FromStr for Flag {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(Self::Sent),
            "received" => Ok(Self::Received),
            "processed" => Ok(Self::Processed),
            "canceled" => Ok(Self::Canceled),
            "aborted" => Ok(Self::Aborted),
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            "complete" => Ok(Self::Complete),
            other => Err(EngineError::InvalidFlag(other.to_string())),
        }
    }
}

/// Snapshot of a request's flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFlags {
    pub sent: bool,
    pub received: bool,
    pub processed: bool,
    pub canceled: bool,
    pub aborted: bool,
    pub success: bool,
    pub error: bool,
    pub complete: bool,
}

impl RequestFlags {
    pub fn get(&self, flag: Flag) -> bool {
        match flag {
            Flag::Sent => self.sent,
            Flag::Received => self.received,
            Flag::Processed => self.processed,
            Flag::Canceled => self.canceled,
            Flag::Aborted => self.aborted,
            Flag::Success => self.success,
            Flag::Error => self.error,
            Flag::Complete => self.complete,
        }
    }

    /// Set a flag. Returns true on a false-to-true transition.
    fn set(&mut self, flag: Flag) -> bool {
        let slot = match flag {
            Flag::Sent => &mut self.sent,
            Flag::Received => &mut self.received,
            Flag::Processed => &mut self.processed,
            Flag::Canceled => &mut self.canceled,
            Flag::Aborted => &mut self.aborted,
            Flag::Success => &mut self.success,
            Flag::Error => &mut self.error,
            Flag::Complete => &mut self.complete,
        };
        !std::mem::replace(slot, true)
    }

    /// Canceled, aborted or processed.
    pub fn is_terminal(&self) -> bool {
        self.canceled || self.aborted || self.processed
    }

    fn is_withdrawn(&self) -> bool {
        self.canceled || self.aborted
    }
}

/// Context and arguments carried by one outcome signal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallbackData {
    pub context: Value,
    pub args: Vec<Value>,
}

impl CallbackData {
    pub fn new(context: Value, args: Vec<Value>) -> Self {
        Self { context, args }
    }

    pub fn from_args(args: Vec<Value>) -> Self {
        Self { context: Value::Null, args }
    }
}

/// Submission settings: opaque payload plus scheduling attributes.
pub struct RequestSettings {
    pub payload: Value,
    pub priority: Option<i64>,
    pub queue: Option<QueueRef>,
    pub success: Option<Callback>,
    pub error: Option<Callback>,
    pub complete: Option<Callback>,
    pub listeners: Vec<RequestListener>,
    pub initializer: Option<Initializer>,
}

impl RequestSettings {
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            priority: None,
            queue: None,
            success: None,
            error: None,
            complete: None,
            listeners: Vec::new(),
            initializer: None,
        }
    }

    pub fn with_queue(mut self, queue: impl Into<QueueRef>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn on_success(mut self, f: impl Fn(&CallbackData) + Send + Sync + 'static) -> Self {
        self.success = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&CallbackData) + Send + Sync + 'static) -> Self {
        self.error = Some(Arc::new(f));
        self
    }

    pub fn on_complete(mut self, f: impl Fn(&CallbackData) + Send + Sync + 'static) -> Self {
        self.complete = Some(Arc::new(f));
        self
    }

    pub fn with_listener(
        mut self,
        f: impl Fn(&RequestHandle, RequestEvent) + Send + Sync + 'static,
    ) -> Self {
        self.listeners.push(Arc::new(f));
        self
    }

    pub fn with_initializer(mut self, f: impl FnOnce(&RequestHandle) + Send + 'static) -> Self {
        self.initializer = Some(Box::new(f));
        self
    }

    /// Queue id this submission targets, if it names one by id.
    pub fn queue_id(&self) -> Option<&str> {
        match &self.queue {
            Some(QueueRef::Id(id)) => Some(id),
            Some(QueueRef::Handle(handle)) => Some(handle.id()),
            None => None,
        }
    }
}

impl fmt::Debug for RequestSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSettings")
            .field("payload", &self.payload)
            .field("priority", &self.priority)
            .field("queue", &self.queue_id())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

pub(crate) struct Request {
    id: RequestId,
    payload: Value,
    priority: Option<i64>,
    queue: Option<Weak<Queue>>,
    state: Mutex<RequestState>,
}

struct RequestState {
    flags: RequestFlags,
    callbacks: [Option<Callback>; 3],
    captured: [Option<CallbackData>; 3],
    /// Outcomes held back until the queue releases them in order.
    recorded: Vec<(Outcome, CallbackData)>,
    listeners: Listeners<RequestListener>,
    abort: Option<CancellationToken>,
}

/// Shared reference to a request. Flags and captured outcomes stay readable
/// after the request leaves its queue.
#[derive(Clone)]
pub struct RequestHandle(Arc<Request>);

impl RequestHandle {
    /// Build a request from settings whose queue reference has already been
    /// resolved. The initializer is returned for the caller to run.
    pub(crate) fn create(
        settings: RequestSettings,
        queue: Option<Weak<Queue>>,
    ) -> (Self, Option<Initializer>) {
        let mut listeners = Listeners::new();
        for listener in settings.listeners {
            listeners.add(listener);
        }
        let request = Request {
            id: NEXT_REQUEST_ID.fetch_add(1, Ordering::SeqCst),
            payload: settings.payload,
            priority: settings.priority,
            queue,
            state: Mutex::new(RequestState {
                flags: RequestFlags::default(),
                callbacks: [settings.success, settings.error, settings.complete],
                captured: [None, None, None],
                recorded: Vec::new(),
                listeners,
                abort: None,
            }),
        };
        (Self(Arc::new(request)), settings.initializer)
    }

    pub fn id(&self) -> RequestId {
        self.0.id
    }

    pub fn payload(&self) -> &Value {
        &self.0.payload
    }

    pub fn priority(&self) -> Option<i64> {
        self.0.priority
    }

    /// Owning queue, if the request was queued and the queue is still alive.
    pub fn queue(&self) -> Option<QueueHandle> {
        self.0.queue.as_ref()?.upgrade().map(QueueHandle::from_arc)
    }

    pub fn queue_id(&self) -> Option<String> {
        self.queue().map(|q| q.id().to_string())
    }

    pub fn flags(&self) -> RequestFlags {
        self.0.state.lock().flags
    }

    pub fn is_sent(&self) -> bool {
        self.flags().sent
    }

    pub fn is_received(&self) -> bool {
        self.flags().received
    }

    pub fn is_processed(&self) -> bool {
        self.flags().processed
    }

    pub fn is_canceled(&self) -> bool {
        self.flags().canceled
    }

    pub fn is_aborted(&self) -> bool {
        self.flags().aborted
    }

    pub fn is_success(&self) -> bool {
        self.flags().success
    }

    pub fn is_error(&self) -> bool {
        self.flags().error
    }

    pub fn is_complete(&self) -> bool {
        self.flags().complete
    }

    pub fn callback(&self, outcome: Outcome) -> Option<Callback> {
        self.0.state.lock().callbacks[outcome.slot()].clone()
    }

    /// Replace a callback. Returns false once the request is processed.
    pub fn set_callback(
        &self,
        outcome: Outcome,
        callback: impl Fn(&CallbackData) + Send + Sync + 'static,
    ) -> bool {
        self.set_callback_arc(outcome, Arc::new(callback))
    }

    pub fn set_callback_arc(&self, outcome: Outcome, callback: Callback) -> bool {
        let mut state = self.0.state.lock();
        if state.flags.processed {
            return false;
        }
        state.callbacks[outcome.slot()] = Some(callback);
        true
    }

    /// Clear a callback. Returns false once the request is processed.
    pub fn clear_callback(&self, outcome: Outcome) -> bool {
        let mut state = self.0.state.lock();
        if state.flags.processed {
            return false;
        }
        state.callbacks[outcome.slot()] = None;
        true
    }

    /// Context recorded the first time `outcome` fired.
    pub fn callback_context(&self, outcome: Outcome) -> Option<Value> {
        self.captured(outcome).map(|data| data.context)
    }

    /// Arguments recorded the first time `outcome` fired.
    pub fn callback_args(&self, outcome: Outcome) -> Option<Vec<Value>> {
        self.captured(outcome).map(|data| data.args)
    }

    fn captured(&self, outcome: Outcome) -> Option<CallbackData> {
        let state = self.0.state.lock();
        if !state.flags.get(outcome.into()) {
            return None;
        }
        state.captured[outcome.slot()].clone()
    }

    pub fn add_listener(
        &self,
        listener: impl Fn(&RequestHandle, RequestEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.0.state.lock().listeners.add(Arc::new(listener))
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.0.state.lock().listeners.remove(id)
    }

    /// Cancel before dispatch, or abort an in-flight call when `abort` is
    /// set. Already canceled or aborted requests return true without side
    /// effects. Returns false once the response has started to arrive.
    pub fn cancel(&self, abort: bool) -> bool {
        let (event, token) = {
            let mut state = self.0.state.lock();
            if state.flags.is_withdrawn() {
                return true;
            }
            if !state.flags.sent {
                state.flags.canceled = true;
                (RequestEvent::Canceled, None)
            } else if abort && !state.flags.received {
                state.flags.aborted = true;
                (RequestEvent::Aborted, state.abort.take())
            } else {
                return false;
            }
        };
        tracing::debug!(request_id = self.id(), event = event.as_str(), "request withdrawn");
        if let Some(token) = token {
            token.cancel();
        }
        self.fire(event);
        if let Some(queue) = self.queue() {
            queue.submit(Command::Withdraw(self.clone()));
        }
        true
    }

    pub fn ptr_eq(&self, other: &RequestHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn fire(&self, event: RequestEvent) {
        let listeners = self.0.state.lock().listeners.snapshot();
        for listener in listeners {
            listener(self, event);
        }
    }

    pub(crate) fn set_flag(&self, flag: Flag) -> bool {
        let changed = self.0.state.lock().flags.set(flag);
        if changed {
            self.fire(flag.into());
        }
        changed
    }

    /// Mark the request as sent unless it was withdrawn first.
    pub(crate) fn try_mark_sent(&self, abort: CancellationToken) -> bool {
        {
            let mut state = self.0.state.lock();
            if state.flags.is_withdrawn() || state.flags.sent {
                return false;
            }
            state.flags.sent = true;
            state.abort = Some(abort);
        }
        self.fire(RequestEvent::Sent);
        true
    }

    /// Mark the response as arriving. Returns `None` if the request was
    /// withdrawn, otherwise whether this call set `received`.
    pub(crate) fn begin_receive(&self) -> Option<bool> {
        let first = {
            let mut state = self.0.state.lock();
            if state.flags.is_withdrawn() {
                return None;
            }
            state.abort = None;
            state.flags.set(Flag::Received)
        };
        if first {
            self.fire(RequestEvent::Received);
        }
        Some(first)
    }

    /// Capture outcome data, run the current callback and set the outcome
    /// flag. `Complete` also marks the request processed.
    pub(crate) fn execute_callback(&self, outcome: Outcome, data: &CallbackData) {
        let callback = {
            let mut state = self.0.state.lock();
            if state.flags.is_withdrawn() {
                return;
            }
            let slot = outcome.slot();
            if state.captured[slot].is_none() {
                state.captured[slot] = Some(data.clone());
            }
            state.callbacks[slot].clone()
        };
        if let Some(callback) = callback {
            callback(data);
        }
        self.set_flag(outcome.into());
        if outcome == Outcome::Complete {
            self.set_flag(Flag::Processed);
        }
    }

    pub(crate) fn record(&self, outcome: Outcome, data: CallbackData) {
        self.0.state.lock().recorded.push((outcome, data));
    }

    /// Recorded outcomes in execution order: success/error, then complete.
    pub(crate) fn take_recorded(&self) -> Vec<(Outcome, CallbackData)> {
        let mut recorded = std::mem::take(&mut self.0.state.lock().recorded);
        recorded.sort_by_key(|(outcome, _)| outcome.slot());
        recorded
    }
}

impl Prioritized for RequestHandle {
    fn priority(&self) -> Option<i64> {
        self.0.priority
    }

    fn key(&self) -> u64 {
        self.0.id
    }
}

impl fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandle")
            .field("id", &self.id())
            .field("priority", &self.priority())
            .field("flags", &self.flags())
            .finish()
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
