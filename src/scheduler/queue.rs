//! Queue management: admission, selection and the two dispatch modes.
//!
//! Admission inserts into the pending list and announces `added` before the
//! submitting call returns. Every later scheduling step is a [`Command`]
//! pushed onto the queue's inbox. The first caller to find the inbox idle
//! becomes its drainer and runs commands one at a time until the inbox is
//! empty, so selection, dispatch, completion and cancellation bookkeeping
//! never interleave on one queue. Commands pushed from callbacks or
//! listeners run after the current one. No lock is held while user code
//! runs.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::event::{ListenerId, Listeners, QueueEvent, QueueListener, RequestEvent};
use super::priority::{Order, PendingList, PriorityPolicy};
use super::request::{Flag, Outcome, RequestHandle, RequestSettings};
use super::worker::Dispatcher;
use crate::engine::transport::TransportReply;
use crate::engine::EngineError;
use crate::telemetry;

/// Coupling between dispatch and completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// One request in flight; the next is sent after the previous completes.
    #[default]
    Request,
    /// All eligible requests are sent; callbacks run in queue order.
    Response,
}

impl FromStr for Mode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "request" => Ok(Self::Request),
            "response" => Ok(Self::Response),
            other => Err(EngineError::InvalidSetting { name: "mode", value: other.to_string() }),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Request => "request",
            Self::Response => "response",
        })
    }
}

fn default_enabled() -> bool {
    true
}

/// Declarative queue policy. Also the shape of `[[queues]]` in config files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    pub id: String,
    #[serde(default)]
    pub order: Order,
    #[serde(default)]
    pub priority: PriorityPolicy,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl QueueConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            order: Order::default(),
            priority: PriorityPolicy::default(),
            mode: Mode::default(),
            enabled: true,
        }
    }
}

/// One-shot hook run with the new queue handle after registration.
pub type QueueInitializer = Box<dyn FnOnce(&QueueHandle) + Send>;

/// Queue creation settings.
pub struct QueueSettings {
    pub config: QueueConfig,
    pub listeners: Vec<QueueListener>,
    pub initializer: Option<QueueInitializer>,
}

impl QueueSettings {
    pub fn new(id: impl Into<String>) -> Self {
        QueueConfig::new(id).into()
    }

    pub fn order(mut self, order: Order) -> Self {
        self.config.order = order;
        self
    }

    pub fn priority(mut self, priority: PriorityPolicy) -> Self {
        self.config.priority = priority;
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.config.enabled = false;
        self
    }

    pub fn with_listener(
        mut self,
        f: impl Fn(&QueueHandle, &QueueEvent) + Send + Sync + 'static,
    ) -> Self {
        self.listeners.push(Arc::new(f));
        self
    }

    pub fn with_initializer(mut self, f: impl FnOnce(&QueueHandle) + Send + 'static) -> Self {
        self.initializer = Some(Box::new(f));
        self
    }
}

impl From<QueueConfig> for QueueSettings {
    fn from(config: QueueConfig) -> Self {
        Self { config, listeners: Vec::new(), initializer: None }
    }
}

impl fmt::Debug for QueueSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueSettings")
            .field("config", &self.config)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// A queue addressed either by id or by handle. Resolved once at admission.
#[derive(Debug, Clone)]
pub enum QueueRef {
    Id(String),
    Handle(QueueHandle),
}

impl From<&str> for QueueRef {
    fn from(id: &str) -> Self {
        Self::Id(id.to_string())
    }
}

impl From<String> for QueueRef {
    fn from(id: String) -> Self {
        Self::Id(id)
    }
}

impl From<QueueHandle> for QueueRef {
    fn from(handle: QueueHandle) -> Self {
        Self::Handle(handle)
    }
}

impl From<&QueueHandle> for QueueRef {
    fn from(handle: &QueueHandle) -> Self {
        Self::Handle(handle.clone())
    }
}

/// Per-outcome callback execution counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackCounters {
    pub success: u64,
    pub error: u64,
    pub complete: u64,
}

impl CallbackCounters {
    fn bump(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Success => self.success += 1,
            Outcome::Error => self.error += 1,
            Outcome::Complete => self.complete += 1,
        }
    }
}

/// Queue counters. `pending` is the current length of the pending list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounters {
    pub added: u64,
    pub sent: u64,
    pub received: u64,
    pub processed: u64,
    pub canceled: u64,
    pub aborted: u64,
    pub pending: usize,
    pub callbacks: CallbackCounters,
}

pub(crate) enum Command {
    Pump,
    Settle(RequestHandle, TransportReply),
    Withdraw(RequestHandle),
    Enabled,
    Disabled,
}

pub(crate) struct Queue {
    config: QueueConfig,
    dispatcher: Dispatcher,
    state: Mutex<QueueState>,
    inbox: Mutex<Inbox>,
}

struct QueueState {
    enabled: bool,
    locked: bool,
    pending: PendingList<RequestHandle>,
    counters: QueueCounters,
    listeners: Listeners<QueueListener>,
}

#[derive(Default)]
struct Inbox {
    commands: VecDeque<Command>,
    draining: bool,
}

/// Resets the drain flag if a callback panics mid-drain.
struct DrainGuard<'a>(&'a Mutex<Inbox>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let mut inbox = self.0.lock();
            inbox.draining = false;
            inbox.commands.clear();
        }
    }
}

fn awaiting_dispatch(request: &RequestHandle) -> bool {
    let flags = request.flags();
    !flags.sent && !flags.canceled
}

fn awaiting_processing(request: &RequestHandle) -> bool {
    let flags = request.flags();
    flags.sent && !flags.aborted && !flags.processed
}

/// Shared reference to a registered queue.
#[derive(Clone)]
pub struct QueueHandle(Arc<Queue>);

impl QueueHandle {
    pub(crate) fn create(
        config: QueueConfig,
        listeners: Vec<QueueListener>,
        dispatcher: Dispatcher,
    ) -> Self {
        let mut list = Listeners::new();
        for listener in listeners {
            list.add(listener);
        }
        let queue = Queue {
            state: Mutex::new(QueueState {
                enabled: config.enabled,
                locked: false,
                pending: PendingList::new(),
                counters: QueueCounters::default(),
                listeners: list,
            }),
            inbox: Mutex::new(Inbox::default()),
            config,
            dispatcher,
        };
        Self(Arc::new(queue))
    }

    pub(crate) fn from_arc(queue: Arc<Queue>) -> Self {
        Self(queue)
    }

    fn downgrade(&self) -> Weak<Queue> {
        Arc::downgrade(&self.0)
    }

    pub fn id(&self) -> &str {
        &self.0.config.id
    }

    /// Policy this queue was created with. `enabled` is the initial state.
    pub fn settings(&self) -> &QueueConfig {
        &self.0.config
    }

    pub fn mode(&self) -> Mode {
        self.0.config.mode
    }

    pub fn is_enabled(&self) -> bool {
        self.0.state.lock().enabled
    }

    /// True while a request-mode queue waits for its in-flight request.
    pub fn is_locked(&self) -> bool {
        self.0.state.lock().locked
    }

    pub fn enable(&self) -> &Self {
        self.0.state.lock().enabled = true;
        tracing::debug!(queue_id = self.id(), "queue enabled");
        self.submit(Command::Enabled);
        self
    }

    /// Stop dispatching. In-flight requests are unaffected.
    pub fn disable(&self) -> &Self {
        self.0.state.lock().enabled = false;
        tracing::debug!(queue_id = self.id(), "queue disabled");
        self.submit(Command::Disabled);
        self
    }

    pub fn toggle(&self) -> &Self {
        let enabled = {
            let mut state = self.0.state.lock();
            state.enabled = !state.enabled;
            state.enabled
        };
        tracing::debug!(queue_id = self.id(), enabled, "queue toggled");
        self.submit(if enabled { Command::Enabled } else { Command::Disabled });
        self
    }

    /// Cancel every pending request, aborting in-flight ones when `abort`
    /// is set.
    pub fn cancel(&self, abort: bool) -> &Self {
        for request in self.requests() {
            request.cancel(abort);
        }
        self
    }

    /// Pending requests in list order.
    pub fn requests(&self) -> Vec<RequestHandle> {
        self.0.state.lock().pending.iter().cloned().collect()
    }

    pub fn counters(&self) -> QueueCounters {
        let state = self.0.state.lock();
        QueueCounters { pending: state.pending.len(), ..state.counters }
    }

    pub fn add_listener(
        &self,
        listener: impl Fn(&QueueHandle, &QueueEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        self.0.state.lock().listeners.add(Arc::new(listener))
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.0.state.lock().listeners.remove(id)
    }

    pub fn ptr_eq(&self, other: &QueueHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Build a request owned by this queue, run its initializer and admit
    /// it. A request canceled by its initializer is never admitted.
    pub(crate) fn admit(&self, settings: RequestSettings) -> RequestHandle {
        let (request, initializer) = RequestHandle::create(settings, Some(self.downgrade()));
        if let Some(initializer) = initializer {
            initializer(&request);
        }
        let admitted = {
            let mut state = self.0.state.lock();
            if request.is_canceled() {
                None
            } else {
                state.counters.added += 1;
                state.pending.insert(request.clone(), self.0.config.order);
                Some(state.pending.len())
            }
        };
        let Some(pending) = admitted else {
            tracing::debug!(queue_id = self.id(), request_id = request.id(), "request withdrawn before admission");
            return request;
        };
        tracing::debug!(queue_id = self.id(), request_id = request.id(), pending, "request added");
        telemetry::record_added(self.id());
        telemetry::record_pending(self.id(), pending);
        request.fire(RequestEvent::Added);
        self.emit(QueueEvent::Added(request.clone()));
        self.submit(Command::Pump);
        request
    }

    /// Transport reply for a request dispatched by this queue.
    pub(crate) fn settle(&self, request: RequestHandle, reply: TransportReply) {
        self.submit(Command::Settle(request, reply));
    }

    pub(crate) fn submit(&self, command: Command) {
        {
            let mut inbox = self.0.inbox.lock();
            inbox.commands.push_back(command);
            if inbox.draining {
                return;
            }
            inbox.draining = true;
        }
        let _guard = DrainGuard(&self.0.inbox);
        loop {
            let command = {
                let mut inbox = self.0.inbox.lock();
                match inbox.commands.pop_front() {
                    Some(command) => command,
                    None => {
                        inbox.draining = false;
                        return;
                    }
                }
            };
            self.run(command);
        }
    }

    fn run(&self, command: Command) {
        match command {
            Command::Pump => self.send_requests(),
            Command::Settle(request, reply) => match self.mode() {
                Mode::Request => self.settle_serial(request, reply),
                Mode::Response => self.settle_pipelined(request, reply),
            },
            Command::Withdraw(request) => self.cancel_request(request),
            Command::Enabled => {
                self.emit(QueueEvent::Enabled);
                self.send_requests();
            }
            Command::Disabled => self.emit(QueueEvent::Disabled),
        }
    }

    fn emit(&self, event: QueueEvent) {
        let listeners = self.0.state.lock().listeners.snapshot();
        for listener in listeners {
            listener(self, &event);
        }
    }

    fn select(&self, eligible: fn(&RequestHandle) -> bool) -> Option<RequestHandle> {
        self.0.state.lock().pending.select(self.0.config.priority, eligible).cloned()
    }

    fn send_requests(&self) {
        match self.mode() {
            Mode::Request => self.send_serial(),
            Mode::Response => self.send_pipelined(),
        }
    }

    /// Dispatch the next eligible request unless one is already in flight.
    fn send_serial(&self) {
        loop {
            let next = {
                let state = self.0.state.lock();
                if !state.enabled || state.locked {
                    return;
                }
                state.pending.select(self.0.config.priority, awaiting_dispatch).cloned()
            };
            let Some(request) = next else { return };
            if !self.dispatch(&request) {
                continue;
            }
            let more = {
                let mut state = self.0.state.lock();
                state.locked = true;
                state.counters.sent += 1;
                state.pending.select(self.0.config.priority, awaiting_dispatch).is_some()
            };
            self.emit(QueueEvent::Sent(request));
            if !more {
                self.emit(QueueEvent::AllSent);
            }
            return;
        }
    }

    /// Dispatch every eligible request back to back.
    fn send_pipelined(&self) {
        let mut sent_any = false;
        loop {
            let next = {
                let state = self.0.state.lock();
                if !state.enabled {
                    break;
                }
                state.pending.select(self.0.config.priority, awaiting_dispatch).cloned()
            };
            let Some(request) = next else { break };
            if !self.dispatch(&request) {
                continue;
            }
            self.0.state.lock().counters.sent += 1;
            sent_any = true;
            self.emit(QueueEvent::Sent(request));
        }
        if sent_any && self.select(awaiting_dispatch).is_none() {
            self.emit(QueueEvent::AllSent);
        }
    }

    fn dispatch(&self, request: &RequestHandle) -> bool {
        let abort = CancellationToken::new();
        if !request.try_mark_sent(abort.clone()) {
            return false;
        }
        tracing::debug!(queue_id = self.id(), request_id = request.id(), "request sent");
        telemetry::record_sent(self.id());
        self.0.dispatcher.spawn(request.clone(), Some(self.clone()), abort);
        true
    }

    /// Request mode: run each outcome as it arrives, then release the lock
    /// on `complete` and move on to the next request.
    fn settle_serial(&self, request: RequestHandle, reply: TransportReply) {
        for (outcome, data) in reply.into_signals() {
            let Some(first) = request.begin_receive() else {
                tracing::debug!(queue_id = self.id(), request_id = request.id(), "discarding reply for withdrawn request");
                return;
            };
            if first {
                self.0.state.lock().counters.received += 1;
                self.emit(QueueEvent::Received(request.clone()));
            }
            request.execute_callback(outcome, &data);
            self.emit(QueueEvent::for_outcome(outcome, request.clone()));
            self.0.state.lock().counters.callbacks.bump(outcome);
            telemetry::record_callback(self.id(), outcome);
            if outcome == Outcome::Complete {
                let (more, pending) = {
                    let mut state = self.0.state.lock();
                    state.pending.remove(request.id());
                    state.counters.processed += 1;
                    state.locked = false;
                    let more = state.pending.select(self.0.config.priority, awaiting_dispatch).is_some();
                    (more, state.pending.len())
                };
                tracing::debug!(queue_id = self.id(), request_id = request.id(), "request processed");
                telemetry::record_processed(self.id());
                telemetry::record_pending(self.id(), pending);
                self.emit(QueueEvent::Processed(request.clone()));
                if more {
                    self.send_serial();
                } else {
                    self.emit(QueueEvent::AllProcessed);
                }
            }
        }
    }

    /// Response mode: hold the outcomes and let `process_requests` release
    /// them in queue order.
    fn settle_pipelined(&self, request: RequestHandle, reply: TransportReply) {
        for (outcome, data) in reply.into_signals() {
            request.record(outcome, data);
        }
        if request.begin_receive().is_none() {
            tracing::debug!(queue_id = self.id(), request_id = request.id(), "discarding reply for withdrawn request");
            return;
        }
        self.0.state.lock().counters.received += 1;
        self.emit(QueueEvent::Received(request));
        self.process_requests();
    }

    /// Run held outcomes for the head of the queue until it reaches a
    /// request whose response has not arrived yet.
    fn process_requests(&self) {
        loop {
            let Some(request) = self.select(awaiting_processing) else { break };
            if !request.is_received() {
                return;
            }
            for (outcome, data) in request.take_recorded() {
                request.execute_callback(outcome, &data);
                self.emit(QueueEvent::for_outcome(outcome, request.clone()));
                self.0.state.lock().counters.callbacks.bump(outcome);
                telemetry::record_callback(self.id(), outcome);
            }
            let pending = {
                let mut state = self.0.state.lock();
                state.counters.processed += 1;
                state.pending.remove(request.id());
                state.pending.len()
            };
            request.set_flag(Flag::Processed);
            tracing::debug!(queue_id = self.id(), request_id = request.id(), "request processed");
            telemetry::record_processed(self.id());
            telemetry::record_pending(self.id(), pending);
            self.emit(QueueEvent::Processed(request));
        }
        let idle = self.0.state.lock().pending.iter().all(|r| r.is_processed());
        if idle {
            self.emit(QueueEvent::AllProcessed);
        }
    }

    /// Bookkeeping after a request withdrew itself. Requests that never
    /// reached the pending list leave no trace on the queue.
    fn cancel_request(&self, request: RequestHandle) {
        let flags = request.flags();
        let aborted = flags.aborted && !flags.processed;
        if !flags.canceled && !aborted {
            return;
        }
        let pending = {
            let mut state = self.0.state.lock();
            if state.pending.remove(request.id()).is_none() {
                return;
            }
            if flags.canceled {
                state.counters.canceled += 1;
            } else {
                state.counters.aborted += 1;
                if self.0.config.mode == Mode::Request {
                    state.locked = false;
                }
            }
            state.pending.len()
        };
        telemetry::record_pending(self.id(), pending);
        if flags.canceled {
            telemetry::record_canceled(self.id());
            self.emit(QueueEvent::Canceled(request));
            return;
        }
        tracing::info!(queue_id = self.id(), request_id = request.id(), "request aborted");
        telemetry::record_aborted(self.id());
        self.emit(QueueEvent::Aborted(request));
        match self.0.config.mode {
            Mode::Request => self.send_serial(),
            Mode::Response => self.process_requests(),
        }
    }
}

impl fmt::Debug for QueueHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueHandle")
            .field("id", &self.id())
            .field("mode", &self.mode())
            .field("enabled", &self.is_enabled())
            .field("locked", &self.is_locked())
            .finish()
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
