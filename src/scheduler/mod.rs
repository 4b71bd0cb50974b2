//! Request scheduling for GG-DISPATCH.
//!
//! Manages request admission, priority selection, the request/response
//! dispatch modes, cancellation and lifecycle events.

mod event;
mod priority;
mod queue;
mod request;
mod worker;

pub use event::{ListenerId, Listeners, QueueEvent, QueueListener, RequestEvent, RequestListener};
pub use priority::{Order, PendingList, Prioritized, PriorityPolicy};
pub use queue::{
    CallbackCounters, Mode, QueueConfig, QueueCounters, QueueHandle, QueueInitializer, QueueRef,
    QueueSettings,
};
pub use request::{
    Callback, CallbackData, Flag, Initializer, Outcome, RequestFlags, RequestHandle, RequestId,
    RequestSettings,
};

pub(crate) use worker::Dispatcher;

#[cfg(test)]
pub(crate) mod testing;
