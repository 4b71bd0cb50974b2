//! GG-DISPATCH
//!
//! A request admission and ordering engine. Work is submitted as opaque
//! payloads, optionally rewritten by admission filters, and either
//! dispatched immediately or admitted to a named queue. Each queue decides
//! which pending request is sent next and when outcome callbacks run.
//!
//! # Dispatch modes
//!
//! - **request**: at most one request in flight per queue. The next
//!   request is sent once the previous one completes.
//! - **response**: every eligible request is sent at once. Outcome
//!   callbacks still run in queue selection order, whatever order the
//!   transport replies in.
//!
//! The engine never performs I/O itself; a [`engine::Transport`] carries
//! the payload and reports `success`/`error` followed by `complete`.
//!
//! ```no_run
//! use std::sync::Arc;
//! use gg_dispatch::{Engine, QueueSettings, RequestSettings, SimulatedTransport};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), gg_dispatch::EngineError> {
//! let engine = Engine::new(Arc::new(SimulatedTransport::default()))?;
//! engine.create_queue(QueueSettings::new("uploads"))?;
//! let request = engine.submit(
//!     RequestSettings::new(json!({ "sleep": 5 }))
//!         .with_queue("uploads")
//!         .on_success(|data| println!("done: {:?}", data.args)),
//! )?;
//! assert!(request.is_sent());
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod engine;
pub mod scheduler;
pub mod telemetry;

pub use engine::{
    Condition, Engine, EngineError, FilterHandle, SimulatedTransport, Transport, TransportCall,
    TransportReply,
};
pub use scheduler::{
    CallbackData, Flag, Mode, Order, Outcome, PriorityPolicy, QueueEvent, QueueHandle, QueueRef,
    QueueSettings, RequestEvent, RequestHandle, RequestSettings,
};
