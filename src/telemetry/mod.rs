//! Telemetry module for GG-DISPATCH.
//!
//! Provides structured logging, per-request tracing spans and metrics.
//! Metrics go through the `metrics` facade; no recorder is installed here.

mod logging;
mod metrics;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use self::metrics::{
    record_aborted, record_added, record_callback, record_canceled, record_pending,
    record_processed, record_sent,
};
pub use spans::{RequestSpan, SpanExt};
