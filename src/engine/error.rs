//! Engine error types for GG-DISPATCH.
//!
//! Every error here is raised synchronously at the call site and is never
//! retried. A transport `error` signal is an ordinary outcome and never
//! surfaces as an `EngineError`.

use thiserror::Error;

/// Errors raised by engine, queue and filter operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Queue '{0}' already exists")]
    DuplicateQueue(String),

    #[error("Queue '{0}' does not exist")]
    UnknownQueue(String),

    #[error("No queue id")]
    MissingQueueId,

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Incorrect callback name: {0}")]
    InvalidOutcome(String),

    #[error("Incorrect flag name: {0}")]
    InvalidFlag(String),

    #[error("Incorrect value for {name}: {value}")]
    InvalidSetting { name: &'static str, value: String },

    #[error("No tokio runtime available to dispatch transport calls")]
    NoRuntime,
}

impl EngineError {
    /// Returns true for errors that indicate a programmer error rather than
    /// a configuration problem.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::InvalidOutcome(_) | Self::InvalidFlag(_) | Self::InvalidSetting { .. }
        )
    }

    /// Returns true for registration and lookup failures.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::DuplicateQueue(_)
                | Self::UnknownQueue(_)
                | Self::MissingQueueId
                | Self::InvalidFilter(_)
                | Self::NoRuntime
        )
    }
}
