//! Error types for the runtime
//!
//! Application-level failures belong to a future's own output type. These
//! variants cover only what the executor itself enforces or reports.

use crate::task::TaskId;
use thiserror::Error;

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors the runtime can report
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// A future was polled again after it returned `Poll::Ready`
    #[error("future polled after completion")]
    PolledAfterCompletion,

    /// `spawn` was called outside of `block_on`
    #[error("no executor is running on this thread")]
    NoRuntime,

    /// Configuration failed to parse or validate
    #[error("invalid config: {reason}")]
    InvalidConfig { reason: String },

    /// A spawned task panicked and was terminated
    #[error("{task} panicked: {message}")]
    TaskPanicked { task: TaskId, message: String },
}
