//! Core error taxonomy shared by every port and service.

use thiserror::Error;

/// Error kinds surfaced by the orchestration core.
///
/// Propagation policy (see design notes): `QueueFull`, `BackgroundDisabled`
/// and `Overloaded` are surfaced synchronously with no internal retry.
/// `ProviderError` is delivered via the LLM request callback; the caller
/// owns retry policy. `TransientIO` is retried internally up to a fixed
/// budget before escalating to `InvariantViolation` on state-mutating
/// paths.
#[derive(Debug, Error, Clone)]
pub enum CoreError {
    #[error("queue is at capacity")]
    QueueFull,

    #[error("background LLM requests are currently disabled")]
    BackgroundDisabled,

    #[error("request deadline exceeded before dispatch")]
    DeadlineExceeded,

    #[error("request was cancelled")]
    Cancelled,

    #[error("provider error (status={status:?}, retryable={retryable}): {body_excerpt}")]
    ProviderError {
        status: Option<u16>,
        body_excerpt: String,
        retryable: bool,
    },

    #[error("downstream is overloaded")]
    Overloaded,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("transient I/O error: {0}")]
    TransientIO(String),

    #[error("operation timed out")]
    Timeout,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

impl CoreError {
    /// Whether this error kind should be retried internally with
    /// exponential back-off against a fixed attempt budget (KV/bus I/O),
    /// per the error-handling design's `TransientIO` policy.
    pub fn is_transient_io(&self) -> bool {
        matches!(self, CoreError::TransientIO(_))
    }

    /// Whether a synchronous caller should render a distinct "system busy"
    /// signal rather than hang, per the error-handling design's
    /// user-visible behavior clause.
    pub fn is_busy_signal(&self) -> bool {
        matches!(
            self,
            CoreError::QueueFull | CoreError::Overloaded | CoreError::BackgroundDisabled
        )
    }
}
