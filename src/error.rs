//! Error taxonomy for the resilience manager.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the transport boundary and the session facade.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResilienceError {
    /// The link to the backend is gone. Triggers the reconnect cycle.
    #[error("connectivity lost: {0}")]
    ConnectivityLoss(String),

    /// A fetch failed but the link is believed healthy.
    #[error("fetch failed: {0}")]
    TransientFetch(String),

    /// A boundary call exceeded its deadline.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// Malformed configuration or command payload. Never retried.
    #[error("invalid configuration: {0}")]
    FatalConfiguration(String),

    /// The session has been torn down.
    #[error("session closed")]
    SessionClosed,
}

impl ResilienceError {
    /// Whether this failure means the backend link itself is lost.
    pub fn is_connectivity_loss(&self) -> bool {
        matches!(self, ResilienceError::ConnectivityLoss(_))
    }
}

/// Result type for resilience operations.
pub type ResilienceResult<T> = Result<T, ResilienceError>;
