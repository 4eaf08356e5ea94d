//! Ordered effects published by a session.

use std::time::Duration;

use crate::connection::ConnectionStatus;
use crate::polling::PollKind;
use crate::session::action::Action;

/// Something the session did, in the order it did it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// An action was applied, whether sent by a caller or by the session itself.
    Dispatched(Action),
    StatusChanged {
        from: ConnectionStatus,
        to: ConnectionStatus,
    },
    ReconnectScheduled {
        attempt: u32,
        delay: Duration,
    },
    /// `attempt` is `None` for the session's first handshake.
    HandshakeStarted {
        attempt: Option<u32>,
    },
    PollingPaused,
    PollingResumed,
    FetchSkipped {
        task: PollKind,
    },
    FetchFailed {
        task: PollKind,
        error: String,
    },
}
