//! Externally observable session state.

use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

use crate::connection::ConnectionStatus;
use crate::polling::PollingTask;

/// Read-only view of one polling task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollingTaskView {
    pub name: &'static str,
    pub interval: Duration,
    pub in_flight: bool,
    pub last_error: Option<String>,
    pub fetches_completed: u64,
    pub fetches_failed: u64,
    pub ticks_skipped: u64,
}

impl From<&PollingTask> for PollingTaskView {
    fn from(task: &PollingTask) -> Self {
        Self {
            name: task.name(),
            interval: task.interval,
            in_flight: task.in_flight,
            last_error: task.last_error.clone(),
            fetches_completed: task.fetches_completed,
            fetches_failed: task.fetches_failed,
            ticks_skipped: task.ticks_skipped,
        }
    }
}

/// Snapshot of a session. Derived from session state after every event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResilienceState {
    pub session_id: Uuid,
    pub status: ConnectionStatus,
    /// Remaining time before the next reconnect attempt, zero when none is armed.
    pub reconnecting_in: Duration,
    pub polling_active: bool,
    pub reconnect_attempt: Option<u32>,
    pub last_error: Option<String>,
    pub channel_poll: Option<PollingTaskView>,
    pub chatter_poll: Option<PollingTaskView>,
}

impl ResilienceState {
    pub(crate) fn initial(session_id: Uuid) -> Self {
        Self {
            session_id,
            status: ConnectionStatus::Connected,
            reconnecting_in: Duration::ZERO,
            polling_active: false,
            reconnect_attempt: None,
            last_error: None,
            channel_poll: None,
            chatter_poll: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }
}
