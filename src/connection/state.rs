//! Connection status and reconnect attempt bookkeeping.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Connectivity to the backend conductor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ConnectionStatus {
    #[default]
    Connected,
    Disconnected,
    Reconnecting,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Reconnecting => "reconnecting",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scheduled reconnect. Recreated on every disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectAttempt {
    pub attempt_number: u32,
    pub delay: Duration,
    pub scheduled_at: Instant,
}

impl ReconnectAttempt {
    /// When the armed timer is due.
    pub fn due_at(&self) -> Instant {
        self.scheduled_at + self.delay
    }
}
