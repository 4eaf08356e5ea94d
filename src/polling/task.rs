//! Polling task state.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// The two recurring fetches of a chat session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PollKind {
    /// Channel-list refresh (`elementalChat/setChannelPolling`).
    Channels,
    /// Presence refresh (`elementalChat/setRefreshChatterInterval`).
    Chatter,
}

impl PollKind {
    pub const ALL: [PollKind; 2] = [PollKind::Channels, PollKind::Chatter];

    pub fn name(&self) -> &'static str {
        match self {
            PollKind::Channels => "channel-poll",
            PollKind::Chatter => "chatter-poll",
        }
    }
}

impl fmt::Display for PollKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A recurring, non-overlapping fetch.
#[derive(Debug, Clone)]
pub struct PollingTask {
    pub kind: PollKind,
    pub interval: Duration,
    pub in_flight: bool,
    pub last_error: Option<String>,
    /// Generation of the ticker currently driving this task.
    pub timer_epoch: u64,
    pub fetches_completed: u64,
    pub fetches_failed: u64,
    pub ticks_skipped: u64,
}

impl PollingTask {
    pub fn new(kind: PollKind, interval: Duration) -> Self {
        Self {
            kind,
            interval,
            in_flight: false,
            last_error: None,
            timer_epoch: 0,
            fetches_completed: 0,
            fetches_failed: 0,
            ticks_skipped: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}
