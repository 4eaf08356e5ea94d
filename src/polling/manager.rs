//! Polling manager.
//!
//! # Responsibilities
//! - Own the channel and chatter polling tasks
//! - Decide per tick whether a fetch runs (skip while one is in flight)
//! - Pause both tickers while the link is down, resume with the same intervals
//! - Classify fetch failures (record, or report connectivity loss)

use std::time::Duration;

use crate::error::{ResilienceError, ResilienceResult};
use crate::polling::task::{PollKind, PollingTask};

/// Ticker work for the owner of the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEffect {
    /// (Re)start the ticker for `kind`, replacing any running one.
    StartTicker {
        kind: PollKind,
        epoch: u64,
        interval: Duration,
    },
    /// Stop the ticker for `kind`.
    StopTicker { kind: PollKind },
}

/// What a tick resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    /// Run the fetch and report back with `cycle`.
    Fetch { cycle: u64 },
    /// Previous fetch still in flight.
    Skipped,
    /// Stale ticker or paused manager.
    Ignored,
}

/// Result of applying a completed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Completed { items: usize },
    Failed { error: String },
    /// Failure classified as link loss; the owner must signal a disconnect.
    ConnectivityLost { error: String },
    /// Completed after a pause or teardown; result dropped.
    Discarded,
}

#[derive(Debug)]
pub struct PollingManager {
    channels: Option<PollingTask>,
    chatter: Option<PollingTask>,
    paused: bool,
    /// Bumped on every pause; fetches started in an older cycle are discarded.
    cycle: u64,
    disconnect_on_loss: bool,
}

impl PollingManager {
    pub fn new(disconnect_on_loss: bool) -> Self {
        Self {
            channels: None,
            chatter: None,
            paused: false,
            cycle: 0,
            disconnect_on_loss,
        }
    }

    pub fn task(&self, kind: PollKind) -> Option<&PollingTask> {
        match kind {
            PollKind::Channels => self.channels.as_ref(),
            PollKind::Chatter => self.chatter.as_ref(),
        }
    }

    fn task_mut(&mut self, kind: PollKind) -> Option<&mut PollingTask> {
        match kind {
            PollKind::Channels => self.channels.as_mut(),
            PollKind::Chatter => self.chatter.as_mut(),
        }
    }

    fn slot(&mut self, kind: PollKind) -> &mut Option<PollingTask> {
        match kind {
            PollKind::Channels => &mut self.channels,
            PollKind::Chatter => &mut self.chatter,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// True when at least one task exists and tickers are running.
    pub fn is_active(&self) -> bool {
        !self.paused && (self.channels.is_some() || self.chatter.is_some())
    }

    /// (Re)start a task with `interval`. Last writer wins.
    pub fn set_interval(&mut self, kind: PollKind, interval: Duration) -> ResilienceResult<Vec<PollEffect>> {
        if interval.is_zero() {
            return Err(ResilienceError::FatalConfiguration(format!(
                "{} interval must be non-zero",
                kind
            )));
        }

        let paused = self.paused;
        let task = self.slot(kind).get_or_insert_with(|| PollingTask::new(kind, interval));
        task.interval = interval;
        task.timer_epoch += 1;

        if paused {
            return Ok(Vec::new());
        }
        Ok(vec![PollEffect::StartTicker {
            kind,
            epoch: task.timer_epoch,
            interval,
        }])
    }

    /// Stop all tickers. In-flight fetches finish but their results are dropped.
    pub fn pause(&mut self) -> Vec<PollEffect> {
        if self.paused {
            return Vec::new();
        }
        self.paused = true;
        self.cycle += 1;

        let mut effects = Vec::new();
        for kind in PollKind::ALL {
            if let Some(task) = self.task_mut(kind) {
                task.timer_epoch += 1;
                effects.push(PollEffect::StopTicker { kind });
            }
        }
        effects
    }

    /// Restart tickers with the intervals configured before the pause.
    pub fn resume(&mut self) -> Vec<PollEffect> {
        if !self.paused {
            return Vec::new();
        }
        self.paused = false;

        let mut effects = Vec::new();
        for kind in PollKind::ALL {
            if let Some(task) = self.task_mut(kind) {
                task.timer_epoch += 1;
                effects.push(PollEffect::StartTicker {
                    kind,
                    epoch: task.timer_epoch,
                    interval: task.interval,
                });
            }
        }
        effects
    }

    /// A ticker for `kind` tagged `epoch` fired.
    pub fn on_tick(&mut self, kind: PollKind, epoch: u64) -> TickDecision {
        let paused = self.paused;
        let cycle = self.cycle;
        let Some(task) = self.task_mut(kind) else {
            return TickDecision::Ignored;
        };
        if paused || task.timer_epoch != epoch {
            return TickDecision::Ignored;
        }
        if task.in_flight {
            task.ticks_skipped += 1;
            return TickDecision::Skipped;
        }
        task.in_flight = true;
        TickDecision::Fetch { cycle }
    }

    /// A fetch started in `cycle` finished.
    pub fn on_fetch_complete(
        &mut self,
        kind: PollKind,
        cycle: u64,
        result: ResilienceResult<usize>,
    ) -> FetchOutcome {
        let current = !self.paused && cycle == self.cycle;
        let disconnect_on_loss = self.disconnect_on_loss;
        let Some(task) = self.task_mut(kind) else {
            return FetchOutcome::Discarded;
        };
        task.in_flight = false;
        if !current {
            return FetchOutcome::Discarded;
        }

        match result {
            Ok(items) => {
                task.fetches_completed += 1;
                task.last_error = None;
                FetchOutcome::Completed { items }
            }
            Err(err) => {
                task.fetches_failed += 1;
                let error = err.to_string();
                task.last_error = Some(error.clone());
                if disconnect_on_loss && err.is_connectivity_loss() {
                    FetchOutcome::ConnectivityLost { error }
                } else {
                    FetchOutcome::Failed { error }
                }
            }
        }
    }

    /// Destroy both tasks.
    pub fn teardown(&mut self) -> Vec<PollEffect> {
        self.cycle += 1;
        let mut effects = Vec::new();
        for kind in PollKind::ALL {
            if self.slot(kind).take().is_some() {
                effects.push(PollEffect::StopTicker { kind });
            }
        }
        effects
    }
}
