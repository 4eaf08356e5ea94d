//! Connection state machine.
//!
//! # States
//! - Connected: initial; polling runs
//! - Disconnected: link lost, nothing armed (only persists when auto-reconnect is off)
//! - Reconnecting: a reconnect attempt is armed or in flight
//!
//! # State Transitions
//! ```text
//! Connected | Reconnecting → Disconnected: signal_disconnect
//! Disconnected → Reconnecting: immediately, attempt 0 armed with next_delay(0)
//! Reconnecting → Connected: handshake succeeds
//! Reconnecting → Reconnecting: handshake fails, attempt n+1 armed
//! any → Connected: reset (no handshake)
//! ```
//!
//! The machine performs no I/O. Every operation returns the effects the owner
//! must carry out. Each arming bumps `epoch`; timer and handshake results
//! carrying an older epoch are ignored.

use std::time::Duration;
use tokio::time::Instant;

use crate::connection::state::{ConnectionStatus, ReconnectAttempt};
use crate::error::ResilienceError;
use crate::resilience::BackoffPolicy;

/// Work the owner of the machine has to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEffect {
    /// Status changed.
    Transition {
        from: ConnectionStatus,
        to: ConnectionStatus,
    },
    /// Drop the armed reconnect timer.
    CancelTimer,
    /// Arm a reconnect timer that reports back with `epoch`.
    ScheduleReconnect { epoch: u64, attempt: u32, delay: Duration },
    /// Call the transport handshake and report back with `epoch`.
    Handshake { epoch: u64, attempt: Option<u32> },
    /// A handshake succeeded.
    Established,
}

/// Owns connectivity status and reconnect accounting for one session.
#[derive(Debug)]
pub struct ConnectionStateMachine {
    policy: BackoffPolicy,
    auto_reconnect: bool,
    status: ConnectionStatus,
    attempt: Option<ReconnectAttempt>,
    timer_armed: bool,
    /// Epoch of the handshake currently running, if any. Stale or not.
    in_flight: Option<u64>,
    /// A handshake became due while a stale one was still running.
    deferred: bool,
    epoch: u64,
    last_error: Option<String>,
}

impl ConnectionStateMachine {
    pub fn new(policy: BackoffPolicy, auto_reconnect: bool) -> Self {
        Self {
            policy,
            auto_reconnect,
            status: ConnectionStatus::Connected,
            attempt: None,
            timer_armed: false,
            in_flight: None,
            deferred: false,
            epoch: 0,
            last_error: None,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn attempt(&self) -> Option<&ReconnectAttempt> {
        self.attempt.as_ref()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// True while a reconnect timer is armed and has not fired.
    pub fn has_pending_timer(&self) -> bool {
        self.timer_armed
    }

    pub fn handshake_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Initial handshake for a session. Only valid while `Connected`.
    pub fn begin_handshake(&mut self) -> Vec<ConnectionEffect> {
        if self.status != ConnectionStatus::Connected {
            tracing::debug!(status = %self.status, "Handshake requested during reconnect cycle, ignoring");
            return Vec::new();
        }
        if self.in_flight.is_some() {
            self.deferred = true;
            return Vec::new();
        }
        self.epoch += 1;
        self.in_flight = Some(self.epoch);
        vec![ConnectionEffect::Handshake {
            epoch: self.epoch,
            attempt: None,
        }]
    }

    /// Link lost. Drops any armed attempt and restarts the cycle at attempt 0.
    pub fn signal_disconnect(&mut self, reason: impl Into<String>, now: Instant) -> Vec<ConnectionEffect> {
        self.last_error = Some(reason.into());
        if self.status == ConnectionStatus::Disconnected {
            return Vec::new();
        }

        let mut effects = Vec::new();
        self.epoch += 1;
        self.deferred = false;
        self.attempt = None;
        if std::mem::take(&mut self.timer_armed) {
            effects.push(ConnectionEffect::CancelTimer);
        }
        self.transition(ConnectionStatus::Disconnected, &mut effects);

        if self.auto_reconnect {
            self.schedule(0, now, &mut effects);
        }
        effects
    }

    /// The armed timer for `epoch` fired.
    pub fn on_timer(&mut self, epoch: u64) -> Vec<ConnectionEffect> {
        if epoch != self.epoch || !self.timer_armed || self.status != ConnectionStatus::Reconnecting {
            tracing::trace!(epoch, current = self.epoch, "Stale reconnect timer discarded");
            return Vec::new();
        }
        self.timer_armed = false;
        self.start_attempt()
    }

    /// Cancel the armed timer and attempt now. No-op unless an attempt is armed.
    pub fn skip_backoff(&mut self) -> Vec<ConnectionEffect> {
        if self.status != ConnectionStatus::Reconnecting || !self.timer_armed {
            return Vec::new();
        }
        self.epoch += 1;
        self.timer_armed = false;
        let mut effects = vec![ConnectionEffect::CancelTimer];
        effects.extend(self.start_attempt());
        effects
    }

    /// Handshake tagged `epoch` completed.
    pub fn on_handshake_result(
        &mut self,
        epoch: u64,
        result: Result<(), ResilienceError>,
        now: Instant,
    ) -> Vec<ConnectionEffect> {
        if self.in_flight == Some(epoch) {
            self.in_flight = None;
        }
        if epoch != self.epoch {
            tracing::debug!(epoch, current = self.epoch, "Stale handshake result discarded");
            return self.resume_deferred();
        }

        match result {
            Ok(()) => {
                let mut effects = Vec::new();
                self.attempt = None;
                self.timer_armed = false;
                self.last_error = None;
                self.transition(ConnectionStatus::Connected, &mut effects);
                effects.push(ConnectionEffect::Established);
                effects
            }
            Err(err) => match self.status {
                // First handshake of the session: same path as any other link loss.
                ConnectionStatus::Connected => self.signal_disconnect(err.to_string(), now),
                ConnectionStatus::Reconnecting => {
                    self.last_error = Some(err.to_string());
                    let next = self
                        .attempt
                        .map_or(0, |attempt| attempt.attempt_number.saturating_add(1));
                    let mut effects = Vec::new();
                    self.schedule(next, now, &mut effects);
                    effects
                }
                ConnectionStatus::Disconnected => {
                    self.last_error = Some(err.to_string());
                    Vec::new()
                }
            },
        }
    }

    /// Force `Connected` without a handshake, discarding all reconnect state.
    pub fn reset(&mut self) -> Vec<ConnectionEffect> {
        let mut effects = Vec::new();
        self.epoch += 1;
        if std::mem::take(&mut self.timer_armed) {
            effects.push(ConnectionEffect::CancelTimer);
        }
        self.attempt = None;
        self.deferred = false;
        self.last_error = None;
        self.transition(ConnectionStatus::Connected, &mut effects);
        effects
    }

    fn schedule(&mut self, attempt_number: u32, now: Instant, effects: &mut Vec<ConnectionEffect>) {
        let delay = self.policy.next_delay(attempt_number);
        self.epoch += 1;
        self.timer_armed = true;
        self.attempt = Some(ReconnectAttempt {
            attempt_number,
            delay,
            scheduled_at: now,
        });
        self.transition(ConnectionStatus::Reconnecting, effects);
        effects.push(ConnectionEffect::ScheduleReconnect {
            epoch: self.epoch,
            attempt: attempt_number,
            delay,
        });
    }

    fn start_attempt(&mut self) -> Vec<ConnectionEffect> {
        if self.in_flight.is_some() {
            self.deferred = true;
            return Vec::new();
        }
        self.in_flight = Some(self.epoch);
        vec![ConnectionEffect::Handshake {
            epoch: self.epoch,
            attempt: self.attempt.map(|attempt| attempt.attempt_number),
        }]
    }

    fn resume_deferred(&mut self) -> Vec<ConnectionEffect> {
        if self.in_flight.is_some() || !std::mem::take(&mut self.deferred) {
            return Vec::new();
        }
        match self.status {
            ConnectionStatus::Reconnecting if !self.timer_armed => self.start_attempt(),
            ConnectionStatus::Connected => self.begin_handshake(),
            _ => Vec::new(),
        }
    }

    fn transition(&mut self, to: ConnectionStatus, effects: &mut Vec<ConnectionEffect>) {
        if self.status != to {
            effects.push(ConnectionEffect::Transition { from: self.status, to });
            self.status = to;
        }
    }
}
