//! Single-owner event loop of a session.
//!
//! # Responsibilities
//! - Apply caller actions and internal events one at a time
//! - Execute state machine and polling effects (timers, handshakes, fetches)
//! - Publish the snapshot and the ordered event stream
//!
//! Nothing else mutates session state. Timer, handshake and fetch tasks only
//! post events back into the loop, tagged so that late arrivals can be dropped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::ResilienceConfig;
use crate::connection::{ConnectionEffect, ConnectionStateMachine, ConnectionStatus};
use crate::error::ResilienceResult;
use crate::observability::metrics;
use crate::polling::{FetchOutcome, PollEffect, PollKind, PollingManager, TickDecision};
use crate::resilience::timeouts::with_deadline;
use crate::resilience::BackoffPolicy;
use crate::session::action::Action;
use crate::session::events::SessionEvent;
use crate::session::snapshot::{PollingTaskView, ResilienceState};
use crate::transport::Transport;

/// Messages from the session handle.
pub(crate) enum Command {
    Dispatch(Action),
    Teardown(oneshot::Sender<()>),
}

/// Messages from tasks spawned by the actor.
enum Event {
    ReconnectTimerFired {
        epoch: u64,
    },
    Countdown {
        epoch: u64,
        remaining: Duration,
    },
    HandshakeFinished {
        epoch: u64,
        result: ResilienceResult<()>,
    },
    PollTick {
        kind: PollKind,
        epoch: u64,
    },
    FetchFinished {
        kind: PollKind,
        cycle: u64,
        result: ResilienceResult<usize>,
    },
}

pub(crate) struct SessionActor {
    session_id: Uuid,
    config: ResilienceConfig,
    transport: Arc<dyn Transport>,
    machine: ConnectionStateMachine,
    polling: PollingManager,
    commands: mpsc::UnboundedReceiver<Command>,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
    state_tx: watch::Sender<ResilienceState>,
    notify_tx: broadcast::Sender<SessionEvent>,
    reconnect_timer: Option<JoinHandle<()>>,
    handshake: Option<JoinHandle<()>>,
    tickers: HashMap<PollKind, JoinHandle<()>>,
    fetches: HashMap<PollKind, JoinHandle<()>>,
    reconnecting_in: Duration,
    initialized: bool,
    polling_started: bool,
}

impl SessionActor {
    pub(crate) fn new(
        session_id: Uuid,
        config: ResilienceConfig,
        policy: BackoffPolicy,
        transport: Arc<dyn Transport>,
        commands: mpsc::UnboundedReceiver<Command>,
        state_tx: watch::Sender<ResilienceState>,
        notify_tx: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            session_id,
            machine: ConnectionStateMachine::new(policy, config.reconnect.enabled),
            polling: PollingManager::new(config.polling.disconnect_on_connectivity_loss),
            config,
            transport,
            commands,
            events_tx,
            events_rx,
            state_tx,
            notify_tx,
            reconnect_timer: None,
            handshake: None,
            tickers: HashMap::new(),
            fetches: HashMap::new(),
            reconnecting_in: Duration::ZERO,
            initialized: false,
            polling_started: false,
        }
    }

    pub(crate) async fn run(mut self) {
        let span = tracing::info_span!("session", session_id = %self.session_id);
        async move {
            tracing::info!("Session started");
            loop {
                tokio::select! {
                    biased;
                    command = self.commands.recv() => match command {
                        Some(Command::Dispatch(action)) => self.apply(action),
                        Some(Command::Teardown(reply)) => {
                            self.teardown();
                            let _ = reply.send(());
                            break;
                        }
                        None => {
                            self.teardown();
                            break;
                        }
                    },
                    Some(event) = self.events_rx.recv() => self.handle_event(event),
                }
                self.publish();
            }
            tracing::info!("Session torn down");
        }
        .instrument(span)
        .await
    }

    fn apply(&mut self, action: Action) {
        tracing::debug!(action = %action, "Dispatch");
        self.notify(SessionEvent::Dispatched(action.clone()));

        match action {
            Action::InitializeStore => {
                self.initialized = true;
                let effects = self.machine.begin_handshake();
                self.run_connection_effects(effects);
            }
            Action::SetChannelPolling(interval) => {
                let interval = interval.unwrap_or_else(|| self.config.polling.channel_interval());
                self.configure_polling(PollKind::Channels, interval);
            }
            Action::SetRefreshChatterInterval(interval) => {
                let interval = interval.unwrap_or_else(|| self.config.polling.chatter_interval());
                self.configure_polling(PollKind::Chatter, interval);
            }
            Action::SkipBackoff => {
                let effects = self.machine.skip_backoff();
                if effects.is_empty() {
                    tracing::debug!(status = %self.machine.status(), "No pending reconnect attempt to skip");
                }
                self.run_connection_effects(effects);
            }
            Action::ResetConnectionState => {
                let effects = self.machine.reset();
                self.reconnecting_in = Duration::ZERO;
                self.run_connection_effects(effects);
                self.start_polling_once();
            }
            Action::SignalHoloDisconnect => {
                let effects = self
                    .machine
                    .signal_disconnect("disconnect signalled by client", Instant::now());
                self.run_connection_effects(effects);
            }
            Action::SetReconnecting(remaining) => {
                self.reconnecting_in = remaining.unwrap_or_else(|| self.armed_remaining());
            }
        }
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::ReconnectTimerFired { epoch } => {
                let effects = self.machine.on_timer(epoch);
                self.run_connection_effects(effects);
            }
            Event::Countdown { epoch, remaining } => {
                if epoch == self.machine.epoch() && self.machine.has_pending_timer() {
                    self.apply(Action::SetReconnecting(Some(remaining)));
                }
            }
            Event::HandshakeFinished { epoch, result } => {
                self.handshake = None;
                if let Err(e) = &result {
                    tracing::warn!(epoch, error = %e, "Handshake failed");
                }
                metrics::record_handshake(result.is_ok());
                let effects = self.machine.on_handshake_result(epoch, result, Instant::now());
                self.run_connection_effects(effects);
            }
            Event::PollTick { kind, epoch } => match self.polling.on_tick(kind, epoch) {
                TickDecision::Fetch { cycle } => self.spawn_fetch(kind, cycle),
                TickDecision::Skipped => {
                    tracing::debug!(task = %kind, "Previous fetch still in flight, skipping tick");
                    metrics::record_skipped_tick(kind);
                    self.notify(SessionEvent::FetchSkipped { task: kind });
                }
                TickDecision::Ignored => {}
            },
            Event::FetchFinished { kind, cycle, result } => {
                self.fetches.remove(&kind);
                match self.polling.on_fetch_complete(kind, cycle, result) {
                    FetchOutcome::Completed { items } => {
                        tracing::trace!(task = %kind, items, "Fetch completed");
                        metrics::record_fetch(kind, "success");
                    }
                    FetchOutcome::Failed { error } => {
                        tracing::warn!(task = %kind, error = %error, "Fetch failed");
                        metrics::record_fetch(kind, "failure");
                        self.notify(SessionEvent::FetchFailed { task: kind, error });
                    }
                    FetchOutcome::ConnectivityLost { error } => {
                        tracing::warn!(task = %kind, error = %error, "Fetch lost connectivity");
                        metrics::record_fetch(kind, "connectivity_loss");
                        self.notify(SessionEvent::FetchFailed {
                            task: kind,
                            error: error.clone(),
                        });
                        let effects = self.machine.signal_disconnect(error, Instant::now());
                        self.run_connection_effects(effects);
                    }
                    FetchOutcome::Discarded => {
                        tracing::trace!(task = %kind, "Fetch result discarded");
                    }
                }
            }
        }
    }

    /// Start both tasks with the configured intervals the first time an
    /// initialized session is `Connected`.
    fn start_polling_once(&mut self) {
        if self.initialized && !self.polling_started && self.machine.status() == ConnectionStatus::Connected {
            self.apply(Action::SetChannelPolling(None));
            self.apply(Action::SetRefreshChatterInterval(None));
        }
    }

    /// Time left before the armed reconnect attempt, zero when none is armed.
    fn armed_remaining(&self) -> Duration {
        match self.machine.attempt() {
            Some(attempt) if self.machine.has_pending_timer() => {
                attempt.due_at().saturating_duration_since(Instant::now())
            }
            _ => Duration::ZERO,
        }
    }

    fn configure_polling(&mut self, kind: PollKind, interval: Duration) {
        match self.polling.set_interval(kind, interval) {
            Ok(effects) => {
                self.polling_started = true;
                tracing::info!(task = %kind, interval_ms = interval.as_millis() as u64, "Polling configured");
                self.run_poll_effects(effects);
            }
            Err(e) => tracing::error!(task = %kind, error = %e, "Rejected polling configuration"),
        }
    }

    fn run_connection_effects(&mut self, effects: Vec<ConnectionEffect>) {
        for effect in effects {
            match effect {
                ConnectionEffect::Transition { from, to } => self.on_transition(from, to),
                ConnectionEffect::CancelTimer => {
                    if let Some(timer) = self.reconnect_timer.take() {
                        timer.abort();
                    }
                }
                ConnectionEffect::ScheduleReconnect { epoch, attempt, delay } => {
                    tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "Reconnect scheduled");
                    metrics::record_reconnect_scheduled(delay);
                    self.reconnecting_in = delay;
                    self.notify(SessionEvent::ReconnectScheduled { attempt, delay });
                    self.spawn_reconnect_timer(epoch, delay);
                }
                ConnectionEffect::Handshake { epoch, attempt } => {
                    tracing::debug!(epoch, attempt = ?attempt, "Handshake started");
                    self.reconnecting_in = Duration::ZERO;
                    self.notify(SessionEvent::HandshakeStarted { attempt });
                    self.spawn_handshake(epoch);
                }
                ConnectionEffect::Established => self.start_polling_once(),
            }
        }
    }

    fn on_transition(&mut self, from: ConnectionStatus, to: ConnectionStatus) {
        tracing::info!(%from, %to, "Connection status changed");
        metrics::record_status(to);
        self.notify(SessionEvent::StatusChanged { from, to });

        if to == ConnectionStatus::Connected {
            self.reconnecting_in = Duration::ZERO;
            let effects = self.polling.resume();
            if !effects.is_empty() {
                self.notify(SessionEvent::PollingResumed);
            }
            self.run_poll_effects(effects);
        } else if from == ConnectionStatus::Connected {
            let effects = self.polling.pause();
            if !effects.is_empty() {
                self.notify(SessionEvent::PollingPaused);
            }
            self.run_poll_effects(effects);
        }
    }

    fn run_poll_effects(&mut self, effects: Vec<PollEffect>) {
        for effect in effects {
            match effect {
                PollEffect::StartTicker { kind, epoch, interval } => self.spawn_ticker(kind, epoch, interval),
                PollEffect::StopTicker { kind } => {
                    if let Some(ticker) = self.tickers.remove(&kind) {
                        ticker.abort();
                    }
                }
            }
        }
    }

    fn spawn_reconnect_timer(&mut self, epoch: u64, delay: Duration) {
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
        let events = self.events_tx.clone();
        let countdown_tick = self.config.reconnect.countdown_tick();
        let deadline = Instant::now() + delay;

        self.reconnect_timer = Some(tokio::spawn(async move {
            if let Some(tick) = countdown_tick {
                let mut countdown = time::interval_at(Instant::now() + tick, tick);
                loop {
                    tokio::select! {
                        _ = time::sleep_until(deadline) => break,
                        _ = countdown.tick() => {
                            let remaining = deadline.saturating_duration_since(Instant::now());
                            if events.send(Event::Countdown { epoch, remaining }).is_err() {
                                return;
                            }
                        }
                    }
                }
            } else {
                time::sleep_until(deadline).await;
            }
            let _ = events.send(Event::ReconnectTimerFired { epoch });
        }));
    }

    fn spawn_handshake(&mut self, epoch: u64) {
        let transport = self.transport.clone();
        let events = self.events_tx.clone();
        let limit = self.config.reconnect.handshake_timeout();

        self.handshake = Some(tokio::spawn(async move {
            let result = with_deadline("attempt_connection", limit, transport.attempt_connection()).await;
            let _ = events.send(Event::HandshakeFinished { epoch, result });
        }));
    }

    fn spawn_ticker(&mut self, kind: PollKind, epoch: u64, interval: Duration) {
        if let Some(previous) = self.tickers.remove(&kind) {
            previous.abort();
        }
        let events = self.events_tx.clone();

        let ticker = tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if events.send(Event::PollTick { kind, epoch }).is_err() {
                    break;
                }
            }
        });
        self.tickers.insert(kind, ticker);
    }

    fn spawn_fetch(&mut self, kind: PollKind, cycle: u64) {
        let transport = self.transport.clone();
        let events = self.events_tx.clone();
        let limit = self.config.polling.fetch_timeout();

        let fetch = tokio::spawn(async move {
            let result = match kind {
                PollKind::Channels => with_deadline("fetch_channel_list", limit, async {
                    transport.fetch_channel_list().await.map(|channels| channels.len())
                })
                .await,
                PollKind::Chatter => with_deadline("fetch_chatter_presence", limit, async {
                    transport.fetch_chatter_presence().await.map(|chatters| chatters.len())
                })
                .await,
            };
            let _ = events.send(Event::FetchFinished { kind, cycle, result });
        });
        self.fetches.insert(kind, fetch);
    }

    /// Cancel every timer and boundary call and drop all session state.
    fn teardown(&mut self) {
        let effects = self.polling.teardown();
        self.run_poll_effects(effects);
        let effects = self.machine.reset();
        self.run_connection_effects(effects);

        for (_, ticker) in self.tickers.drain() {
            ticker.abort();
        }
        for (_, fetch) in self.fetches.drain() {
            fetch.abort();
        }
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
        if let Some(handshake) = self.handshake.take() {
            handshake.abort();
        }
        self.reconnecting_in = Duration::ZERO;
        self.initialized = false;
        self.polling_started = false;
        self.publish();
    }

    fn notify(&self, event: SessionEvent) {
        let _ = self.notify_tx.send(event);
    }

    fn state(&self) -> ResilienceState {
        ResilienceState {
            session_id: self.session_id,
            status: self.machine.status(),
            reconnecting_in: self.reconnecting_in,
            polling_active: self.polling.is_active(),
            reconnect_attempt: self.machine.attempt().map(|attempt| attempt.attempt_number),
            last_error: self.machine.last_error().map(str::to_string),
            channel_poll: self.polling.task(PollKind::Channels).map(PollingTaskView::from),
            chatter_poll: self.polling.task(PollKind::Chatter).map(PollingTaskView::from),
        }
    }

    fn publish(&self) {
        let next = self.state();
        self.state_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
