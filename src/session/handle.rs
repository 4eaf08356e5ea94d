//! Resilience facade: the only surface the UI/store layer talks to.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::validation::validate_config;
use crate::config::{ConfigError, ResilienceConfig};
use crate::error::{ResilienceError, ResilienceResult};
use crate::resilience::BackoffPolicy;
use crate::session::action::Action;
use crate::session::actor::{Command, SessionActor};
use crate::session::events::SessionEvent;
use crate::session::snapshot::ResilienceState;
use crate::transport::Transport;

const EVENT_CAPACITY: usize = 256;

/// Handle to a running session.
///
/// Commands are queued to the session's event loop and applied in order.
/// Dropping the handle tears the session down.
pub struct ResilienceSession {
    session_id: Uuid,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ResilienceState>,
    events: broadcast::Sender<SessionEvent>,
    task: JoinHandle<()>,
}

impl ResilienceSession {
    /// Validate `config` and start a session on the current tokio runtime.
    pub fn spawn(config: ResilienceConfig, transport: Arc<dyn Transport>) -> ResilienceResult<Self> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let policy = BackoffPolicy::from_config(&config.backoff)?;

        let session_id = Uuid::new_v4();
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ResilienceState::initial(session_id));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let actor = SessionActor::new(
            session_id,
            config,
            policy,
            transport,
            command_rx,
            state_tx,
            events.clone(),
        );
        let task = tokio::spawn(actor.run());

        Ok(Self {
            session_id,
            commands,
            state,
            events,
            task,
        })
    }

    pub fn id(&self) -> Uuid {
        self.session_id
    }

    /// Queue an action. Malformed payloads fail here and are never queued.
    pub fn dispatch(&self, action: Action) -> ResilienceResult<()> {
        action.validate()?;
        self.commands
            .send(Command::Dispatch(action))
            .map_err(|_| ResilienceError::SessionClosed)
    }

    pub fn initialize_store(&self) -> ResilienceResult<()> {
        self.dispatch(Action::InitializeStore)
    }

    pub fn set_channel_polling(&self, interval: Option<Duration>) -> ResilienceResult<()> {
        self.dispatch(Action::SetChannelPolling(interval))
    }

    pub fn set_refresh_chatter_interval(&self, interval: Option<Duration>) -> ResilienceResult<()> {
        self.dispatch(Action::SetRefreshChatterInterval(interval))
    }

    pub fn skip_backoff(&self) -> ResilienceResult<()> {
        self.dispatch(Action::SkipBackoff)
    }

    pub fn reset_connection_state(&self) -> ResilienceResult<()> {
        self.dispatch(Action::ResetConnectionState)
    }

    pub fn signal_holo_disconnect(&self) -> ResilienceResult<()> {
        self.dispatch(Action::SignalHoloDisconnect)
    }

    /// Alias of [`signal_holo_disconnect`](Self::signal_holo_disconnect).
    pub fn signal_disconnect(&self) -> ResilienceResult<()> {
        self.signal_holo_disconnect()
    }

    /// Show `remaining` as the reconnect countdown, or the armed attempt's
    /// remaining time when `None`.
    pub fn set_reconnecting(&self, remaining: Option<Duration>) -> ResilienceResult<()> {
        self.dispatch(Action::SetReconnecting(remaining))
    }

    /// Latest published state. Never blocks.
    pub fn snapshot(&self) -> ResilienceState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn watch(&self) -> watch::Receiver<ResilienceState> {
        self.state.clone()
    }

    /// Ordered stream of what the session does from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Wait until the published state satisfies `predicate`.
    pub async fn wait_for<F>(&self, mut predicate: F) -> ResilienceResult<ResilienceState>
    where
        F: FnMut(&ResilienceState) -> bool,
    {
        let mut state = self.state.clone();
        let matched = state
            .wait_for(|s| predicate(s))
            .await
            .map_err(|_| ResilienceError::SessionClosed)?;
        Ok(matched.clone())
    }

    /// Cancel all timers and in-flight calls and wait for the loop to exit.
    pub async fn teardown(self) -> ResilienceResult<()> {
        let (reply, done) = oneshot::channel();
        self.commands
            .send(Command::Teardown(reply))
            .map_err(|_| ResilienceError::SessionClosed)?;
        done.await.map_err(|_| ResilienceError::SessionClosed)?;

        let ResilienceSession { task, .. } = self;
        task.await.map_err(|_| ResilienceError::SessionClosed)
    }
}
