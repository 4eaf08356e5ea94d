//! Shared utilities for session integration tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::broadcast;

use chat_resilience::config::ResilienceConfig;
use chat_resilience::transport::{ChannelSummary, ChatterPresence};
use chat_resilience::{ResilienceError, ResilienceResult, ResilienceSession, ResilienceState, SessionEvent, Transport};

/// Config with a 1s/2x/30s backoff, 500ms channel and 2s chatter polling, no countdown.
pub fn test_config() -> ResilienceConfig {
    let mut config = ResilienceConfig::default();
    config.backoff.base_delay_ms = 1_000;
    config.backoff.multiplier = 2.0;
    config.backoff.max_delay_ms = 30_000;
    config.reconnect.countdown_tick_ms = 0;
    config.reconnect.handshake_timeout_ms = 5_000;
    config.polling.channel_interval_ms = 500;
    config.polling.chatter_interval_ms = 2_000;
    config.polling.fetch_timeout_ms = 5_000;
    config
}

/// Per-task in-flight accounting.
#[derive(Default)]
pub struct InFlight {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl InFlight {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn max(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

/// Transport whose availability, latency and failures are set by the test.
#[derive(Default)]
pub struct ScriptedTransport {
    offline: AtomicBool,
    handshake_script: Mutex<VecDeque<ResilienceResult<()>>>,
    fetch_latency: Mutex<Duration>,
    channel_failure: Mutex<Option<ResilienceError>>,
    pub handshakes: AtomicUsize,
    pub channel_fetches: AtomicUsize,
    pub chatter_fetches: AtomicUsize,
    pub channel_in_flight: InFlight,
    pub chatter_in_flight: InFlight,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_online(&self, online: bool) {
        self.offline.store(!online, Ordering::SeqCst);
    }

    /// Results returned by the next handshakes, before availability applies.
    pub fn script_handshakes(&self, results: impl IntoIterator<Item = ResilienceResult<()>>) {
        self.handshake_script.lock().unwrap().extend(results);
    }

    pub fn set_fetch_latency(&self, latency: Duration) {
        *self.fetch_latency.lock().unwrap() = latency;
    }

    pub fn fail_channel_fetches(&self, error: Option<ResilienceError>) {
        *self.channel_failure.lock().unwrap() = error;
    }

    pub fn handshakes(&self) -> usize {
        self.handshakes.load(Ordering::SeqCst)
    }

    pub fn channel_fetches(&self) -> usize {
        self.channel_fetches.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.handshakes() + self.channel_fetches() + self.chatter_fetches.load(Ordering::SeqCst)
    }

    fn offline_error(&self) -> Option<ResilienceError> {
        self.offline
            .load(Ordering::SeqCst)
            .then(|| ResilienceError::ConnectivityLoss("conductor unreachable".into()))
    }

    fn latency(&self) -> Duration {
        *self.fetch_latency.lock().unwrap()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn attempt_connection(&self) -> ResilienceResult<()> {
        self.handshakes.fetch_add(1, Ordering::SeqCst);
        if let Some(scripted) = self.handshake_script.lock().unwrap().pop_front() {
            return scripted;
        }
        match self.offline_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn fetch_channel_list(&self) -> ResilienceResult<Vec<ChannelSummary>> {
        self.channel_fetches.fetch_add(1, Ordering::SeqCst);
        self.channel_in_flight.enter();
        tokio::time::sleep(self.latency()).await;
        self.channel_in_flight.exit();

        if let Some(err) = self.offline_error() {
            return Err(err);
        }
        if let Some(err) = self.channel_failure.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(vec![ChannelSummary::new("General"), ChannelSummary::new("Random")])
    }

    async fn fetch_chatter_presence(&self) -> ResilienceResult<Vec<ChatterPresence>> {
        self.chatter_fetches.fetch_add(1, Ordering::SeqCst);
        self.chatter_in_flight.enter();
        tokio::time::sleep(self.latency()).await;
        self.chatter_in_flight.exit();

        if let Some(err) = self.offline_error() {
            return Err(err);
        }
        Ok(vec![ChatterPresence {
            agent: "test-agent-0".into(),
            active: true,
        }])
    }
}

/// Bound a wait so a broken scenario fails instead of hanging.
pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(300), future)
        .await
        .expect("scenario timed out")
}

pub async fn wait_until<F>(session: &ResilienceSession, predicate: F) -> ResilienceState
where
    F: FnMut(&ResilienceState) -> bool,
{
    within(session.wait_for(predicate)).await.unwrap()
}

/// Everything published so far.
pub fn drain(events: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

/// Spawn a session and wait until the first handshake has started both polls.
pub async fn connected_session(config: ResilienceConfig, transport: std::sync::Arc<ScriptedTransport>) -> ResilienceSession {
    let session = ResilienceSession::spawn(config, transport).unwrap();
    session.initialize_store().unwrap();
    wait_until(&session, |s| s.channel_poll.is_some() && s.chatter_poll.is_some()).await;
    session
}
