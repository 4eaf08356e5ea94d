//! End-to-end behaviour of a resilience session against a scripted backend.

use std::sync::Arc;
use std::time::Duration;

use chat_resilience::{Action, ConnectionStatus, ResilienceError, ResilienceSession, SessionEvent};

mod common;
use common::{connected_session, drain, test_config, wait_until, within, ScriptedTransport};

fn dispatched(events: &[SessionEvent]) -> Vec<Action> {
    events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::Dispatched(action) => Some(action.clone()),
            _ => None,
        })
        .collect()
}

fn without_polling_noise(events: Vec<SessionEvent>) -> Vec<SessionEvent> {
    events
        .into_iter()
        .filter(|event| !matches!(event, SessionEvent::FetchSkipped { .. } | SessionEvent::FetchFailed { .. }))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_initialize_store_starts_channel_then_chatter_polling() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = ResilienceSession::spawn(test_config(), transport.clone()).unwrap();
    let mut events = session.subscribe();

    session.initialize_store().unwrap();
    let state = wait_until(&session, |s| s.chatter_poll.is_some()).await;

    assert_eq!(
        dispatched(&drain(&mut events)),
        vec![
            Action::InitializeStore,
            Action::SetChannelPolling(None),
            Action::SetRefreshChatterInterval(None),
        ]
    );
    assert_eq!(state.status, ConnectionStatus::Connected);
    assert!(state.polling_active);
    assert_eq!(state.channel_poll.unwrap().interval, Duration::from_millis(500));
    assert_eq!(state.chatter_poll.unwrap().interval, Duration::from_secs(2));
    assert_eq!(transport.handshakes(), 1);

    tokio::time::sleep(Duration::from_millis(1_100)).await;
    assert!(transport.channel_fetches() >= 2);
}

#[tokio::test(start_paused = true)]
async fn test_skip_backoff_while_connected_is_noop() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = connected_session(test_config(), transport.clone()).await;
    let mut events = session.subscribe();

    session.skip_backoff().unwrap();
    within(async {
        loop {
            if let Ok(SessionEvent::Dispatched(Action::SkipBackoff)) = events.recv().await {
                break;
            }
        }
    })
    .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let after = drain(&mut events);
    assert!(!after
        .iter()
        .any(|e| matches!(e, SessionEvent::HandshakeStarted { .. } | SessionEvent::StatusChanged { .. })));
    assert_eq!(transport.handshakes(), 1);
    assert_eq!(session.snapshot().status, ConnectionStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_enters_reconnecting_and_pauses_polling() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = connected_session(test_config(), transport.clone()).await;
    let mut events = session.subscribe();

    session.signal_holo_disconnect().unwrap();
    let state = wait_until(&session, |s| s.status == ConnectionStatus::Reconnecting).await;

    assert_eq!(state.reconnect_attempt, Some(0));
    assert_eq!(state.reconnecting_in, Duration::from_secs(1));
    assert!(!state.polling_active);
    assert_eq!(state.last_error.as_deref(), Some("disconnect signalled by client"));

    assert_eq!(
        without_polling_noise(drain(&mut events)),
        vec![
            SessionEvent::Dispatched(Action::SignalHoloDisconnect),
            SessionEvent::StatusChanged {
                from: ConnectionStatus::Connected,
                to: ConnectionStatus::Disconnected
            },
            SessionEvent::PollingPaused,
            SessionEvent::StatusChanged {
                from: ConnectionStatus::Disconnected,
                to: ConnectionStatus::Reconnecting
            },
            SessionEvent::ReconnectScheduled {
                attempt: 0,
                delay: Duration::from_secs(1)
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_skip_backoff_failure_schedules_longer_delay() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = connected_session(test_config(), transport.clone()).await;

    transport.set_online(false);
    session.signal_holo_disconnect().unwrap();
    let first = wait_until(&session, |s| s.reconnect_attempt == Some(0)).await;
    let mut events = session.subscribe();

    session.skip_backoff().unwrap();
    let second = wait_until(&session, |s| s.reconnect_attempt == Some(1)).await;

    assert_eq!(second.status, ConnectionStatus::Reconnecting);
    assert_eq!(second.reconnecting_in, Duration::from_secs(2));
    assert!(second.reconnecting_in > first.reconnecting_in);
    assert_eq!(transport.handshakes(), 2);

    let events = without_polling_noise(drain(&mut events));
    assert_eq!(
        events,
        vec![
            SessionEvent::Dispatched(Action::SkipBackoff),
            SessionEvent::HandshakeStarted { attempt: Some(0) },
            SessionEvent::ReconnectScheduled {
                attempt: 1,
                delay: Duration::from_secs(2)
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_success_resumes_polling() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = connected_session(test_config(), transport.clone()).await;

    transport.set_online(false);
    session.signal_holo_disconnect().unwrap();
    wait_until(&session, |s| s.status == ConnectionStatus::Reconnecting).await;

    // No ticks while paused.
    let fetches = transport.channel_fetches();
    tokio::time::sleep(Duration::from_millis(900)).await;
    assert_eq!(transport.channel_fetches(), fetches);

    transport.set_online(true);
    let state = wait_until(&session, |s| s.status == ConnectionStatus::Connected).await;

    assert_eq!(state.reconnecting_in, Duration::ZERO);
    assert_eq!(state.reconnect_attempt, None);
    assert!(state.polling_active);
    assert_eq!(state.last_error, None);

    tokio::time::sleep(Duration::from_millis(2_100)).await;
    assert!(transport.channel_fetches() > fetches);
    assert!(transport.chatter_fetches.load(std::sync::atomic::Ordering::SeqCst) >= 2);
}

#[tokio::test(start_paused = true)]
async fn test_resume_keeps_configured_interval() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = connected_session(test_config(), transport.clone()).await;

    session.set_channel_polling(Some(Duration::from_millis(300))).unwrap();
    wait_until(&session, |s| {
        s.channel_poll.as_ref().map(|t| t.interval) == Some(Duration::from_millis(300))
    })
    .await;

    session.signal_holo_disconnect().unwrap();
    wait_until(&session, |s| s.status == ConnectionStatus::Reconnecting).await;
    let state = wait_until(&session, |s| s.status == ConnectionStatus::Connected).await;

    assert_eq!(state.channel_poll.unwrap().interval, Duration::from_millis(300));
    assert_eq!(state.chatter_poll.unwrap().interval, Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_slow_backend_never_overlaps_fetches() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.set_fetch_latency(Duration::from_millis(1_700));
    let session = connected_session(test_config(), transport.clone()).await;

    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(transport.channel_in_flight.max(), 1);
    assert_eq!(transport.chatter_in_flight.max(), 1);
    let channel = session.snapshot().channel_poll.unwrap();
    assert!(channel.ticks_skipped > 0);
    assert!(channel.fetches_completed >= 4);
}

#[tokio::test(start_paused = true)]
async fn test_fetch_connectivity_loss_signals_disconnect() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = connected_session(test_config(), transport.clone()).await;

    transport.fail_channel_fetches(Some(ResilienceError::ConnectivityLoss("websocket closed".into())));
    let state = wait_until(&session, |s| s.status == ConnectionStatus::Reconnecting).await;

    assert_eq!(state.last_error.as_deref(), Some("connectivity lost: websocket closed"));
    assert_eq!(state.reconnect_attempt, Some(0));
    assert!(!state.polling_active);
}

#[tokio::test(start_paused = true)]
async fn test_transient_fetch_failure_is_contained() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = connected_session(test_config(), transport.clone()).await;

    transport.fail_channel_fetches(Some(ResilienceError::TransientFetch("zome busy".into())));
    let state = wait_until(&session, |s| {
        s.channel_poll.as_ref().map_or(false, |t| t.fetches_failed >= 3)
    })
    .await;

    assert_eq!(state.status, ConnectionStatus::Connected);
    assert!(state.polling_active);
    assert_eq!(
        state.channel_poll.unwrap().last_error.as_deref(),
        Some("fetch failed: zome busy")
    );

    transport.fail_channel_fetches(None);
    let state = wait_until(&session, |s| {
        s.channel_poll.as_ref().map_or(false, |t| t.last_error.is_none())
    })
    .await;
    assert_eq!(state.status, ConnectionStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_connectivity_loss_only_recorded_when_disabled() {
    let mut config = test_config();
    config.polling.disconnect_on_connectivity_loss = false;
    let transport = Arc::new(ScriptedTransport::new());
    let session = connected_session(config, transport.clone()).await;

    transport.fail_channel_fetches(Some(ResilienceError::ConnectivityLoss("websocket closed".into())));
    let state = wait_until(&session, |s| {
        s.channel_poll.as_ref().map_or(false, |t| t.fetches_failed >= 2)
    })
    .await;
    assert_eq!(state.status, ConnectionStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_failed_first_handshake_starts_polling_after_reconnect() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.script_handshakes([Err(ResilienceError::Timeout {
        operation: "attempt_connection",
        after: Duration::from_secs(5),
    })]);
    let session = ResilienceSession::spawn(test_config(), transport.clone()).unwrap();
    let mut events = session.subscribe();

    session.initialize_store().unwrap();
    let state = wait_until(&session, |s| s.status == ConnectionStatus::Reconnecting).await;
    assert_eq!(state.reconnect_attempt, Some(0));
    assert!(state.channel_poll.is_none());
    assert_eq!(
        state.last_error.as_deref(),
        Some("attempt_connection timed out after 5s")
    );

    let state = wait_until(&session, |s| s.chatter_poll.is_some()).await;
    assert_eq!(state.status, ConnectionStatus::Connected);
    assert!(state.polling_active);

    assert_eq!(
        dispatched(&drain(&mut events)),
        vec![
            Action::InitializeStore,
            Action::SetChannelPolling(None),
            Action::SetRefreshChatterInterval(None),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_reset_forces_connected_and_cancels_timer() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = connected_session(test_config(), transport.clone()).await;

    transport.set_online(false);
    session.signal_holo_disconnect().unwrap();
    wait_until(&session, |s| s.status == ConnectionStatus::Reconnecting).await;
    let handshakes = transport.handshakes();

    transport.set_online(true);
    session.reset_connection_state().unwrap();
    let state = wait_until(&session, |s| s.status == ConnectionStatus::Connected).await;
    assert_eq!(state.reconnect_attempt, None);
    assert_eq!(state.reconnecting_in, Duration::ZERO);
    assert!(state.polling_active);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(transport.handshakes(), handshakes);
    assert_eq!(session.snapshot().status, ConnectionStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_reset_after_failed_first_handshake_starts_polling() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.script_handshakes([Err(ResilienceError::ConnectivityLoss("conductor unreachable".into()))]);
    let session = ResilienceSession::spawn(test_config(), transport.clone()).unwrap();

    session.initialize_store().unwrap();
    wait_until(&session, |s| s.status == ConnectionStatus::Reconnecting).await;
    let mut events = session.subscribe();

    session.reset_connection_state().unwrap();
    let state = wait_until(&session, |s| s.chatter_poll.is_some()).await;
    assert_eq!(state.status, ConnectionStatus::Connected);
    assert!(state.polling_active);
    assert_eq!(state.channel_poll.unwrap().interval, Duration::from_millis(500));

    assert_eq!(
        dispatched(&drain(&mut events)),
        vec![
            Action::ResetConnectionState,
            Action::SetChannelPolling(None),
            Action::SetRefreshChatterInterval(None),
        ]
    );

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(transport.channel_fetches() >= 5);
    assert_eq!(transport.handshakes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_set_reconnecting_boolean_payloads() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = connected_session(test_config(), transport.clone()).await;

    transport.set_online(false);
    session.signal_holo_disconnect().unwrap();
    wait_until(&session, |s| s.reconnecting_in == Duration::from_secs(1)).await;

    session.dispatch("holochain/setReconnecting false".parse().unwrap()).unwrap();
    wait_until(&session, |s| s.reconnecting_in == Duration::ZERO).await;

    tokio::time::sleep(Duration::from_millis(400)).await;
    session.dispatch("holochain/setReconnecting true".parse().unwrap()).unwrap();
    let state = wait_until(&session, |s| s.reconnecting_in > Duration::ZERO).await;
    assert_eq!(state.reconnecting_in, Duration::from_millis(600));
    assert_eq!(state.status, ConnectionStatus::Reconnecting);
}

#[tokio::test(start_paused = true)]
async fn test_countdown_dispatches_set_reconnecting() {
    let mut config = test_config();
    config.backoff.base_delay_ms = 3_000;
    config.reconnect.countdown_tick_ms = 1_000;
    let transport = Arc::new(ScriptedTransport::new());
    let session = connected_session(config, transport.clone()).await;
    let mut events = session.subscribe();

    transport.set_online(false);
    session.signal_holo_disconnect().unwrap();
    wait_until(&session, |s| s.reconnect_attempt == Some(1)).await;

    let countdown: Vec<Duration> = drain(&mut events)
        .into_iter()
        .filter_map(|event| match event {
            SessionEvent::Dispatched(Action::SetReconnecting(Some(remaining))) => Some(remaining),
            _ => None,
        })
        .collect();

    assert!(countdown.len() >= 2, "countdown: {:?}", countdown);
    assert_eq!(countdown[0], Duration::from_secs(2));
    assert_eq!(countdown[1], Duration::from_secs(1));
    assert!(countdown.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test(start_paused = true)]
async fn test_set_reconnecting_overrides_display() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = connected_session(test_config(), transport).await;

    session.set_reconnecting(Some(Duration::from_secs(7))).unwrap();
    let state = wait_until(&session, |s| s.reconnecting_in == Duration::from_secs(7)).await;
    assert_eq!(state.status, ConnectionStatus::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_commands_fail_fast() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = connected_session(test_config(), transport).await;

    let err = session.set_channel_polling(Some(Duration::ZERO)).unwrap_err();
    assert!(matches!(err, ResilienceError::FatalConfiguration(_)));
    let err = session.set_refresh_chatter_interval(Some(Duration::ZERO)).unwrap_err();
    assert!(matches!(err, ResilienceError::FatalConfiguration(_)));

    assert_eq!(
        session.snapshot().channel_poll.unwrap().interval,
        Duration::from_millis(500)
    );
}

#[tokio::test(start_paused = true)]
async fn test_invalid_config_rejected_at_spawn() {
    let mut config = test_config();
    config.backoff.multiplier = 0.5;

    let err = ResilienceSession::spawn(config, Arc::new(ScriptedTransport::new())).err().unwrap();
    assert!(matches!(err, ResilienceError::FatalConfiguration(_)));
}

#[tokio::test(start_paused = true)]
async fn test_teardown_stops_everything() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.set_fetch_latency(Duration::from_millis(200));
    let session = connected_session(test_config(), transport.clone()).await;

    transport.set_online(false);
    session.signal_holo_disconnect().unwrap();
    wait_until(&session, |s| s.status == ConnectionStatus::Reconnecting).await;

    let state = session.watch();
    within(session.teardown()).await.unwrap();

    let calls = transport.total_calls();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.total_calls(), calls);

    assert!(state.has_changed().is_err());
    let last = state.borrow().clone();
    assert!(last.channel_poll.is_none());
    assert!(last.chatter_poll.is_none());
    assert_eq!(last.reconnect_attempt, None);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handle_tears_down() {
    let transport = Arc::new(ScriptedTransport::new());
    let session = connected_session(test_config(), transport.clone()).await;
    let state = session.watch();

    drop(session);
    tokio::time::sleep(Duration::from_millis(10)).await;
    let calls = transport.total_calls();
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(transport.total_calls(), calls);
    assert!(state.has_changed().is_err());
}
