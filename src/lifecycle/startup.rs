//! Startup orchestration.
//!
//! Config is validated first, then the session is spawned and the first
//! handshake dispatched. Any startup error is fatal.

use std::sync::Arc;

use crate::config::ResilienceConfig;
use crate::error::ResilienceResult;
use crate::session::ResilienceSession;
use crate::transport::Transport;

/// Spawn a session and dispatch `initializeStore`.
pub fn start_session(config: ResilienceConfig, transport: Arc<dyn Transport>) -> ResilienceResult<ResilienceSession> {
    tracing::info!(
        base_delay_ms = config.backoff.base_delay_ms,
        max_delay_ms = config.backoff.max_delay_ms,
        channel_interval_ms = config.polling.channel_interval_ms,
        chatter_interval_ms = config.polling.chatter_interval_ms,
        "Starting resilience session"
    );

    let session = ResilienceSession::spawn(config, transport)?;
    session.initialize_store()?;
    Ok(session)
}
