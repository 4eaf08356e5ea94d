//! Deadlines for boundary calls.

use std::future::Future;
use std::time::Duration;
use tokio::time;

use crate::error::{ResilienceError, ResilienceResult};

/// Run `call` with a deadline, mapping expiry to [`ResilienceError::Timeout`].
pub async fn with_deadline<T, F>(operation: &'static str, limit: Duration, call: F) -> ResilienceResult<T>
where
    F: Future<Output = ResilienceResult<T>>,
{
    match time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(operation, timeout_ms = limit.as_millis() as u64, "Boundary call timed out");
            Err(ResilienceError::Timeout { operation, after: limit })
        }
    }
}
