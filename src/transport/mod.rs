//! Backend transport boundary.
//!
//! The wire protocol to the conductor is out of scope; this module only fixes
//! the three calls the resilience core makes and how their failures are
//! classified. Implementations are injected into the session at construction.

pub mod simulated;
pub mod types;

use async_trait::async_trait;

use crate::error::ResilienceResult;

pub use simulated::SimulatedTransport;
pub use types::{ChannelSummary, ChatterPresence};

/// Remote calls consumed by the resilience core.
///
/// Failures must be classified: [`ResilienceError::ConnectivityLoss`] when the
/// link itself is gone, [`ResilienceError::TransientFetch`] otherwise. An empty
/// list is a successful result.
///
/// [`ResilienceError::ConnectivityLoss`]: crate::error::ResilienceError::ConnectivityLoss
/// [`ResilienceError::TransientFetch`]: crate::error::ResilienceError::TransientFetch
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Establish (or re-establish) the link.
    async fn attempt_connection(&self) -> ResilienceResult<()>;

    async fn fetch_channel_list(&self) -> ResilienceResult<Vec<ChannelSummary>>;

    async fn fetch_chatter_presence(&self) -> ResilienceResult<Vec<ChatterPresence>>;
}
