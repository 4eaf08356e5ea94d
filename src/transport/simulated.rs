//! In-process backend with configurable latency and failure rates.

use async_trait::async_trait;
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use crate::config::SimulationConfig;
use crate::error::{ResilienceError, ResilienceResult};
use crate::transport::types::{ChannelSummary, ChatterPresence};
use crate::transport::Transport;

/// Simulated conductor used by the demo binary.
#[derive(Debug)]
pub struct SimulatedTransport {
    config: SimulationConfig,
    channels: Vec<ChannelSummary>,
    online: AtomicBool,
    calls: AtomicU64,
}

impl SimulatedTransport {
    pub fn new(config: SimulationConfig) -> Self {
        let channels = (0..config.channel_count)
            .map(|i| ChannelSummary::new(format!("Channel #{}", i)))
            .collect();
        Self {
            config,
            channels,
            online: AtomicBool::new(true),
            calls: AtomicU64::new(0),
        }
    }

    /// Take the backend down or bring it back.
    pub fn set_online(&self, online: bool) {
        let was = self.online.swap(online, Ordering::SeqCst);
        if was != online {
            tracing::info!(online, "Simulated backend availability changed");
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Total boundary calls served.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    async fn roundtrip(&self, failure_rate: f64, operation: &'static str) -> ResilienceResult<()> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let (fails, loses_link) = {
            let mut rng = rand::thread_rng();
            (
                rng.gen_bool(failure_rate),
                rng.gen_bool(self.config.connectivity_loss_ratio),
            )
        };

        tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;

        if !self.is_online() {
            return Err(ResilienceError::ConnectivityLoss(format!(
                "{}: conductor unreachable",
                operation
            )));
        }
        if fails {
            if loses_link {
                return Err(ResilienceError::ConnectivityLoss(format!("{}: websocket closed", operation)));
            }
            return Err(ResilienceError::TransientFetch(format!("{}: zome call failed", operation)));
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn attempt_connection(&self) -> ResilienceResult<()> {
        self.roundtrip(self.config.connect_failure_rate, "attempt_connection")
            .await
            .map_err(|err| match err {
                ResilienceError::TransientFetch(msg) => ResilienceError::ConnectivityLoss(msg),
                other => other,
            })
    }

    async fn fetch_channel_list(&self) -> ResilienceResult<Vec<ChannelSummary>> {
        self.roundtrip(self.config.fetch_failure_rate, "fetch_channel_list").await?;
        Ok(self.channels.clone())
    }

    async fn fetch_chatter_presence(&self) -> ResilienceResult<Vec<ChatterPresence>> {
        self.roundtrip(self.config.fetch_failure_rate, "fetch_chatter_presence").await?;
        let chatters = (0..self.config.chatter_count)
            .map(|i| ChatterPresence {
                agent: format!("test-agent-{}", i),
                active: i % 2 == 0,
            })
            .collect();
        Ok(chatters)
    }
}
