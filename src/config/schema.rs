//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for a resilience
//! session. All types derive Serde traits for deserialization from TOML.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for a resilience session.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Reconnect delay schedule.
    pub backoff: BackoffConfig,

    /// Reconnect cycle behaviour.
    pub reconnect: ReconnectConfig,

    /// Channel and chatter polling.
    pub polling: PollingConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,

    /// Simulated backend for the demo binary.
    pub simulation: SimulationConfig,
}

/// Exponential backoff configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Delay before attempt 0, in milliseconds.
    pub base_delay_ms: u64,

    /// Growth factor per failed attempt (>= 1.0).
    pub multiplier: f64,

    /// Ceiling for any delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            multiplier: 2.0,
            max_delay_ms: 30_000,
        }
    }
}

/// Reconnect cycle configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Arm reconnect attempts automatically after a disconnect.
    pub enabled: bool,

    /// Deadline for a single handshake, in milliseconds.
    pub handshake_timeout_ms: u64,

    /// Period of the `setReconnecting` countdown, in milliseconds. 0 disables it.
    pub countdown_tick_ms: u64,
}

impl ReconnectConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn countdown_tick(&self) -> Option<Duration> {
        (self.countdown_tick_ms > 0).then(|| Duration::from_millis(self.countdown_tick_ms))
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            handshake_timeout_ms: 5_000,
            countdown_tick_ms: 1_000,
        }
    }
}

/// Polling configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Default channel-list refresh interval, in milliseconds.
    pub channel_interval_ms: u64,

    /// Default presence refresh interval, in milliseconds.
    pub chatter_interval_ms: u64,

    /// Deadline for a single fetch, in milliseconds.
    pub fetch_timeout_ms: u64,

    /// Treat a connectivity-loss fetch failure as a disconnect.
    pub disconnect_on_connectivity_loss: bool,
}

impl PollingConfig {
    pub fn channel_interval(&self) -> Duration {
        Duration::from_millis(self.channel_interval_ms)
    }

    pub fn chatter_interval(&self) -> Duration {
        Duration::from_millis(self.chatter_interval_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            channel_interval_ms: 5_000,
            chatter_interval_ms: 60_000,
            fetch_timeout_ms: 10_000,
            disconnect_on_connectivity_loss: true,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Simulated backend behaviour.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Probability that a handshake fails.
    pub connect_failure_rate: f64,

    /// Probability that a fetch fails.
    pub fetch_failure_rate: f64,

    /// Share of failures reported as connectivity loss rather than transient.
    pub connectivity_loss_ratio: f64,

    /// Round-trip latency, in milliseconds.
    pub latency_ms: u64,

    pub channel_count: usize,

    pub chatter_count: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            connect_failure_rate: 0.3,
            fetch_failure_rate: 0.05,
            connectivity_loss_ratio: 0.5,
            latency_ms: 50,
            channel_count: 4,
            chatter_count: 6,
        }
    }
}
