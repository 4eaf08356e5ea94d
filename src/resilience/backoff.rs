//! Exponential backoff for reconnect attempts.
//!
//! `next_delay(n) = min(base * multiplier^n, max)`, without jitter: the delay is
//! non-decreasing in `n` and equals the timer the countdown reports.

use std::time::Duration;

use crate::config::BackoffConfig;
use crate::error::{ResilienceError, ResilienceResult};

/// Retry delay schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    base_delay: Duration,
    multiplier: f64,
    max_delay: Duration,
}

impl BackoffPolicy {
    /// Create a policy, rejecting schedules that could shrink or exceed the ceiling.
    pub fn new(base_delay: Duration, multiplier: f64, max_delay: Duration) -> ResilienceResult<Self> {
        if !multiplier.is_finite() || multiplier < 1.0 {
            return Err(ResilienceError::FatalConfiguration(format!(
                "backoff multiplier must be a finite number >= 1.0, got {}",
                multiplier
            )));
        }
        if base_delay > max_delay {
            return Err(ResilienceError::FatalConfiguration(format!(
                "backoff base delay {:?} exceeds max delay {:?}",
                base_delay, max_delay
            )));
        }
        Ok(Self {
            base_delay,
            multiplier,
            max_delay,
        })
    }

    /// Build a policy from its config section.
    pub fn from_config(config: &BackoffConfig) -> ResilienceResult<Self> {
        Self::new(
            Duration::from_millis(config.base_delay_ms),
            config.multiplier,
            Duration::from_millis(config.max_delay_ms),
        )
    }

    /// Delay before reconnect attempt `attempt`. Total over all attempt numbers.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let raw_nanos = self.base_delay.as_nanos() as f64 * self.multiplier.powi(exponent);

        if !raw_nanos.is_finite() || raw_nanos >= self.max_delay.as_nanos() as f64 {
            return self.max_delay;
        }
        let delay = if raw_nanos < u64::MAX as f64 {
            Duration::from_nanos(raw_nanos as u64)
        } else {
            Duration::try_from_secs_f64(raw_nanos / 1e9).unwrap_or(self.max_delay)
        };
        delay.min(self.max_delay)
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}
