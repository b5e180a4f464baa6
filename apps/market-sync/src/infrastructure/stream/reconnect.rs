//! Reconnection Policy
//!
//! Exponential backoff with jitter for the stream connection. The
//! attempt budget is bounded: once it is spent the connection manager
//! gives up and parks in the failed state until a manual reconnect.

use std::time::Duration;

use rand::Rng;

use crate::infrastructure::config::StreamSettings;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on the delay between retries.
    pub max_delay: Duration,
    /// Backoff growth factor per attempt.
    pub multiplier: f64,
    /// Jitter fraction applied to each delay (0.1 = ±10%).
    pub jitter_factor: f64,
    /// Retry budget before giving up. Zero retries immediately fails.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_factor: 0.1,
            max_attempts: 5,
        }
    }
}

impl ReconnectConfig {
    /// Derive reconnection config from stream settings.
    #[must_use]
    pub const fn from_stream_settings(settings: &StreamSettings) -> Self {
        Self {
            initial_delay: settings.reconnect_delay_initial,
            max_delay: settings.reconnect_delay_max,
            multiplier: settings.reconnect_delay_multiplier,
            jitter_factor: 0.1,
            max_attempts: settings.max_reconnect_attempts,
        }
    }
}

/// Bounded exponential backoff with jitter.
///
/// Each call to [`next_delay`](Self::next_delay) spends one attempt
/// from the budget; [`reset`](Self::reset) refunds it after a
/// successful connection, so the budget applies per outage rather
/// than per process lifetime.
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempts: u32,
}

impl ReconnectPolicy {
    /// Create a policy from a configuration.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    /// The delay to wait before the next attempt, or `None` once the
    /// attempt budget is exhausted.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.config.max_attempts {
            return None;
        }

        let exponent = self.attempts;
        self.attempts += 1;

        #[allow(clippy::cast_precision_loss)]
        let base = self.config.initial_delay.as_millis() as f64
            * self.config.multiplier.powi(i32::try_from(exponent).unwrap_or(i32::MAX));
        #[allow(clippy::cast_precision_loss)]
        let capped = base.min(self.config.max_delay.as_millis() as f64);

        Some(self.apply_jitter(capped))
    }

    /// Refund the attempt budget after a successful connection.
    pub const fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Number of attempts spent since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempts
    }

    /// Whether the budget allows another attempt.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.attempts < self.config.max_attempts
    }

    fn apply_jitter(&self, millis: f64) -> Duration {
        if self.config.jitter_factor <= 0.0 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            return Duration::from_millis(millis.max(0.0) as u64);
        }

        let spread = millis * self.config.jitter_factor;
        let mut rng = rand::rng();
        let jitter: f64 = rng.random_range(-spread..=spread);
        let adjusted = (millis + jitter).max(1.0);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Duration::from_millis(adjusted as u64)
    }
}
