//! Reconnection Policy
//!
//! Decides how long the subscription manager waits before re-opening a
//! closed price stream. The default is a fixed one-second delay with no cap
//! on attempts; backoff and jitter are opt-in through `WebSocketSettings`.

use std::time::Duration;

use rand::Rng;

use crate::infrastructure::config::WebSocketSettings;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound for the delay.
    pub max_delay: Duration,
    /// Growth factor applied after each attempt (1.0 keeps the delay fixed).
    pub multiplier: f64,
    /// Jitter as a fraction of the delay (e.g. 0.1 = ±10%).
    pub jitter_factor: f64,
    /// Attempts allowed before giving up (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self::from_websocket_settings(&WebSocketSettings::default())
    }
}

impl ReconnectConfig {
    /// Fixed delay, no jitter, unlimited attempts.
    #[must_use]
    pub const fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
            jitter_factor: 0.0,
            max_attempts: 0,
        }
    }

    /// Create configuration from `WebSocketSettings`.
    #[must_use]
    pub fn from_websocket_settings(settings: &WebSocketSettings) -> Self {
        Self {
            initial_delay: settings.reconnect_delay_initial,
            max_delay: settings.reconnect_delay_max,
            multiplier: settings.reconnect_delay_multiplier,
            jitter_factor: settings.reconnect_jitter,
            max_attempts: settings.max_reconnect_attempts,
        }
        .sanitized()
    }

    /// Replace factors the schedule cannot use.
    ///
    /// A non-finite or negative jitter becomes 0.0 and a non-finite or
    /// non-positive multiplier becomes 1.0.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        if !self.jitter_factor.is_finite() || self.jitter_factor < 0.0 {
            tracing::warn!(jitter = self.jitter_factor, "Ignoring invalid reconnect jitter");
            self.jitter_factor = 0.0;
        }
        if !self.multiplier.is_finite() || self.multiplier <= 0.0 {
            tracing::warn!(
                multiplier = self.multiplier,
                "Ignoring invalid reconnect multiplier"
            );
            self.multiplier = 1.0;
        }
        self
    }
}

/// Reconnection schedule for one subscription.
///
/// # Example
///
/// ```rust
/// use anypayx_prices::infrastructure::stream::reconnect::{ReconnectConfig, ReconnectPolicy};
/// use std::time::Duration;
///
/// let mut policy = ReconnectPolicy::new(ReconnectConfig::fixed(Duration::from_secs(1)));
///
/// assert_eq!(policy.next_delay(), Some(Duration::from_secs(1)));
/// assert_eq!(policy.next_delay(), Some(Duration::from_secs(1)));
///
/// // A connection opened again
/// policy.reset();
/// assert_eq!(policy.attempt_count(), 0);
/// ```
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    current_delay: Duration,
    attempt_count: u32,
}

impl ReconnectPolicy {
    /// Create a new reconnection policy.
    #[must_use]
    pub fn new(config: ReconnectConfig) -> Self {
        let config = config.sanitized();
        let initial_delay = config.initial_delay;
        Self {
            config,
            current_delay: initial_delay,
            attempt_count: 0,
        }
    }

    /// Delay before the next attempt, or `None` once attempts are exhausted.
    #[must_use]
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.should_retry() {
            return None;
        }

        self.attempt_count += 1;
        let delay = self.apply_jitter(self.current_delay);
        self.current_delay = self.grow(self.current_delay);

        Some(delay)
    }

    /// Reset after a connection opened.
    pub const fn reset(&mut self) {
        self.current_delay = self.config.initial_delay;
        self.attempt_count = 0;
    }

    /// Attempts scheduled since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Check if reconnection should continue.
    #[must_use]
    pub const fn should_retry(&self) -> bool {
        self.config.max_attempts == 0 || self.attempt_count < self.config.max_attempts
    }

    fn grow(&self, delay: Duration) -> Duration {
        if (self.config.multiplier - 1.0).abs() < f64::EPSILON {
            return delay.min(self.config.max_delay.max(self.config.initial_delay));
        }

        #[allow(clippy::cast_precision_loss)]
        let scaled = (delay.as_millis() as f64 * self.config.multiplier).round();
        let next_millis = if scaled.is_finite() && scaled > 0.0 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            {
                scaled as u128
            }
        } else {
            0
        };
        let capped = next_millis.min(self.config.max_delay.as_millis());
        Duration::from_millis(u64::try_from(capped).unwrap_or(u64::MAX))
    }

    fn apply_jitter(&self, duration: Duration) -> Duration {
        #[allow(clippy::cast_precision_loss)]
        let base_millis = duration.as_millis() as f64;
        let jitter_range = base_millis * self.config.jitter_factor;
        if !jitter_range.is_finite() || jitter_range <= 0.0 {
            return duration;
        }
        let jitter: f64 = rand::rng().random_range(-jitter_range..=jitter_range);
        let adjusted_millis = (base_millis + jitter).max(1.0);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let adjusted_u64 = adjusted_millis as u64;
        Duration::from_millis(adjusted_u64)
    }
}
