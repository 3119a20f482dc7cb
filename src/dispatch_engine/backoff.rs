//! Retry backoff policy
//!
//! Delays grow exponentially from the initial delay, are capped at the
//! maximum delay, and carry ±50% random jitter so concurrent retries spread
//! out. A rate-limit reply's retry-after hint wins over a shorter delay.

use rand::Rng;
use std::time::Duration;

use crate::config::DispatchConfig;
use crate::utils::{
    DEFAULT_BACKOFF_FACTOR, DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY_MS,
    JITTER_RATIO,
};

/// Retryable failure classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Upstream answered 429
    RateLimited,
    /// Upstream answered 408 or 5xx
    ServerError,
    /// Connect failure or request timeout
    NetworkTimeout,
    /// Any other request-level failure
    Unknown,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorClass::RateLimited => "rate_limited",
            ErrorClass::ServerError => "server_error",
            ErrorClass::NetworkTimeout => "network_timeout",
            ErrorClass::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Exponential backoff with jitter
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Total attempts per logical call, first try included
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    /// Half-width of the jitter band as a fraction of the delay
    pub jitter_ratio: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            multiplier: DEFAULT_BACKOFF_FACTOR,
            jitter_ratio: JITTER_RATIO,
        }
    }
}

impl BackoffPolicy {
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts(),
            initial_delay: config.initial_delay(),
            max_delay: config.max_delay(),
            multiplier: config.backoff_factor(),
            jitter_ratio: JITTER_RATIO,
        }
    }

    /// Un-jittered delay after `attempt` failures (0-based).
    ///
    /// Non-decreasing in `attempt` and never above `max_delay`.
    #[must_use]
    pub fn computed_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let scaled = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = scaled.min(self.max_delay.as_secs_f64());
        if capped.is_finite() && capped >= 0.0 {
            Duration::from_secs_f64(capped)
        } else {
            self.max_delay
        }
    }

    /// Delay before the next attempt, jittered with the thread RNG
    pub fn next_delay(
        &self,
        attempt: u32,
        class: ErrorClass,
        retry_after: Option<Duration>,
    ) -> Duration {
        self.next_delay_with(attempt, class, retry_after, &mut rand::rng())
    }

    /// Delay before the next attempt using the given RNG
    pub fn next_delay_with<R: Rng + ?Sized>(
        &self,
        attempt: u32,
        class: ErrorClass,
        retry_after: Option<Duration>,
        rng: &mut R,
    ) -> Duration {
        let base = self.computed_delay(attempt).as_secs_f64();
        let spread = base * self.jitter_ratio;
        let jittered = if spread > 0.0 {
            base + rng.random_range(-spread..=spread)
        } else {
            base
        };
        let delay = Duration::from_secs_f64(jittered.max(0.0));

        // The upstream knows when its window reopens
        match (class, retry_after) {
            (ErrorClass::RateLimited, Some(hint)) if hint > delay => hint,
            _ => delay,
        }
    }

    /// Largest delay `next_delay` can return without a retry-after hint
    #[must_use]
    pub fn delay_bound(&self) -> Duration {
        self.max_delay.mul_f64(1.0 + self.jitter_ratio)
    }

    /// Whether `attempts_made` attempts use up the budget
    #[must_use]
    pub fn is_exhausted(&self, attempts_made: u32) -> bool {
        attempts_made >= self.max_attempts
    }
}
