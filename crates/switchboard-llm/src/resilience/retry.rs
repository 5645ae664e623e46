use std::time::Duration;

use rand::Rng;
use switchboard_config::RetryConfig;

/// How many times and how patiently to retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Lower bound of every sleep
    pub initial_delay: Duration,
    /// Upper bound of every sleep
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Single attempt, no retries
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Fresh backoff state for one call
    pub fn backoff(&self) -> Backoff {
        Backoff {
            base: self.initial_delay,
            cap: self.max_delay.max(self.initial_delay),
            previous: self.initial_delay,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_delay: config.initial_delay,
            max_delay: config.max_delay,
        }
    }
}

/// Decorrelated jitter backoff
///
/// Each sleep is drawn uniformly from `[base, previous * 3]` and clamped to
/// `[base, cap]`.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    previous: Duration,
}

impl Backoff {
    /// Delay before the next attempt
    ///
    /// A server-provided `hint` (e.g. `Retry-After`) raises the delay to at
    /// least that value, still capped by the envelope.
    pub fn next_delay(&mut self, hint: Option<Duration>) -> Duration {
        let low = self.base;
        let high = self.previous.saturating_mul(3).max(low);

        let jittered = if high > low {
            rand::rng().random_range(low..=high)
        } else {
            low
        };

        let delay = hint.map_or(jittered, |hint| jittered.max(hint)).clamp(self.base, self.cap);
        self.previous = delay;
        delay
    }
}
