use std::time::{Duration, Instant};

use crate::error::HealthError;

/// Consecutive failures before the circuit opens
const FAILURE_THRESHOLD: u32 = 3;

/// How long the circuit stays open before allowing a probe request
const RECOVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Circuit breaker that stops reporting while the service is unhealthy
///
/// Owned by the background reporter task.
#[derive(Debug, Default)]
pub(crate) struct CircuitBreaker {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

impl CircuitBreaker {
    /// Create a closed circuit breaker
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Check whether the circuit allows a report through
    ///
    /// # Errors
    ///
    /// Returns `HealthError::CircuitOpen` while the circuit is open and the
    /// recovery timeout has not elapsed
    pub(crate) fn check(&self) -> Result<(), HealthError> {
        self.check_at(Instant::now())
    }

    fn check_at(&self, now: Instant) -> Result<(), HealthError> {
        match self.opened_at {
            Some(opened) if now.saturating_duration_since(opened) < RECOVERY_TIMEOUT => Err(HealthError::CircuitOpen),
            _ => Ok(()),
        }
    }

    /// Record a delivered report, closing the circuit
    pub(crate) fn record_success(&mut self) {
        *self = Self::default();
    }

    /// Record a failed delivery, (re)opening the circuit at the threshold
    pub(crate) fn record_failure(&mut self) {
        self.record_failure_at(Instant::now());
    }

    fn record_failure_at(&mut self, now: Instant) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        if self.consecutive_failures >= FAILURE_THRESHOLD {
            if self.opened_at.is_none() {
                tracing::warn!(
                    failures = self.consecutive_failures,
                    recovery_secs = RECOVERY_TIMEOUT.as_secs(),
                    "credential-health circuit opened"
                );
            }
            self.opened_at = Some(now);
        }
    }
}
