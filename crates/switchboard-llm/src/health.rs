//! Provider outage tracking with a circuit breaker
//!
//! Outage-type failures (transport errors, timeouts, 5xx) are counted per
//! provider inside a sliding window. Once the count reaches the threshold
//! the circuit opens and calls fail fast until the recovery period has
//! passed, after which a single probe is let through. A probe that never
//! reports back releases its slot after another recovery period.

use std::time::Duration;

use dashmap::DashMap;
use switchboard_config::CircuitBreakerConfig;
use tokio::time::Instant;

/// Circuit breaker state for a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, requests flow through
    Closed,
    /// Provider is failing, requests are blocked
    Open,
    /// Recovery period elapsed, the next request is a probe
    HalfOpen,
}

#[derive(Debug)]
struct ProviderWindow {
    failures: u32,
    window_start: Instant,
    opened_at: Option<Instant>,
    probe_started: Option<Instant>,
}

impl ProviderWindow {
    fn new(now: Instant) -> Self {
        Self {
            failures: 0,
            window_start: now,
            opened_at: None,
            probe_started: None,
        }
    }
}

/// Per-provider circuit breaker
#[derive(Debug)]
pub struct ProviderHealthTracker {
    providers: DashMap<String, ProviderWindow>,
    threshold: u32,
    window: Duration,
    recovery: Duration,
}

impl ProviderHealthTracker {
    pub fn new(config: &CircuitBreakerConfig) -> Self {
        Self {
            providers: DashMap::new(),
            threshold: config.error_threshold.max(1),
            window: Duration::from_secs(config.window_seconds),
            recovery: Duration::from_secs(config.recovery_seconds),
        }
    }

    /// Check the circuit state for a provider
    pub fn state(&self, provider: &str) -> CircuitState {
        let Some(window) = self.providers.get(provider) else {
            return CircuitState::Closed;
        };

        match window.opened_at {
            None => CircuitState::Closed,
            Some(opened_at) if opened_at.elapsed() >= self.recovery => CircuitState::HalfOpen,
            Some(_) => CircuitState::Open,
        }
    }

    /// Whether a provider accepts requests right now
    pub fn is_available(&self, provider: &str) -> bool {
        self.state(provider) != CircuitState::Open
    }

    /// Claim permission to call a provider
    ///
    /// Always granted while closed. Once half-open, only the first caller
    /// gets through until the probe outcome is recorded.
    pub fn try_acquire(&self, provider: &str) -> bool {
        let Some(mut window) = self.providers.get_mut(provider) else {
            return true;
        };
        let Some(opened_at) = window.opened_at else {
            return true;
        };

        let now = Instant::now();
        if now.duration_since(opened_at) < self.recovery {
            return false;
        }

        match window.probe_started {
            Some(started) if now.duration_since(started) < self.recovery => false,
            _ => {
                window.probe_started = Some(now);
                drop(window);
                tracing::info!(provider, "circuit half-open, sending probe");
                true
            }
        }
    }

    /// Close the circuit after a successful call
    pub fn record_success(&self, provider: &str) {
        if let Some(mut window) = self.providers.get_mut(provider) {
            *window = ProviderWindow::new(Instant::now());
        }
    }

    /// Count an outage against a provider
    pub fn record_failure(&self, provider: &str) {
        let now = Instant::now();
        let mut window = self
            .providers
            .entry(provider.to_owned())
            .or_insert_with(|| ProviderWindow::new(now));

        // A failed probe reopens immediately
        if window.opened_at.is_some() {
            window.opened_at = Some(now);
            window.probe_started = None;
            drop(window);
            tracing::warn!(provider, "circuit breaker probe failed, reopening");
            return;
        }

        if now.duration_since(window.window_start) >= self.window {
            window.window_start = now;
            window.failures = 0;
        }

        window.failures += 1;

        if window.failures >= self.threshold {
            window.opened_at = Some(now);
            let failures = window.failures;
            drop(window);
            tracing::warn!(provider, failures, "circuit breaker opened for provider");
        }
    }
}
