use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

/// Timeout, retry and circuit breaker policies applied to every outbound call
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResilienceConfig {
    /// Operation-level budgets bounding all attempts of one call
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Bound on a single attempt
    #[serde(default, deserialize_with = "crate::duration::deserialize_option")]
    pub attempt_timeout: Option<Duration>,
    /// Longest allowed gap between two frames of a stream
    #[serde(default, deserialize_with = "crate::duration::deserialize_option")]
    pub stream_idle_timeout: Option<Duration>,
    /// Retry with backoff
    #[serde(default)]
    pub retry: RetryConfig,
    /// Per-provider circuit breaker
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
}

/// Operation-aware timeout budgets
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutConfig {
    /// Budget for operations without a specific entry
    #[serde(default = "default_timeout", deserialize_with = "crate::duration::deserialize")]
    pub default: Duration,
    /// Budgets keyed by operation kind (e.g. "completion", "embedding")
    #[serde(default, deserialize_with = "crate::duration::deserialize_map")]
    pub operations: HashMap<String, Duration>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default: default_timeout(),
            operations: HashMap::new(),
        }
    }
}

impl TimeoutConfig {
    /// Budget for an operation kind, falling back to the default
    pub fn budget_for(&self, operation: &str) -> Duration {
        self.operations.get(operation).copied().unwrap_or(self.default)
    }
}

/// Retry policy with jittered exponential backoff
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Retries after the first attempt (0 disables retrying)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Lower bound of every backoff sleep
    #[serde(default = "default_initial_delay", deserialize_with = "crate::duration::deserialize")]
    pub initial_delay: Duration,
    /// Upper bound of every backoff sleep
    #[serde(default = "default_max_delay", deserialize_with = "crate::duration::deserialize")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
        }
    }
}

/// Circuit breaker thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CircuitBreakerConfig {
    /// Whether the breaker is consulted at all
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Failures inside one window that open the circuit
    #[serde(default = "default_error_threshold")]
    pub error_threshold: u32,
    /// Length of the failure counting window
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    /// How long an open circuit waits before letting a probe through
    #[serde(default = "default_recovery_seconds")]
    pub recovery_seconds: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            error_threshold: default_error_threshold(),
            window_seconds: default_window_seconds(),
            recovery_seconds: default_recovery_seconds(),
        }
    }
}

const fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_delay() -> Duration {
    Duration::from_millis(200)
}

const fn default_max_delay() -> Duration {
    Duration::from_secs(10)
}

#[allow(clippy::missing_const_for_fn)]
fn default_true() -> bool {
    true
}

const fn default_error_threshold() -> u32 {
    5
}

const fn default_window_seconds() -> u64 {
    60
}

const fn default_recovery_seconds() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_uses_defaults() {
        let config: ResilienceConfig = toml::from_str("").unwrap();
        assert_eq!(config.timeouts.default, Duration::from_secs(60));
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(200));
        assert!(config.attempt_timeout.is_none());
        assert!(config.circuit_breaker.enabled);
    }

    #[test]
    fn parses_human_durations() {
        let config: ResilienceConfig = toml::from_str(
            r#"
            attempt_timeout = "45s"
            stream_idle_timeout = "1m"

            [timeouts]
            default = "90s"

            [timeouts.operations]
            completion = "2m"
            embedding = "500ms"

            [retry]
            max_retries = 5
            initial_delay = "100ms"
            max_delay = "5s"
            "#,
        )
        .unwrap();

        assert_eq!(config.attempt_timeout, Some(Duration::from_secs(45)));
        assert_eq!(config.stream_idle_timeout, Some(Duration::from_secs(60)));
        assert_eq!(config.timeouts.budget_for("completion"), Duration::from_secs(120));
        assert_eq!(config.timeouts.budget_for("embedding"), Duration::from_millis(500));
        assert_eq!(config.timeouts.budget_for("image"), Duration::from_secs(90));
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.max_delay, Duration::from_secs(5));
    }

    #[test]
    fn rejects_garbage_duration() {
        let err = toml::from_str::<ResilienceConfig>(r#"attempt_timeout = "soon""#).unwrap_err();
        assert!(err.to_string().contains("invalid duration"));
    }
}
