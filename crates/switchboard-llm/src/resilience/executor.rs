use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use switchboard_config::ResilienceConfig;
use switchboard_core::{CredentialContext, CredentialHealth, ErrorKind, ProviderErrorInfo};
use tokio_util::sync::CancellationToken;

use super::{OperationKind, RetryPolicy, TimeoutPolicy};
use crate::error::LlmError;
use crate::health::ProviderHealthTracker;
use crate::metrics::LlmMetrics;

/// Per-call inputs that attribute attempts and bound them
#[derive(Debug, Clone, Copy)]
pub struct CallContext<'a> {
    /// Selects the timeout budget
    pub operation: &'a OperationKind,
    /// Key every attempt is made with
    pub credential: &'a CredentialContext,
    /// Caller's cancellation signal
    pub cancel: &'a CancellationToken,
}

/// Runs units of work under timeout, retry and circuit breaker policies
pub struct ResilienceExecutor {
    timeouts: TimeoutPolicy,
    retry: RetryPolicy,
    attempt_timeout: Option<Duration>,
    breaker: Option<ProviderHealthTracker>,
    health: Arc<dyn CredentialHealth>,
    metrics: LlmMetrics,
}

impl ResilienceExecutor {
    pub fn new(timeouts: TimeoutPolicy, retry: RetryPolicy, health: Arc<dyn CredentialHealth>) -> Self {
        Self {
            timeouts,
            retry,
            attempt_timeout: None,
            breaker: None,
            health,
            metrics: LlmMetrics::new(),
        }
    }

    pub fn from_config(config: &ResilienceConfig, health: Arc<dyn CredentialHealth>) -> Self {
        let executor = Self::new(
            TimeoutPolicy::from(&config.timeouts),
            RetryPolicy::from(&config.retry),
            health,
        )
        .with_attempt_timeout(config.attempt_timeout);

        if config.circuit_breaker.enabled {
            executor.with_circuit_breaker(ProviderHealthTracker::new(&config.circuit_breaker))
        } else {
            executor
        }
    }

    #[must_use]
    pub const fn with_attempt_timeout(mut self, limit: Option<Duration>) -> Self {
        self.attempt_timeout = limit;
        self
    }

    #[must_use]
    pub fn with_circuit_breaker(mut self, breaker: ProviderHealthTracker) -> Self {
        self.breaker = Some(breaker);
        self
    }

    #[must_use]
    pub(crate) fn with_metrics(mut self, metrics: LlmMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Time budget for one call of `operation`
    pub fn budget_for(&self, operation: &OperationKind) -> Duration {
        self.timeouts.budget_for(operation)
    }

    /// Circuit breaker shared by every call, if enabled
    pub const fn circuit_breaker(&self) -> Option<&ProviderHealthTracker> {
        self.breaker.as_ref()
    }

    /// Execute `attempt` until it succeeds, fails permanently, runs out of
    /// retries or budget, or the caller cancels
    ///
    /// `attempt` receives the zero-based attempt number and must re-issue
    /// the whole call each time.
    ///
    /// # Errors
    ///
    /// Returns the last attempt's error unchanged, `LlmError::Timeout` if
    /// the operation budget expires, or `LlmError::Cancelled`
    pub async fn execute<T, F, Fut>(&self, ctx: CallContext<'_>, mut attempt: F) -> Result<T, LlmError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        if ctx.cancel.is_cancelled() {
            return Err(LlmError::Cancelled);
        }

        let budget = self.timeouts.budget_for(ctx.operation);
        let attempts = self.run_attempts(ctx, &mut attempt);

        tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => {
                tracing::debug!(provider = %ctx.credential.provider_id, "call cancelled by caller");
                Err(LlmError::Cancelled)
            }
            result = tokio::time::timeout(budget, attempts) => result.unwrap_or_else(|_| {
                tracing::warn!(
                    provider = %ctx.credential.provider_id,
                    operation = %ctx.operation,
                    budget_ms = budget.as_millis(),
                    "operation budget exhausted"
                );
                Err(LlmError::Timeout(format!("{} exceeded its {budget:?} budget", ctx.operation)))
            }),
        }
    }

    async fn run_attempts<T, F, Fut>(&self, ctx: CallContext<'_>, attempt: &mut F) -> Result<T, LlmError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let provider = ctx.credential.provider_id.as_str();
        let mut backoff = self.retry.backoff();
        let mut attempt_number = 0;

        if let Some(breaker) = &self.breaker
            && !breaker.try_acquire(provider)
        {
            tracing::warn!(provider, "circuit open, failing fast");
            return Err(LlmError::provider(
                ErrorKind::ServiceUnavailable,
                format!("circuit open for provider {provider}"),
            ));
        }

        loop {
            let outcome = match self.attempt_timeout {
                Some(limit) => tokio::time::timeout(limit, attempt(attempt_number))
                    .await
                    .unwrap_or_else(|_| Err(LlmError::Timeout(format!("attempt exceeded {limit:?}")))),
                None => attempt(attempt_number).await,
            };

            let error = match outcome {
                Ok(value) => {
                    if let Some(breaker) = &self.breaker {
                        breaker.record_success(provider);
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            self.observe(ctx, &error, attempt_number);

            let exhausted = attempt_number >= self.retry.max_retries;
            if !error.is_retryable() || exhausted {
                if error.is_fatal() {
                    self.report(ctx, &error, attempt_number);
                }
                if exhausted && error.is_retryable() {
                    tracing::warn!(provider, attempts = attempt_number + 1, error = %error, "retries exhausted");
                }
                return Err(error);
            }

            // Tripped by this call's own failures; the real error surfaces
            if let Some(breaker) = &self.breaker
                && !breaker.is_available(provider)
            {
                tracing::warn!(provider, attempts = attempt_number + 1, error = %error, "circuit opened, not retrying");
                return Err(error);
            }

            let delay = backoff.next_delay(error.retry_after());
            self.metrics.record_retry(provider, error.label());

            tracing::warn!(
                provider,
                key_id = %ctx.credential.key_id,
                attempt = attempt_number + 1,
                delay_ms = delay.as_millis(),
                error = %error,
                "retrying after transient failure"
            );

            tokio::select! {
                biased;
                () = ctx.cancel.cancelled() => return Err(LlmError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }

            attempt_number += 1;
        }
    }

    /// Side effects of every failed attempt
    fn observe(&self, ctx: CallContext<'_>, error: &LlmError, attempt_number: u32) {
        let provider = ctx.credential.provider_id.as_str();

        if error.is_outage()
            && let Some(breaker) = &self.breaker
        {
            breaker.record_failure(provider);
        }

        if let Some(kind) = error.provider_kind() {
            self.metrics.record_provider_error(provider, kind);

            if kind == ErrorKind::RateLimitExceeded {
                self.report(ctx, error, attempt_number);
            }
        }
    }

    fn report(&self, ctx: CallContext<'_>, error: &LlmError, attempt_number: u32) {
        let LlmError::Provider {
            kind, status, message, ..
        } = error
        else {
            return;
        };

        self.health.report_error(ProviderErrorInfo {
            key_id: ctx.credential.key_id.clone(),
            provider_id: ctx.credential.provider_id.clone(),
            error_kind: *kind,
            message: message.clone(),
            http_status: *status,
            retry_attempt: attempt_number,
        });
    }
}
