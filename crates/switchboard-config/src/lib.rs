#![allow(clippy::must_use_candidate)]

pub mod credential_health;
mod duration;
mod env;
pub mod llm;
mod loader;
pub mod resilience;
pub mod telemetry;

use serde::Deserialize;

pub use credential_health::*;
pub use llm::*;
pub use resilience::*;
pub use telemetry::TelemetryConfig;

/// Top-level switchboard configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// LLM provider configuration
    #[serde(default)]
    pub llm: LlmConfig,
    /// Timeout, retry and circuit breaker policies
    #[serde(default)]
    pub resilience: ResilienceConfig,
    /// External credential-health service
    #[serde(default)]
    pub credential_health: Option<CredentialHealthConfig>,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}
