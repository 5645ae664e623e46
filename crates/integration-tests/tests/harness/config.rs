//! Programmatic configuration builder for integration tests

use std::time::Duration;

use secrecy::SecretString;
use switchboard_config::{ApiKeyConfig, Config, LlmProviderConfig, LlmProviderType, ModelOverride};

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a builder with short backoffs so retry tests stay fast
    pub fn new() -> Self {
        let mut config = Config::default();
        config.resilience.retry.initial_delay = Duration::from_millis(10);
        config.resilience.retry.max_delay = Duration::from_millis(50);
        config.resilience.timeouts.default = Duration::from_secs(10);

        Self { config }
    }

    /// Add an OpenAI-compatible provider pointed at a mock vendor
    pub fn with_openai_provider(self, name: &str, base_url: &str) -> Self {
        self.with_provider(name, LlmProviderType::Openai, base_url, Some("primary"))
    }

    /// Add a keyless Ollama provider pointed at a mock vendor
    pub fn with_ollama_provider(self, name: &str, base_url: &str) -> Self {
        self.with_provider(name, LlmProviderType::Ollama, base_url, None)
    }

    fn with_provider(mut self, name: &str, provider_type: LlmProviderType, base_url: &str, key_id: Option<&str>) -> Self {
        let mut provider = LlmProviderConfig::new(provider_type).with_base_url(base_url.parse().expect("valid URL"));

        if let Some(key_id) = key_id {
            provider.keys.push(ApiKeyConfig {
                id: key_id.to_owned(),
                api_key: SecretString::from("test-key"),
            });
        }

        self.config.llm.providers.insert(name.to_owned(), provider);
        self
    }

    /// Expose `model` on `provider` under a public alias
    pub fn with_alias(mut self, provider: &str, model: &str, alias: &str) -> Self {
        let provider = self
            .config
            .llm
            .providers
            .get_mut(provider)
            .expect("provider added before alias");

        provider.models.overrides.insert(
            model.to_owned(),
            ModelOverride {
                alias: Some(alias.to_owned()),
            },
        );
        self
    }

    /// Set the number of retries after the first attempt
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.config.resilience.retry.max_retries = max_retries;
        self
    }

    /// Bound the gap between two stream frames
    pub const fn with_stream_idle_timeout(mut self, limit: Duration) -> Self {
        self.config.resilience.stream_idle_timeout = Some(limit);
        self
    }

    /// Bound every single attempt
    pub const fn with_attempt_timeout(mut self, limit: Duration) -> Self {
        self.config.resilience.attempt_timeout = Some(limit);
        self
    }

    /// Open the circuit after `threshold` outages
    pub const fn with_circuit_threshold(mut self, threshold: u32) -> Self {
        self.config.resilience.circuit_breaker.error_threshold = threshold;
        self
    }

    /// Build the final config
    pub fn build(self) -> Config {
        self.config
    }
}
