use std::collections::HashSet;
use std::path::Path;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::parse(&raw)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing or validation fails
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if no provider is configured or any provider,
    /// alias or retry setting is invalid
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_llm_config()?;
        self.validate_resilience_config()?;
        Ok(())
    }

    /// Validate provider, key and model settings
    fn validate_llm_config(&self) -> anyhow::Result<()> {
        if self.llm.providers.is_empty() {
            anyhow::bail!("at least one LLM provider must be configured");
        }

        let mut aliases = HashSet::new();

        for (name, provider) in &self.llm.providers {
            if provider.provider_type.requires_key() && provider.keys.is_empty() {
                anyhow::bail!("provider '{name}' requires at least one key");
            }

            let mut key_ids = HashSet::new();
            for key in &provider.keys {
                if !key_ids.insert(key.id.as_str()) {
                    anyhow::bail!("provider '{name}' has duplicate key id '{}'", key.id);
                }
            }

            for pattern in provider.models.include.iter().chain(&provider.models.exclude) {
                regex::Regex::new(pattern)
                    .map_err(|e| anyhow::anyhow!("invalid model pattern for provider '{name}': {e}"))?;
            }

            for alias in provider.models.overrides.values().filter_map(|o| o.alias.as_deref()) {
                if !aliases.insert(alias) {
                    anyhow::bail!("model alias '{alias}' is defined more than once");
                }
            }
        }

        Ok(())
    }

    /// Validate retry and timeout settings
    fn validate_resilience_config(&self) -> anyhow::Result<()> {
        let retry = &self.resilience.retry;

        if retry.initial_delay > retry.max_delay {
            anyhow::bail!("resilience.retry.initial_delay must not exceed max_delay");
        }

        if self.resilience.timeouts.default.is_zero() {
            anyhow::bail!("resilience.timeouts.default must be greater than 0");
        }

        Ok(())
    }
}
