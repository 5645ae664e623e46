//! Model resolution and routing logic
//!
//! Resolves model names to provider + model pairs using the configured
//! aliases and include/exclude patterns.

use std::collections::HashMap;

use regex::Regex;
use switchboard_config::LlmConfig;

use crate::error::LlmError;

/// Resolved target for a model request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModel {
    /// Provider name (key in config)
    pub provider_name: String,
    /// Actual model identifier to send to the provider
    pub model_id: String,
    /// Whether the client explicitly specified the provider (e.g. "anthropic/claude-sonnet-4-20250514")
    pub explicit_provider: bool,
}

/// Routing-relevant model configuration extracted from a provider
#[derive(Debug, Default)]
struct ProviderModelConfig {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
    /// Reverse alias mappings: alias -> `actual_model_name`
    reverse_aliases: HashMap<String, String>,
}

impl ProviderModelConfig {
    /// Check if a model passes the include/exclude filters
    fn allows(&self, model: &str) -> bool {
        // If include patterns are set, model must match at least one
        if !self.include.is_empty() && !self.include.iter().any(|re| re.is_match(model)) {
            return false;
        }

        !self.exclude.iter().any(|re| re.is_match(model))
    }

    /// Resolve a model alias to its actual name
    fn resolve_alias(&self, model: &str) -> Option<&str> {
        self.reverse_aliases.get(model).map(String::as_str)
    }
}

/// Model routing table
#[derive(Debug)]
pub struct ModelRouter {
    /// Routing-relevant config per provider, in configuration order
    providers: Vec<(String, ProviderModelConfig)>,
}

impl ModelRouter {
    /// Create a new model router from configuration
    ///
    /// # Errors
    ///
    /// Returns `LlmError::InvalidRequest` if an include or exclude pattern
    /// is not a valid regex
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let providers = config
            .providers
            .iter()
            .map(|(name, provider_config)| {
                let models = &provider_config.models;

                let reverse_aliases = models
                    .overrides
                    .iter()
                    .filter_map(|(actual, over)| over.alias.clone().map(|alias| (alias, actual.clone())))
                    .collect();

                let model_config = ProviderModelConfig {
                    include: compile(name, &models.include)?,
                    exclude: compile(name, &models.exclude)?,
                    reverse_aliases,
                };

                Ok((name.clone(), model_config))
            })
            .collect::<Result<_, LlmError>>()?;

        Ok(Self { providers })
    }

    /// Resolve a model name to a provider and model identifier
    ///
    /// Supports two formats:
    /// - `provider_name/model_name` -- explicit provider selection
    /// - `model_name` -- an alias, or the first provider admitting the name
    ///
    /// # Errors
    ///
    /// Returns `LlmError::UnknownModel` if no provider serves the model.
    /// Returns `LlmError::ProviderNotFound` if an explicit provider name is unknown.
    pub fn resolve(&self, model: &str) -> Result<ResolvedModel, LlmError> {
        if let Some((provider_name, model_id)) = model.split_once('/')
            && let Some(resolved) = self.resolve_explicit(model, provider_name, model_id)?
        {
            return Ok(resolved);
        }

        // Aliases take precedence over pattern matching
        for (provider_name, model_config) in &self.providers {
            if let Some(actual) = model_config.resolve_alias(model)
                && model_config.allows(actual)
            {
                return Ok(ResolvedModel {
                    provider_name: provider_name.clone(),
                    model_id: actual.to_owned(),
                    explicit_provider: false,
                });
            }
        }

        for (provider_name, model_config) in &self.providers {
            if model_config.allows(model) {
                return Ok(ResolvedModel {
                    provider_name: provider_name.clone(),
                    model_id: model.to_owned(),
                    explicit_provider: false,
                });
            }
        }

        Err(LlmError::UnknownModel {
            model: model.to_owned(),
        })
    }

    /// Resolve `provider/model`
    ///
    /// Vendor model ids such as `meta-llama/Llama-3` also contain a slash,
    /// so `Ok(None)` is returned when the prefix names no provider but some
    /// provider admits the whole string.
    fn resolve_explicit(
        &self,
        model: &str,
        provider_name: &str,
        model_id: &str,
    ) -> Result<Option<ResolvedModel>, LlmError> {
        let Some((_, model_config)) = self.providers.iter().find(|(name, _)| name == provider_name) else {
            if self.providers.iter().any(|(_, config)| config.allows(model)) {
                return Ok(None);
            }
            return Err(LlmError::ProviderNotFound {
                provider: provider_name.to_owned(),
            });
        };

        let actual_model = model_config.resolve_alias(model_id).unwrap_or(model_id);

        if !model_config.allows(actual_model) {
            return Err(LlmError::UnknownModel {
                model: model.to_owned(),
            });
        }

        Ok(Some(ResolvedModel {
            provider_name: provider_name.to_owned(),
            model_id: actual_model.to_owned(),
            explicit_provider: true,
        }))
    }

    /// Configured provider names, in configuration order
    pub fn provider_names(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(|(name, _)| name.as_str())
    }
}

fn compile(provider: &str, patterns: &[String]) -> Result<Vec<Regex>, LlmError> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|e| {
                LlmError::InvalidRequest(format!("invalid model pattern '{pattern}' for provider '{provider}': {e}"))
            })
        })
        .collect()
}
