use std::collections::{BTreeMap, HashMap};

use indexmap::IndexMap;
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Top-level LLM configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// LLM provider configurations keyed by name
    #[serde(default)]
    pub providers: IndexMap<String, LlmProviderConfig>,
}

/// Configuration for a single LLM provider
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmProviderConfig {
    /// Provider protocol type
    #[serde(rename = "type")]
    pub provider_type: LlmProviderType,
    /// Credentials usable against this provider, in preference order
    #[serde(default)]
    pub keys: Vec<ApiKeyConfig>,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Model configuration
    #[serde(default)]
    pub models: ModelConfig,
    /// Static headers added to every request
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl LlmProviderConfig {
    /// Provider of the given type with no keys, overrides or headers
    pub fn new(provider_type: LlmProviderType) -> Self {
        Self {
            provider_type,
            keys: Vec::new(),
            base_url: None,
            models: ModelConfig::default(),
            headers: BTreeMap::new(),
        }
    }

    /// Builder-style base URL override
    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }
}

/// A named API key
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiKeyConfig {
    /// Identifier reported to the credential-health service
    pub id: String,
    /// Secret value
    pub api_key: SecretString,
}

/// Supported LLM provider protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProviderType {
    /// OpenAI-compatible API
    Openai,
    /// Anthropic Messages API
    Anthropic,
    /// Google Generative Language API
    Google,
    /// Ollama chat API
    Ollama,
}

impl LlmProviderType {
    /// Whether requests to this provider carry a credential
    pub const fn requires_key(self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

/// Model configuration for a provider
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    /// Include models matching these patterns (regex)
    #[serde(default)]
    pub include: Vec<String>,
    /// Exclude models matching these patterns (regex)
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Per-model overrides
    #[serde(default)]
    pub overrides: HashMap<String, ModelOverride>,
}

/// Per-model configuration overrides
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelOverride {
    /// Name callers may use instead of the vendor model id
    #[serde(default)]
    pub alias: Option<String>,
}
