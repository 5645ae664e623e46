//! Core LLM gateway crate for Switchboard
//!
//! Provides a unified interface over multiple LLM providers (`OpenAI`,
//! Anthropic, Google, Ollama): canonical request/response/chunk types, a
//! streaming translator, a resilience executor with timeouts, retries and a
//! circuit breaker, and classification of provider failures for
//! credential-health reporting.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod classify;
pub mod convert;
pub mod error;
pub mod gateway;
pub mod health;
pub mod metrics;
pub mod protocol;
pub mod provider;
pub mod resilience;
pub mod routing;
pub mod stream;
pub mod types;

pub use error::LlmError;
pub use gateway::Gateway;
pub use health::{CircuitState, ProviderHealthTracker};
pub use provider::{OutboundCall, RawBody, RawResponse, Transport};
pub use resilience::{CallContext, OperationKind, ResilienceExecutor, RetryPolicy, TimeoutPolicy};
pub use routing::{ModelRouter, ResolvedModel};
pub use stream::{ChunkStream, StreamTranslator, TranslatorOptions};
pub use types::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, CompletionParams, FinishReason, Message,
    Role, Usage,
};
