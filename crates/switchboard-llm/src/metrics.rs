use std::time::Instant;

use switchboard_core::ErrorKind;
use switchboard_telemetry::metrics::{
    LLM_PROVIDER_ERROR_COUNT, LLM_REQUEST_COUNT, LLM_REQUEST_DURATION, LLM_RETRY_COUNT, LLM_STREAM_CHUNK_COUNT,
    LLM_TOKEN_USAGE, record_duration,
};
use switchboard_telemetry::{Counter, Histogram, KeyValue};

use crate::types::Usage;

/// Instruments recorded by the gateway and its executor
#[derive(Clone)]
pub struct LlmMetrics {
    requests: Counter<u64>,
    duration: Histogram<f64>,
    retries: Counter<u64>,
    provider_errors: Counter<u64>,
    stream_chunks: Counter<u64>,
    tokens: Counter<u64>,
}

impl LlmMetrics {
    pub fn new() -> Self {
        let meter = switchboard_telemetry::meter();

        Self {
            requests: meter
                .u64_counter(LLM_REQUEST_COUNT)
                .with_description("Completion calls by outcome")
                .build(),
            duration: meter
                .f64_histogram(LLM_REQUEST_DURATION)
                .with_unit("s")
                .with_description("Completion call latency including retries")
                .build(),
            retries: meter
                .u64_counter(LLM_RETRY_COUNT)
                .with_description("Attempts re-issued after a transient failure")
                .build(),
            provider_errors: meter
                .u64_counter(LLM_PROVIDER_ERROR_COUNT)
                .with_description("Classified provider failures")
                .build(),
            stream_chunks: meter
                .u64_counter(LLM_STREAM_CHUNK_COUNT)
                .with_description("Chunks delivered to streaming callers")
                .build(),
            tokens: meter
                .u64_counter(LLM_TOKEN_USAGE)
                .with_description("Tokens reported by providers")
                .build(),
        }
    }

    pub fn record_request(&self, provider: &str, model: &str, streaming: bool, outcome: &'static str, start: Instant) {
        let attributes = [
            KeyValue::new("provider", provider.to_owned()),
            KeyValue::new("model", model.to_owned()),
            KeyValue::new("streaming", streaming),
            KeyValue::new("outcome", outcome),
        ];

        self.requests.add(1, &attributes);
        record_duration(&self.duration, start, &attributes);
    }

    pub fn record_retry(&self, provider: &str, reason: &'static str) {
        self.retries.add(
            1,
            &[
                KeyValue::new("provider", provider.to_owned()),
                KeyValue::new("reason", reason),
            ],
        );
    }

    pub fn record_provider_error(&self, provider: &str, kind: ErrorKind) {
        self.provider_errors.add(
            1,
            &[
                KeyValue::new("provider", provider.to_owned()),
                KeyValue::new("error.kind", kind.as_str()),
            ],
        );
    }

    pub fn record_chunk(&self, provider: &str) {
        self.stream_chunks.add(1, &[KeyValue::new("provider", provider.to_owned())]);
    }

    pub fn record_usage(&self, provider: &str, model: &str, usage: &Usage) {
        let token_types = [("prompt", usage.prompt_tokens), ("completion", usage.completion_tokens)];

        for (token_type, count) in token_types {
            self.tokens.add(
                u64::from(count),
                &[
                    KeyValue::new("provider", provider.to_owned()),
                    KeyValue::new("model", model.to_owned()),
                    KeyValue::new("token.type", token_type),
                ],
            );
        }
    }
}

impl Default for LlmMetrics {
    fn default() -> Self {
        Self::new()
    }
}
