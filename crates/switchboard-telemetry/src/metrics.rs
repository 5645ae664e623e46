//! Metric name constants and recording helpers

use std::time::Instant;

use opentelemetry::metrics::Histogram;

/// Record a duration measurement on a histogram
pub fn record_duration(histogram: &Histogram<f64>, start: Instant, attributes: &[opentelemetry::KeyValue]) {
    let duration = start.elapsed().as_secs_f64();
    histogram.record(duration, attributes);
}

// Call metric names
pub const LLM_REQUEST_DURATION: &str = "llm.request.duration";
pub const LLM_REQUEST_COUNT: &str = "llm.request.count";
pub const LLM_TOKEN_USAGE: &str = "llm.token.usage";

// Resilience metric names
pub const LLM_RETRY_COUNT: &str = "llm.retry.count";
pub const LLM_PROVIDER_ERROR_COUNT: &str = "llm.provider_error.count";

// Streaming metric names
pub const LLM_STREAM_CHUNK_COUNT: &str = "llm.stream.chunk.count";

// Credential-health metric names
pub const HEALTH_REPORT_COUNT: &str = "credential_health.report.count";
