//! Canonical protocol types
//!
//! Vendor-neutral request, response and chunk shapes that every transport
//! converges on. Callers only ever see these.

pub mod chunk;
pub mod message;
pub mod request;
pub mod response;

pub use chunk::{ChatCompletionChunk, ChunkChoice, Delta};
pub use message::{Message, Role};
pub use request::{ChatCompletionRequest, CompletionParams};
pub use response::{ChatCompletionResponse, Choice, FinishReason, Usage};

/// Seconds since the unix epoch, used for `created` timestamps
pub(crate) fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}
