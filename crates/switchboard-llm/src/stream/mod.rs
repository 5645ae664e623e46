//! Streaming translation
//!
//! Raw vendor bodies are split into frames ([`framing`]), each frame is
//! decoded by a vendor [`FrameParser`] into a [`FrameEvent`], and the
//! [`translator`] turns those events into canonical chunks.

pub mod framing;
pub mod translator;

use std::pin::Pin;

use futures_util::Stream;

pub use self::framing::{Frame, FrameStream, Framing, frames};
pub use self::translator::{StreamTranslator, TranslatorOptions};
use crate::error::LlmError;
use crate::types::{ChatCompletionChunk, FinishReason, Role, Usage};

/// Lazy sequence of canonical chunks for one call
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChatCompletionChunk, LlmError>> + Send>>;

/// Incremental output for one choice
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChoiceDelta {
    pub index: u32,
    pub role: Option<Role>,
    pub content: Option<String>,
    pub finish_reason: Option<FinishReason>,
}

impl ChoiceDelta {
    /// Whether the delta carries text or ends the choice
    pub fn is_meaningful(&self) -> bool {
        self.content.as_deref().is_some_and(|c| !c.is_empty()) || self.finish_reason.is_some()
    }
}

/// Decoded content of one frame
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameUpdate {
    /// Vendor response id, when the frame carries one
    pub id: Option<String>,
    pub choices: Vec<ChoiceDelta>,
    pub usage: Option<Usage>,
}

/// What a vendor frame means for the chunk sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// Keep-alive or bookkeeping frame with nothing to emit
    Skip,
    /// New output, finish signals or usage
    Update(FrameUpdate),
    /// Explicit end-of-stream sentinel
    Done,
}

/// Vendor-specific decoder for streamed frames
///
/// A parser lives for exactly one stream, so it may carry state between
/// frames (ids, token counts reported early).
pub trait FrameParser: Send {
    /// Decode one frame
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Communication` for frames that cannot be decoded,
    /// `LlmError::ContentBlocked` when the vendor aborts generation, or a
    /// provider error the vendor sent inside the stream
    fn parse(&mut self, frame: &Frame) -> Result<FrameEvent, LlmError>;
}

/// Decode one frame's JSON, treating any failure as a broken stream
pub(crate) fn decode_frame<T: serde::de::DeserializeOwned>(provider: &str, data: &str) -> Result<T, LlmError> {
    serde_json::from_str(data).map_err(|e| {
        tracing::warn!(provider, error = %e, "malformed stream frame");
        LlmError::Communication(format!("malformed stream frame from {provider}: {e}"))
    })
}
