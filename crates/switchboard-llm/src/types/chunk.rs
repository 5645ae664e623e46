use serde::{Deserialize, Serialize};

use super::message::Role;
use super::response::{FinishReason, Usage};

/// Partial message content carried by one chunk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    /// Set on the first chunk of each choice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Text appended to the choice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// A choice within a streaming chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Index of the choice this delta belongs to
    pub index: u32,
    /// Incremental content
    pub delta: Delta,
    /// Set on the last chunk for this choice
    pub finish_reason: Option<FinishReason>,
}

/// Canonical streaming chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    /// Identifier shared by every chunk of one stream
    pub id: String,
    /// Always `chat.completion.chunk`
    pub object: String,
    /// Unix timestamp of stream start
    pub created: u64,
    /// Model alias the caller asked for
    pub model: String,
    /// Choices updated by this chunk
    pub choices: Vec<ChunkChoice>,
    /// Present on the final chunk only
    pub usage: Option<Usage>,
}

impl ChatCompletionChunk {
    pub const OBJECT: &'static str = "chat.completion.chunk";

    /// Concatenated text carried by this chunk across all choices
    pub fn content(&self) -> String {
        self.choices
            .iter()
            .filter_map(|c| c.delta.content.as_deref())
            .collect()
    }

    /// Whether any choice finishes in this chunk
    pub fn is_finishing(&self) -> bool {
        self.choices.iter().any(|c| c.finish_reason.is_some())
    }
}
