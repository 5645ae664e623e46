use serde::{Deserialize, Serialize};

use super::message::Message;

/// Reason the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of generation
    Stop,
    /// Hit the `max_tokens` limit
    Length,
    /// Content was filtered by safety systems
    ContentFilter,
    /// Model asked for a tool call
    ToolCall,
    /// Vendor reported a reason with no canonical equivalent
    Unknown,
}

/// Token usage statistics
///
/// `total_tokens` is always the sum of the other two and is wide enough
/// that the sum never overflows; construct through [`Usage::new`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt
    pub prompt_tokens: u32,
    /// Tokens generated in the completion
    pub completion_tokens: u32,
    /// Total tokens (prompt + completion)
    pub total_tokens: u64,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: u64::from(prompt_tokens) + u64::from(completion_tokens),
        }
    }
}

/// A single completion choice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    /// Index of this choice
    pub index: u32,
    /// Generated message
    pub message: Message,
    /// Why generation stopped
    pub finish_reason: FinishReason,
}

/// Canonical one-shot completion result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    /// Unique response identifier
    pub id: String,
    /// Always `chat.completion`
    pub object: String,
    /// Unix timestamp of creation
    pub created: u64,
    /// Model alias the caller asked for
    pub model: String,
    /// Generated choices
    pub choices: Vec<Choice>,
    /// Token usage statistics
    pub usage: Usage,
}

impl ChatCompletionResponse {
    pub const OBJECT: &'static str = "chat.completion";

    /// Text of the first choice, empty when there is none
    pub fn content(&self) -> &str {
        self.choices.first().map_or("", |c| c.message.content.as_str())
    }
}
