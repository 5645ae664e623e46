//! Conversion between canonical types and `OpenAI` wire format

use super::error_kind_from_type;
use crate::error::LlmError;
use crate::protocol::openai::{
    OpenAiMessage, OpenAiRequest, OpenAiResponse, OpenAiStreamChunk, OpenAiStreamError, OpenAiStreamOptions,
    OpenAiUsage,
};
use crate::stream::{ChoiceDelta, Frame, FrameEvent, FrameParser, FrameUpdate, decode_frame};
use crate::types::{ChatCompletionRequest, ChatCompletionResponse, Choice, FinishReason, Message, Role, Usage};

/// Sentinel ending an `OpenAI` event stream
const DONE_SENTINEL: &str = "[DONE]";

// -- Outbound: canonical request -> OpenAI wire format --

/// Build the request body
///
/// `include_usage` asks for a trailing usage frame; only the canonical
/// API is known to accept it.
pub fn build_request(
    request: &ChatCompletionRequest,
    model_id: &str,
    stream: bool,
    include_usage: bool,
) -> OpenAiRequest {
    let params = &request.params;

    OpenAiRequest {
        model: model_id.to_owned(),
        messages: request
            .messages
            .iter()
            .map(|m| OpenAiMessage {
                role: m.role.as_str().to_owned(),
                content: Some(m.content.clone()),
            })
            .collect(),
        temperature: params.temperature,
        top_p: params.top_p,
        max_tokens: params.max_tokens,
        stop: params.stop.clone(),
        n: params.n,
        stream: stream.then_some(true),
        stream_options: (stream && include_usage).then_some(OpenAiStreamOptions { include_usage: true }),
    }
}

// -- Inbound: OpenAI wire format -> canonical types --

impl From<OpenAiResponse> for ChatCompletionResponse {
    fn from(resp: OpenAiResponse) -> Self {
        Self {
            id: resp.id,
            object: Self::OBJECT.to_owned(),
            created: resp.created,
            model: resp.model,
            choices: resp
                .choices
                .into_iter()
                .map(|choice| Choice {
                    index: choice.index,
                    message: Message::assistant(choice.message.content.unwrap_or_default()),
                    finish_reason: choice.finish_reason.as_deref().map_or(FinishReason::Stop, parse_finish_reason),
                })
                .collect(),
            usage: resp.usage.map(usage).unwrap_or_default(),
        }
    }
}

/// Parse a one-shot response body
///
/// # Errors
///
/// Returns `LlmError::Communication` if the body is not a valid response
pub fn parse_response(provider: &str, body: &[u8]) -> Result<ChatCompletionResponse, LlmError> {
    let response: OpenAiResponse = serde_json::from_slice(body)
        .map_err(|e| LlmError::Communication(format!("failed to parse {provider} response: {e}")))?;

    Ok(response.into())
}

pub fn parse_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "stop" => FinishReason::Stop,
        "length" => FinishReason::Length,
        "content_filter" => FinishReason::ContentFilter,
        "tool_calls" | "function_call" => FinishReason::ToolCall,
        _ => FinishReason::Unknown,
    }
}

fn parse_role(role: &str) -> Option<Role> {
    match role {
        "system" => Some(Role::System),
        "user" => Some(Role::User),
        "assistant" => Some(Role::Assistant),
        _ => None,
    }
}

fn usage(usage: OpenAiUsage) -> Usage {
    Usage::new(usage.prompt_tokens, usage.completion_tokens)
}

// -- Streaming --

/// Decoder for `OpenAI` `chat.completion.chunk` events
///
/// The stream ends at a `[DONE]` sentinel. A `content_filter` finish
/// reason aborts the stream instead of ending it quietly.
pub struct OpenAiFrameParser {
    provider: String,
}

impl OpenAiFrameParser {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
        }
    }
}

impl FrameParser for OpenAiFrameParser {
    fn parse(&mut self, frame: &Frame) -> Result<FrameEvent, LlmError> {
        let data = frame.data.trim();
        if data == DONE_SENTINEL {
            return Ok(FrameEvent::Done);
        }

        let value: serde_json::Value = decode_frame(&self.provider, data)?;

        if value.get("error").is_some() {
            let error: OpenAiStreamError = serde_json::from_value(value)
                .map_err(|e| LlmError::Communication(format!("malformed stream error from {}: {e}", self.provider)))?;
            let kind = error_kind_from_type(error.error.error_type.as_deref().unwrap_or_default());
            return Err(LlmError::provider(kind, error.error.message));
        }

        let chunk: OpenAiStreamChunk = serde_json::from_value(value)
            .map_err(|e| LlmError::Communication(format!("malformed stream frame from {}: {e}", self.provider)))?;

        let mut choices = Vec::with_capacity(chunk.choices.len());
        for choice in chunk.choices {
            let finish_reason = choice.finish_reason.as_deref().map(parse_finish_reason);

            if finish_reason == Some(FinishReason::ContentFilter) {
                return Err(LlmError::ContentBlocked {
                    reason: "content_filter".to_owned(),
                });
            }

            choices.push(ChoiceDelta {
                index: choice.index,
                role: choice.delta.role.as_deref().and_then(parse_role),
                content: choice.delta.content,
                finish_reason,
            });
        }

        Ok(FrameEvent::Update(FrameUpdate {
            id: chunk.id,
            choices,
            usage: chunk.usage.map(usage),
        }))
    }
}
