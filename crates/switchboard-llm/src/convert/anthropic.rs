//! Conversion between canonical types and Anthropic Messages format

use super::error_kind_from_type;
use crate::error::LlmError;
use crate::protocol::anthropic::{
    AnthropicMessage, AnthropicRequest, AnthropicResponse, AnthropicResponseBlock, AnthropicStreamDelta,
    AnthropicStreamEvent,
};
use crate::stream::{ChoiceDelta, Frame, FrameEvent, FrameParser, FrameUpdate, decode_frame};
use crate::types::{
    ChatCompletionRequest, ChatCompletionResponse, Choice, FinishReason, Message, Role, Usage, unix_now,
};

/// Used when the caller does not set `max_tokens`, which the API requires
const DEFAULT_MAX_TOKENS: u32 = 4096;

// -- Outbound: canonical request -> Anthropic wire format --

/// Build the request body
///
/// System messages are lifted into the top-level `system` field; the
/// remaining turns keep their order.
pub fn build_request(request: &ChatCompletionRequest, model_id: &str, stream: bool) -> AnthropicRequest {
    let params = &request.params;

    AnthropicRequest {
        model: model_id.to_owned(),
        max_tokens: params.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        system: request.system_prompt(),
        messages: request
            .conversation()
            .map(|m| AnthropicMessage {
                role: m.role.as_str().to_owned(),
                content: m.content.clone(),
            })
            .collect(),
        temperature: params.temperature,
        top_p: params.top_p,
        stop_sequences: params.stop.clone(),
        stream: stream.then_some(true),
    }
}

// -- Inbound: Anthropic wire format -> canonical types --

impl From<AnthropicResponse> for ChatCompletionResponse {
    fn from(resp: AnthropicResponse) -> Self {
        let text: String = resp
            .content
            .iter()
            .filter_map(|block| match block {
                AnthropicResponseBlock::Text { text } => Some(text.as_str()),
                AnthropicResponseBlock::Other => None,
            })
            .collect();

        Self {
            id: resp.id,
            object: Self::OBJECT.to_owned(),
            created: unix_now(),
            model: resp.model,
            choices: vec![Choice {
                index: 0,
                message: Message::assistant(text),
                finish_reason: resp.stop_reason.as_deref().map_or(FinishReason::Stop, parse_stop_reason),
            }],
            usage: Usage::new(resp.usage.input_tokens, resp.usage.output_tokens),
        }
    }
}

/// Parse a one-shot response body
///
/// # Errors
///
/// Returns `LlmError::Communication` if the body is not a valid response
pub fn parse_response(provider: &str, body: &[u8]) -> Result<ChatCompletionResponse, LlmError> {
    let response: AnthropicResponse = serde_json::from_slice(body)
        .map_err(|e| LlmError::Communication(format!("failed to parse {provider} response: {e}")))?;

    Ok(response.into())
}

pub fn parse_stop_reason(reason: &str) -> FinishReason {
    match reason {
        "end_turn" | "stop_sequence" => FinishReason::Stop,
        "max_tokens" => FinishReason::Length,
        "tool_use" => FinishReason::ToolCall,
        "refusal" => FinishReason::ContentFilter,
        _ => FinishReason::Unknown,
    }
}

// -- Streaming --

/// Decoder for Anthropic message events
///
/// Prompt tokens arrive in `message_start` and completion tokens in
/// `message_delta`, so the parser holds the former until the latter.
pub struct AnthropicFrameParser {
    provider: String,
    input_tokens: u32,
}

impl AnthropicFrameParser {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            input_tokens: 0,
        }
    }
}

impl FrameParser for AnthropicFrameParser {
    fn parse(&mut self, frame: &Frame) -> Result<FrameEvent, LlmError> {
        let event: AnthropicStreamEvent = decode_frame(&self.provider, &frame.data)?;

        match event {
            AnthropicStreamEvent::MessageStart { message } => {
                self.input_tokens = message.usage.map_or(0, |u| u.input_tokens);

                Ok(FrameEvent::Update(FrameUpdate {
                    id: Some(message.id),
                    choices: vec![ChoiceDelta {
                        role: Some(Role::Assistant),
                        ..ChoiceDelta::default()
                    }],
                    usage: None,
                }))
            }
            AnthropicStreamEvent::ContentBlockDelta {
                delta: AnthropicStreamDelta::TextDelta { text },
                ..
            } => Ok(FrameEvent::Update(FrameUpdate {
                choices: vec![ChoiceDelta {
                    content: Some(text),
                    ..ChoiceDelta::default()
                }],
                ..FrameUpdate::default()
            })),
            AnthropicStreamEvent::MessageDelta { delta, usage } => {
                let finish_reason = delta.stop_reason.as_deref().map(parse_stop_reason);

                if finish_reason == Some(FinishReason::ContentFilter) {
                    return Err(LlmError::ContentBlocked {
                        reason: "refusal".to_owned(),
                    });
                }

                Ok(FrameEvent::Update(FrameUpdate {
                    id: None,
                    choices: finish_reason
                        .map(|reason| ChoiceDelta {
                            finish_reason: Some(reason),
                            ..ChoiceDelta::default()
                        })
                        .into_iter()
                        .collect(),
                    usage: usage.map(|u| Usage::new(self.input_tokens, u.output_tokens)),
                }))
            }
            AnthropicStreamEvent::MessageStop => Ok(FrameEvent::Done),
            AnthropicStreamEvent::Error { error } => {
                Err(LlmError::provider(error_kind_from_type(&error.error_type), error.message))
            }
            AnthropicStreamEvent::ContentBlockStart { .. }
            | AnthropicStreamEvent::ContentBlockDelta { .. }
            | AnthropicStreamEvent::ContentBlockStop { .. }
            | AnthropicStreamEvent::Ping
            | AnthropicStreamEvent::Unknown => Ok(FrameEvent::Skip),
        }
    }
}
