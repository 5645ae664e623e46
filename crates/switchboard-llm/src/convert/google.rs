//! Conversion between canonical types and Google `generateContent` format

use crate::error::LlmError;
use crate::protocol::google::{
    GoogleCandidate, GoogleContent, GoogleGenerationConfig, GooglePart, GoogleRequest, GoogleResponse,
    GoogleUsageMetadata,
};
use crate::stream::{ChoiceDelta, Frame, FrameEvent, FrameParser, FrameUpdate, decode_frame};
use crate::types::{
    ChatCompletionRequest, ChatCompletionResponse, Choice, FinishReason, Message, Role, Usage, unix_now,
};

// -- Outbound: canonical request -> Google wire format --

/// Build the request body
///
/// Google names the assistant role `model` and carries system text
/// separately as `systemInstruction`.
pub fn build_request(request: &ChatCompletionRequest) -> GoogleRequest {
    let params = &request.params;

    let generation_config = GoogleGenerationConfig {
        temperature: params.temperature,
        top_p: params.top_p,
        max_output_tokens: params.max_tokens,
        stop_sequences: params.stop.clone(),
        candidate_count: params.n,
    };
    let has_config = generation_config.temperature.is_some()
        || generation_config.top_p.is_some()
        || generation_config.max_output_tokens.is_some()
        || generation_config.stop_sequences.is_some()
        || generation_config.candidate_count.is_some();

    GoogleRequest {
        contents: request
            .conversation()
            .map(|m| GoogleContent {
                role: Some(if m.role == Role::Assistant { "model" } else { "user" }.to_owned()),
                parts: vec![text_part(&m.content)],
            })
            .collect(),
        system_instruction: request.system_prompt().map(|text| GoogleContent {
            role: None,
            parts: vec![text_part(&text)],
        }),
        generation_config: has_config.then_some(generation_config),
    }
}

fn text_part(text: &str) -> GooglePart {
    GooglePart {
        text: Some(text.to_owned()),
        thought: None,
    }
}

// -- Inbound: Google wire format -> canonical types --

impl From<GoogleResponse> for ChatCompletionResponse {
    fn from(resp: GoogleResponse) -> Self {
        let choices = resp
            .candidates
            .iter()
            .zip(0u32..)
            .map(|(candidate, position)| Choice {
                index: candidate_index(candidate, position),
                message: Message::assistant(candidate.text()),
                finish_reason: candidate
                    .finish_reason
                    .as_deref()
                    .map_or(FinishReason::Stop, parse_finish_reason),
            })
            .collect();

        Self {
            id: resp
                .response_id
                .unwrap_or_else(|| format!("chatcmpl-{}", uuid::Uuid::new_v4().simple())),
            object: Self::OBJECT.to_owned(),
            created: unix_now(),
            model: resp.model_version.unwrap_or_default(),
            choices,
            usage: resp.usage_metadata.map(usage).unwrap_or_default(),
        }
    }
}

/// Parse a one-shot response body
///
/// # Errors
///
/// Returns `LlmError::Communication` if the body is not a valid response,
/// or `LlmError::ContentBlocked` if the prompt was rejected outright
pub fn parse_response(provider: &str, body: &[u8]) -> Result<ChatCompletionResponse, LlmError> {
    let response: GoogleResponse = serde_json::from_slice(body)
        .map_err(|e| LlmError::Communication(format!("failed to parse {provider} response: {e}")))?;

    if let Some(reason) = prompt_block(&response) {
        return Err(LlmError::ContentBlocked { reason });
    }

    Ok(response.into())
}

pub fn parse_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "STOP" => FinishReason::Stop,
        "MAX_TOKENS" => FinishReason::Length,
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" => FinishReason::ContentFilter,
        "MALFORMED_FUNCTION_CALL" => FinishReason::ToolCall,
        _ => FinishReason::Unknown,
    }
}

fn usage(meta: GoogleUsageMetadata) -> Usage {
    Usage::new(meta.prompt_token_count, meta.candidates_token_count)
}

fn prompt_block(response: &GoogleResponse) -> Option<String> {
    response
        .prompt_feedback
        .as_ref()
        .and_then(|feedback| feedback.block_reason.clone())
}

fn candidate_index(candidate: &GoogleCandidate, position: u32) -> u32 {
    candidate.index.unwrap_or(position)
}

// -- Streaming --

/// Decoder for `streamGenerateContent?alt=sse` frames
///
/// Every frame is a full `GenerateContentResponse` carrying cumulative
/// usage. There is no end sentinel; the stream ends at EOF.
pub struct GoogleFrameParser {
    provider: String,
}

impl GoogleFrameParser {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
        }
    }
}

impl FrameParser for GoogleFrameParser {
    fn parse(&mut self, frame: &Frame) -> Result<FrameEvent, LlmError> {
        let response: GoogleResponse = decode_frame(&self.provider, &frame.data)?;

        if let Some(reason) = prompt_block(&response) {
            return Err(LlmError::ContentBlocked { reason });
        }

        let mut choices = Vec::with_capacity(response.candidates.len());
        for (candidate, position) in response.candidates.iter().zip(0u32..) {
            let finish_reason = candidate.finish_reason.as_deref().map(parse_finish_reason);

            if finish_reason == Some(FinishReason::ContentFilter) {
                return Err(LlmError::ContentBlocked {
                    reason: candidate.finish_reason.clone().unwrap_or_default(),
                });
            }

            choices.push(ChoiceDelta {
                index: candidate_index(candidate, position),
                role: None,
                content: Some(candidate.text()),
                finish_reason,
            });
        }

        Ok(FrameEvent::Update(FrameUpdate {
            id: response.response_id,
            choices,
            usage: response.usage_metadata.map(usage),
        }))
    }
}
