//! Conversion between canonical types and Ollama `/api/chat` format

use switchboard_core::ErrorKind;

use crate::error::LlmError;
use crate::protocol::ollama::{OllamaMessage, OllamaOptions, OllamaRequest, OllamaResponse};
use crate::stream::{ChoiceDelta, Frame, FrameEvent, FrameParser, FrameUpdate, decode_frame};
use crate::types::{
    ChatCompletionRequest, ChatCompletionResponse, Choice, FinishReason, Message, Role, Usage, unix_now,
};

// -- Outbound: canonical request -> Ollama wire format --

pub fn build_request(request: &ChatCompletionRequest, model_id: &str, stream: bool) -> OllamaRequest {
    let params = &request.params;

    let options = (params.temperature.is_some()
        || params.top_p.is_some()
        || params.max_tokens.is_some()
        || params.stop.is_some())
    .then(|| OllamaOptions {
        temperature: params.temperature,
        top_p: params.top_p,
        num_predict: params.max_tokens,
        stop: params.stop.clone(),
    });

    OllamaRequest {
        model: model_id.to_owned(),
        messages: request
            .messages
            .iter()
            .map(|m| OllamaMessage {
                role: m.role.as_str().to_owned(),
                content: m.content.clone(),
            })
            .collect(),
        stream,
        options,
    }
}

// -- Inbound: Ollama wire format -> canonical types --

impl From<OllamaResponse> for ChatCompletionResponse {
    fn from(resp: OllamaResponse) -> Self {
        let usage = usage(&resp);

        Self {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4().simple()),
            object: Self::OBJECT.to_owned(),
            created: unix_now(),
            choices: vec![Choice {
                index: 0,
                message: Message::assistant(resp.message.map(|m| m.content).unwrap_or_default()),
                finish_reason: parse_done_reason(resp.done_reason.as_deref()),
            }],
            usage,
            model: resp.model,
        }
    }
}

/// Parse a one-shot response body
///
/// # Errors
///
/// Returns `LlmError::Communication` if the body is not a valid response,
/// or a provider error if the server reported a failure in the body
pub fn parse_response(provider: &str, body: &[u8]) -> Result<ChatCompletionResponse, LlmError> {
    let response: OllamaResponse = serde_json::from_slice(body)
        .map_err(|e| LlmError::Communication(format!("failed to parse {provider} response: {e}")))?;

    if let Some(message) = response.error {
        return Err(body_error(message));
    }

    Ok(response.into())
}

pub fn parse_done_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        Some("length") => FinishReason::Length,
        Some("stop" | "") | None => FinishReason::Stop,
        Some(_) => FinishReason::Unknown,
    }
}

fn usage(resp: &OllamaResponse) -> Usage {
    Usage::new(resp.prompt_eval_count.unwrap_or(0), resp.eval_count.unwrap_or(0))
}

/// Error reported in a response body rather than a status
///
/// A model that is still loading or was evicted reports itself this way,
/// so anything mentioning a missing model is not retried.
fn body_error(message: String) -> LlmError {
    let kind = if message.contains("not found") {
        ErrorKind::ModelNotFound
    } else {
        ErrorKind::ServiceUnavailable
    };
    LlmError::provider(kind, message)
}

// -- Streaming --

/// Decoder for newline-delimited `/api/chat` stream lines
///
/// The last line sets `done` and carries token counts.
pub struct OllamaFrameParser {
    provider: String,
    started: bool,
}

impl OllamaFrameParser {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            started: false,
        }
    }
}

impl FrameParser for OllamaFrameParser {
    fn parse(&mut self, frame: &Frame) -> Result<FrameEvent, LlmError> {
        let line: OllamaResponse = decode_frame(&self.provider, &frame.data)?;

        if let Some(message) = line.error {
            return Err(body_error(message));
        }

        let role = (!self.started).then_some(Role::Assistant);
        self.started = true;

        let content = line.message.as_ref().map(|m| m.content.clone());

        if !line.done {
            return Ok(FrameEvent::Update(FrameUpdate {
                choices: vec![ChoiceDelta {
                    role,
                    content,
                    ..ChoiceDelta::default()
                }],
                ..FrameUpdate::default()
            }));
        }

        Ok(FrameEvent::Update(FrameUpdate {
            id: None,
            choices: vec![ChoiceDelta {
                index: 0,
                role,
                content,
                finish_reason: Some(parse_done_reason(line.done_reason.as_deref())),
            }],
            usage: Some(usage(&line)),
        }))
    }
}
