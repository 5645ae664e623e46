use serde::{Deserialize, Serialize};

use super::message::{Message, Role};
use crate::error::LlmError;
use crate::resilience::OperationKind;

/// Parameters controlling text generation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionParams {
    /// Sampling temperature (0.0 to 2.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold (0.0 to 1.0)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Stop sequences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    /// Number of candidates to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
}

/// Canonical chat completion request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    /// Model alias or `provider/model` identifier
    pub model: String,
    /// Conversation messages in order
    pub messages: Vec<Message>,
    /// Generation parameters
    #[serde(default)]
    pub params: CompletionParams,
}

impl ChatCompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            params: CompletionParams::default(),
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: CompletionParams) -> Self {
        self.params = params;
        self
    }

    /// Operation kind used to pick a timeout budget
    pub const fn operation(&self) -> OperationKind {
        OperationKind::Completion
    }

    /// Check protocol invariants shared by every backend
    ///
    /// # Errors
    ///
    /// Returns `LlmError::InvalidRequest` if there is no non-system message,
    /// the trailing message is not user-authored, or a sampling parameter is
    /// out of range.
    pub fn validate(&self) -> Result<(), LlmError> {
        if !self.messages.iter().any(|m| m.role != Role::System) {
            return Err(LlmError::InvalidRequest(
                "request must contain at least one non-system message".to_owned(),
            ));
        }

        if self.messages.last().map(|m| m.role) != Some(Role::User) {
            return Err(LlmError::InvalidRequest("last message must be from the user".to_owned()));
        }

        let params = &self.params;

        if params.temperature.is_some_and(|t| !(0.0..=2.0).contains(&t)) {
            return Err(LlmError::InvalidRequest("temperature must be between 0 and 2".to_owned()));
        }

        if params.top_p.is_some_and(|p| !(0.0..=1.0).contains(&p)) {
            return Err(LlmError::InvalidRequest("top_p must be between 0 and 1".to_owned()));
        }

        if params.max_tokens == Some(0) {
            return Err(LlmError::InvalidRequest("max_tokens must be at least 1".to_owned()));
        }

        if params.n == Some(0) {
            return Err(LlmError::InvalidRequest("n must be at least 1".to_owned()));
        }

        Ok(())
    }

    /// System messages joined into one instruction, for vendors that take it
    /// out of band
    pub fn system_prompt(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        if parts.is_empty() { None } else { Some(parts.join("\n\n")) }
    }

    /// Messages other than system instructions, in order
    pub fn conversation(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.role != Role::System)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(messages: Vec<Message>) -> ChatCompletionRequest {
        ChatCompletionRequest::new("gpt-4o-mini", messages)
    }

    #[test]
    fn trailing_user_message_is_valid() {
        assert!(request(vec![Message::user("hi")]).validate().is_ok());
        assert!(
            request(vec![
                Message::system("be brief"),
                Message::user("hi"),
                Message::assistant("hello"),
                Message::user("again"),
            ])
            .validate()
            .is_ok()
        );
    }

    #[test]
    fn empty_conversation_is_rejected() {
        let err = request(vec![]).validate().unwrap_err();
        assert!(matches!(err, LlmError::InvalidRequest(_)));

        let err = request(vec![Message::system("only instructions")]).validate().unwrap_err();
        assert!(matches!(err, LlmError::InvalidRequest(_)));
    }

    #[test]
    fn trailing_assistant_message_is_rejected() {
        let err = request(vec![Message::user("hi"), Message::assistant("hello")])
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("last message"));
    }

    #[test]
    fn out_of_range_params_are_rejected() {
        let base = request(vec![Message::user("hi")]);

        let hot = base.clone().with_params(CompletionParams {
            temperature: Some(2.5),
            ..CompletionParams::default()
        });
        assert!(hot.validate().is_err());

        let zero = base.with_params(CompletionParams {
            max_tokens: Some(0),
            ..CompletionParams::default()
        });
        assert!(zero.validate().is_err());
    }

    #[test]
    fn system_prompt_joins_system_messages() {
        let req = request(vec![
            Message::system("one"),
            Message::user("hi"),
            Message::system("two"),
            Message::user("there"),
        ]);

        assert_eq!(req.system_prompt().as_deref(), Some("one\n\ntwo"));
        assert_eq!(req.conversation().count(), 2);
        assert!(request(vec![Message::user("hi")]).system_prompt().is_none());
    }
}
