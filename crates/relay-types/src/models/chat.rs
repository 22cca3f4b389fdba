//! Conversation inputs for a generation request.

use serde::{Deserialize, Serialize};

/// Author of a history turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// One prior turn of the conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Model, content: content.into() }
    }
}

/// Image attached inline to the current turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageData {
    pub mime_type: String,
    /// Base64 payload, without a `data:` prefix
    pub data: String,
}

/// Document previously uploaded through the file API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentData {
    pub mime_type: String,
    pub file_uri: String,
}

/// Everything the relay needs to run one logical generation request.
///
/// Images and documents belong to the current turn only; history turns
/// carry text.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamRequest {
    #[serde(default)]
    pub prompt: String,
    /// Requested model; `None` or empty resolves to the default model
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    #[serde(default)]
    pub images: Vec<ImageData>,
    #[serde(default)]
    pub documents: Vec<DocumentData>,
}

impl StreamRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), ..Self::default() }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Requested model name, treating an empty string as unspecified.
    pub fn requested_model(&self) -> Option<&str> {
        self.model.as_deref().map(str::trim).filter(|m| !m.is_empty())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_requested_model_treats_blank_as_unspecified() {
        assert_eq!(StreamRequest::new("hi").requested_model(), None);
        assert_eq!(StreamRequest::new("hi").with_model("  ").requested_model(), None);
        assert_eq!(
            StreamRequest::new("hi").with_model("gemini-pro").requested_model(),
            Some("gemini-pro")
        );
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let req: StreamRequest = serde_json::from_str(r#"{"prompt":"hello"}"#).unwrap();
        assert_eq!(req.prompt, "hello");
        assert!(req.history.is_empty());
        assert!(req.model.is_none());

        let msg: ChatMessage = serde_json::from_str(r#"{"role":"model","content":"x"}"#).unwrap();
        assert_eq!(msg.role, ChatRole::Model);
    }
}
