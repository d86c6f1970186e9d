//! Completion engine abstraction.
//!
//! The relay talks to text, structured-output, vision and image-generation
//! backends only through [`CompletionEngine`] and [`ImageGenerator`]. Request
//! and message types serialize directly into the OpenAI chat-completions wire
//! shape, which every supported backend accepts.

use crate::error::LlmError;
use async_trait::async_trait;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// System prompt.
    System,
    /// User/human message.
    User,
    /// Assistant/AI message.
    Assistant,
}

/// Level of detail requested for image inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageDetail {
    Low,
    High,
    Auto,
}

/// An image reference inside a multimodal message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    /// `https://` URL or `data:` URL.
    pub url: String,
    pub detail: ImageDetail,
}

/// One part of a multimodal message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Plain text.
    Text { text: String },
    /// An image.
    ImageUrl { image_url: ImageUrl },
}

/// Message content: either plain text or a list of parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// A message in a completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: MessageContent,
}

impl ChatMessage {
    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::text(ChatRole::System, content)
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::text(ChatRole::User, content)
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(ChatRole::Assistant, content)
    }

    /// Creates a text message with an explicit role.
    #[must_use]
    pub fn text(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: MessageContent::Text(content.into()),
        }
    }

    /// Creates a user message carrying an image followed by an instruction.
    #[must_use]
    pub fn user_image(image: ImageUrl, instruction: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: MessageContent::Parts(vec![
                ContentPart::ImageUrl { image_url: image },
                ContentPart::Text {
                    text: instruction.into(),
                },
            ]),
        }
    }

    /// Returns the text of a plain message, or the concatenated text parts.
    #[must_use]
    pub fn text_content(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Returns true if the message carries an image.
    #[must_use]
    pub fn has_image(&self) -> bool {
        matches!(&self.content, MessageContent::Parts(parts)
            if parts.iter().any(|p| matches!(p, ContentPart::ImageUrl { .. })))
    }
}

/// A named JSON schema the backend should constrain its output to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSchema {
    pub name: String,
    pub schema: JsonValue,
}

/// A request to a completion engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Ordered conversation, system prompt first.
    pub messages: Vec<ChatMessage>,
    /// Structured output schema, if any.
    pub output_schema: Option<OutputSchema>,
    /// Temperature for sampling.
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// Creates a free-text request.
    #[must_use]
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            output_schema: None,
            temperature: None,
        }
    }

    /// Requests structured output.
    #[must_use]
    pub fn with_output_schema(mut self, schema: OutputSchema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    /// Sets the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Returns true if any message carries an image.
    #[must_use]
    pub fn has_image(&self) -> bool {
        self.messages.iter().any(ChatMessage::has_image)
    }
}

/// A response from a completion engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// The generated text.
    pub content: String,
    /// Parsed structured output, when a schema was requested and honored.
    pub structured_output: Option<JsonValue>,
    /// Model that generated the response.
    pub model: String,
}

impl CompletionResponse {
    /// Creates a free-text response.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            structured_output: None,
            model: String::new(),
        }
    }

    /// Creates a structured response.
    #[must_use]
    pub fn structured(value: JsonValue) -> Self {
        Self {
            content: value.to_string(),
            structured_output: Some(value),
            model: String::new(),
        }
    }
}

/// A text/structured completion backend.
#[async_trait]
pub trait CompletionEngine: Send + Sync {
    /// Runs one completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable or answers with
    /// something unusable.
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, Report<LlmError>>;
}

/// An image-generation backend.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generates one image and returns its URL.
    ///
    /// # Errors
    ///
    /// Returns an error if generation fails.
    async fn generate_image(&self, prompt: &str) -> Result<String, Report<LlmError>>;
}
