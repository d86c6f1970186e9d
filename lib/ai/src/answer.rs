//! The answer contract between the orchestrator and the completion engine.
//!
//! Whatever the backend returns is normalized into an [`AnswerResult`]:
//! structured output is validated against the expected shape, and plain text
//! from backends without structured output becomes an unconditional answer.

use crate::backend::{CompletionResponse, OutputSchema};
use crate::error::LlmError;
use rootcause::Report;
use serde::{Deserialize, Serialize};

/// Apology delivered when the completion engine fails.
pub const FALLBACK_ANSWER: &str = "抱歉，我在處理回應時遇到了問題，請稍後再試。";

/// Schema name sent with structured requests.
pub const ANSWER_SCHEMA_NAME: &str = "answer";

/// One completion's verdict and text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerResult {
    /// Whether the model judged the message worth a reply.
    #[serde(default)]
    pub should_respond: bool,
    /// Whether the user asked for an image; `answer` is then the image prompt.
    #[serde(default)]
    pub is_image_request: bool,
    /// The reply text, or the image prompt.
    pub answer: String,
}

impl AnswerResult {
    /// The canned result substituted when the engine fails.
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            should_respond: true,
            is_image_request: false,
            answer: FALLBACK_ANSWER.to_string(),
        }
    }

    /// An unconditional text answer.
    #[must_use]
    pub fn text(answer: impl Into<String>) -> Self {
        Self {
            should_respond: true,
            is_image_request: false,
            answer: answer.into(),
        }
    }

    /// Returns the JSON schema the engine is asked to fill.
    #[must_use]
    pub fn output_schema() -> OutputSchema {
        OutputSchema {
            name: ANSWER_SCHEMA_NAME.to_string(),
            schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "should_respond": {
                        "type": "boolean",
                        "description": "True if any holds: the user asks a question or ends with a question mark; \
                                        the user asks for advice, an explanation, an answer or help; \
                                        the user uses an imperative asking the assistant to do something."
                    },
                    "is_image_request": {
                        "type": "boolean",
                        "description": "True if any holds: the user explicitly asks to generate, produce or create a picture; \
                                        the user uses drawing verbs such as draw or paint; \
                                        the user describes a scene they want to see; \
                                        the user mentions a picture or image and implies it should be generated."
                    },
                    "answer": {
                        "type": "string",
                        "description": "The reply in the persona given by the system prompt, consistent with the \
                                        conversation so far. For image requests, a prompt describing the image."
                    }
                },
                "required": ["should_respond", "is_image_request", "answer"],
                "additionalProperties": false
            }),
        }
    }

    /// Normalizes an engine response.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::ResponseParseFailed`] if structured output has the
    /// wrong shape, and [`LlmError::EmptyResponse`] if there is nothing to
    /// deliver.
    pub fn from_response(response: &CompletionResponse) -> Result<Self, Report<LlmError>> {
        let Some(structured) = &response.structured_output else {
            let text = response.content.trim();
            if text.is_empty() {
                return Err(LlmError::EmptyResponse.into());
            }
            return Ok(Self::text(text));
        };

        let result: Self = serde_json::from_value(structured.clone()).map_err(|e| {
            LlmError::ResponseParseFailed {
                reason: e.to_string(),
            }
        })?;

        let needs_text = result.should_respond || result.is_image_request;
        if needs_text && result.answer.trim().is_empty() {
            return Err(LlmError::EmptyResponse.into());
        }
        Ok(result)
    }
}
