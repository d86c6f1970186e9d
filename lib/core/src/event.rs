//! Platform-neutral model of an inbound chat event.

use crate::id::ChatSource;
use serde::{Deserialize, Serialize};

/// What the user sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventContent {
    /// A text message.
    Text { text: String },
    /// An image; the bytes are fetched separately by message id.
    Image { message_id: String },
}

/// A message event received from the messaging platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Where the message was sent.
    pub source: ChatSource,
    /// One-shot token for the synchronous reply, if the platform issued one.
    pub reply_token: Option<String>,
    pub content: EventContent,
}

impl InboundEvent {
    /// Creates a text event.
    #[must_use]
    pub fn text(
        source: ChatSource,
        reply_token: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            source,
            reply_token: Some(reply_token.into()),
            content: EventContent::Text { text: text.into() },
        }
    }

    /// Creates an image event.
    #[must_use]
    pub fn image(
        source: ChatSource,
        reply_token: impl Into<String>,
        message_id: impl Into<String>,
    ) -> Self {
        Self {
            source,
            reply_token: Some(reply_token.into()),
            content: EventContent::Image {
                message_id: message_id.into(),
            },
        }
    }

    /// Returns the message text for text events.
    #[must_use]
    pub fn text_content(&self) -> Option<&str> {
        match &self.content {
            EventContent::Text { text } => Some(text),
            EventContent::Image { .. } => None,
        }
    }
}
