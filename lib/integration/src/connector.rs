//! Connector traits and outbound message types.
//!
//! The relay reaches the messaging platform only through these traits, so
//! tests can substitute recording fakes and another platform can be added
//! without touching the decision logic.

use crate::error::ConnectorError;
use async_trait::async_trait;
use muaddib_core::ChatSource;
use rootcause::Report;
use serde::{Deserialize, Serialize};

/// A message sent to a chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Plain text.
    Text { text: String },
    /// An image hosted at a public URL.
    Image {
        original_url: String,
        preview_url: String,
    },
}

impl OutboundMessage {
    /// Creates a text message.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Creates an image message whose preview is the original itself.
    #[must_use]
    pub fn image(url: impl Into<String>) -> Self {
        let url = url.into();
        Self::Image {
            original_url: url.clone(),
            preview_url: url,
        }
    }
}

/// Delivers messages to chats.
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    /// Answers an inbound event through its one-shot reply token.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform rejects the reply (for example
    /// because the token was already used or has expired).
    async fn reply(
        &self,
        reply_token: &str,
        messages: &[OutboundMessage],
    ) -> Result<(), Report<ConnectorError>>;

    /// Sends messages to a user, group or room at any time.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform rejects the push.
    async fn push(&self, target: &str, messages: &[OutboundMessage])
    -> Result<(), Report<ConnectorError>>;
}

/// Looks up how a speaker presents themselves.
#[async_trait]
pub trait ProfileLookup: Send + Sync {
    /// Returns the speaker's display name, or `None` if the platform withheld
    /// the speaker.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile cannot be fetched.
    async fn display_name(
        &self,
        source: &ChatSource,
    ) -> Result<Option<String>, Report<ConnectorError>>;
}

/// Fetches the binary content of received messages.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Downloads the content of a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be downloaded.
    async fn message_content(&self, message_id: &str) -> Result<Vec<u8>, Report<ConnectorError>>;
}
