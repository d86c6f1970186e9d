//! Inbound webhook verification and decoding.

use crate::error::WebhookError;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use muaddib_core::{ChatSource, EventContent, InboundEvent};
use rootcause::Report;
use serde::Deserialize;
use sha2::Sha256;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "x-line-signature";

/// Checks `signature` against `base64(HMAC-SHA256(channel_secret, body))`.
///
/// The comparison is constant-time.
#[must_use]
pub fn verify_signature(channel_secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = STANDARD.decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(channel_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// A webhook delivery.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

/// One webhook event. Only message events are decoded.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WebhookEvent {
    Message(MessageEvent),
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    #[serde(default)]
    pub reply_token: Option<String>,
    pub source: WebhookSource,
    pub message: WebhookMessage,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WebhookSource {
    #[serde(rename_all = "camelCase")]
    User { user_id: String },
    #[serde(rename_all = "camelCase")]
    Group {
        group_id: String,
        #[serde(default)]
        user_id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Room {
        room_id: String,
        #[serde(default)]
        user_id: Option<String>,
    },
}

impl From<WebhookSource> for ChatSource {
    fn from(source: WebhookSource) -> Self {
        match source {
            WebhookSource::User { user_id } => Self::User { user_id },
            WebhookSource::Group { group_id, user_id } => Self::Group { group_id, user_id },
            WebhookSource::Room { room_id, user_id } => Self::Room { room_id, user_id },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WebhookMessage {
    Text { id: String, text: String },
    Image { id: String },
    #[serde(other)]
    Other,
}

impl MessageEvent {
    /// Converts to the platform-neutral event, if the message type is handled.
    #[must_use]
    pub fn into_inbound(self) -> Option<InboundEvent> {
        let content = match self.message {
            WebhookMessage::Text { text, .. } => EventContent::Text { text },
            WebhookMessage::Image { id } => EventContent::Image { message_id: id },
            WebhookMessage::Other => return None,
        };
        Some(InboundEvent {
            source: self.source.into(),
            reply_token: self.reply_token,
            content,
        })
    }
}

/// Decodes a webhook body into the events the relay handles.
///
/// Non-message events and unsupported message types are skipped.
///
/// # Errors
///
/// Returns an error if the body is not a webhook payload.
pub fn parse_events(body: &[u8]) -> Result<Vec<InboundEvent>, Report<WebhookError>> {
    let payload: WebhookPayload =
        serde_json::from_slice(body).map_err(|e| WebhookError::MalformedPayload {
            reason: e.to_string(),
        })?;

    let total = payload.events.len();
    let events: Vec<InboundEvent> = payload
        .events
        .into_iter()
        .filter_map(|event| match event {
            WebhookEvent::Message(message) => message.into_inbound(),
            WebhookEvent::Other => None,
        })
        .collect();
    debug!(total, handled = events.len(), "webhook payload decoded");
    Ok(events)
}
