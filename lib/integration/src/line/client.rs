use crate::connector::{ContentSource, DeliveryGateway, OutboundMessage, ProfileLookup};
use crate::error::ConnectorError;
use async_trait::async_trait;
use muaddib_core::ChatSource;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{instrument, warn};

/// Default Messaging API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.line.me";

/// Default base URL for message content downloads.
pub const DEFAULT_DATA_API_BASE: &str = "https://api-data.line.me";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Connection settings for the LINE Messaging API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineConfig {
    pub channel_access_token: String,
    pub api_base: String,
    pub data_api_base: String,
}

impl LineConfig {
    /// Creates a configuration against the production endpoints.
    #[must_use]
    pub fn new(channel_access_token: impl Into<String>) -> Self {
        Self {
            channel_access_token: channel_access_token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            data_api_base: DEFAULT_DATA_API_BASE.to_string(),
        }
    }

    /// Points both API hosts at `base`.
    #[must_use]
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        let base = base.into();
        self.api_base.clone_from(&base);
        self.data_api_base = base;
        self
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ApiMessage<'a> {
    Text {
        text: &'a str,
    },
    #[serde(rename_all = "camelCase")]
    Image {
        original_content_url: &'a str,
        preview_image_url: &'a str,
    },
}

impl<'a> From<&'a OutboundMessage> for ApiMessage<'a> {
    fn from(message: &'a OutboundMessage) -> Self {
        match message {
            OutboundMessage::Text { text } => Self::Text { text },
            OutboundMessage::Image {
                original_url,
                preview_url,
            } => Self::Image {
                original_content_url: original_url,
                preview_image_url: preview_url,
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: Vec<ApiMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct PushRequest<'a> {
    to: &'a str,
    messages: Vec<ApiMessage<'a>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileResponse {
    display_name: String,
}

/// Client for the LINE Messaging API.
#[derive(Debug, Clone)]
pub struct LineClient {
    http: reqwest::Client,
    config: LineConfig,
}

impl LineClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the access token is empty or the HTTP client
    /// cannot be built.
    pub fn new(config: LineConfig) -> Result<Self, Report<ConnectorError>> {
        if config.channel_access_token.trim().is_empty() {
            return Err(ConnectorError::InvalidConfig {
                reason: "channel access token is empty".to_string(),
            }
            .into());
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ConnectorError::InvalidConfig {
                reason: e.to_string(),
            })?;
        Ok(Self { http, config })
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, Report<ConnectorError>> {
        let response = request
            .bearer_auth(&self.config.channel_access_token)
            .send()
            .await
            .map_err(ConnectorError::from)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), "LINE API returned an error");
        Err(ConnectorError::ApiError {
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        }
        .into())
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.api_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl DeliveryGateway for LineClient {
    #[instrument(skip(self, reply_token, messages), fields(count = messages.len()))]
    async fn reply(
        &self,
        reply_token: &str,
        messages: &[OutboundMessage],
    ) -> Result<(), Report<ConnectorError>> {
        let body = ReplyRequest {
            reply_token,
            messages: messages.iter().map(ApiMessage::from).collect(),
        };
        self.send(self.http.post(self.api_url("v2/bot/message/reply")).json(&body))
            .await?;
        Ok(())
    }

    #[instrument(skip(self, messages), fields(count = messages.len()))]
    async fn push(
        &self,
        target: &str,
        messages: &[OutboundMessage],
    ) -> Result<(), Report<ConnectorError>> {
        let body = PushRequest {
            to: target,
            messages: messages.iter().map(ApiMessage::from).collect(),
        };
        self.send(self.http.post(self.api_url("v2/bot/message/push")).json(&body))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileLookup for LineClient {
    #[instrument(skip(self))]
    async fn display_name(
        &self,
        source: &ChatSource,
    ) -> Result<Option<String>, Report<ConnectorError>> {
        let path = match source {
            ChatSource::User { user_id } => format!("v2/bot/profile/{user_id}"),
            ChatSource::Group {
                group_id,
                user_id: Some(user_id),
            } => format!("v2/bot/group/{group_id}/member/{user_id}"),
            ChatSource::Room {
                room_id,
                user_id: Some(user_id),
            } => format!("v2/bot/room/{room_id}/member/{user_id}"),
            ChatSource::Group { user_id: None, .. } | ChatSource::Room { user_id: None, .. } => {
                return Ok(None);
            }
        };

        let response = self.send(self.http.get(self.api_url(&path))).await?;
        let profile: ProfileResponse =
            response
                .json()
                .await
                .map_err(|e| ConnectorError::ProtocolError {
                    reason: e.to_string(),
                })?;
        Ok(Some(profile.display_name))
    }
}

#[async_trait]
impl ContentSource for LineClient {
    #[instrument(skip(self))]
    async fn message_content(&self, message_id: &str) -> Result<Vec<u8>, Report<ConnectorError>> {
        let url = format!(
            "{}/v2/bot/message/{message_id}/content",
            self.config.data_api_base.trim_end_matches('/')
        );
        let response = self.send(self.http.get(url)).await?;
        let bytes = response.bytes().await.map_err(ConnectorError::from)?;
        Ok(bytes.to_vec())
    }
}
