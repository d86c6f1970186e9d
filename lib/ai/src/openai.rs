//! OpenAI-compatible HTTP backend.
//!
//! Works against any service exposing `/chat/completions` and
//! `/images/generations` in the OpenAI shape (xAI by default). Requests that
//! carry an image are routed to the vision model; structured requests use
//! `response_format: json_schema`, and a reply that is not a JSON object is
//! a parse failure.

use crate::backend::{
    ChatMessage, CompletionEngine, CompletionRequest, CompletionResponse, ImageGenerator,
};
use crate::error::LlmError;
use async_trait::async_trait;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.x.ai/v1";

/// Default chat model.
pub const DEFAULT_CHAT_MODEL: &str = "grok-2-latest";

/// Default image-generation model.
pub const DEFAULT_IMAGE_MODEL: &str = "grok-2-image";

/// Default vision model.
pub const DEFAULT_VISION_MODEL: &str = "grok-2-vision-latest";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Connection settings for an OpenAI-compatible service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAiCompatibleConfig {
    pub base_url: String,
    pub api_key: String,
    pub chat_model: String,
    pub image_model: String,
    pub vision_model: String,
}

impl OpenAiCompatibleConfig {
    /// Creates a configuration with the default endpoint and models.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            vision_model: DEFAULT_VISION_MODEL.to_string(),
        }
    }

    /// Overrides the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct ApiChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat<'a>>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Debug, Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    schema: &'a JsonValue,
    strict: bool,
}

#[derive(Debug, Deserialize)]
struct ApiChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ApiImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    url: Option<String>,
}

/// Client for an OpenAI-compatible service.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    config: OpenAiCompatibleConfig,
}

impl OpenAiCompatibleClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty or the HTTP client cannot
    /// be built.
    pub fn new(config: OpenAiCompatibleConfig) -> Result<Self, Report<LlmError>> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::InvalidConfig {
                reason: "API key is empty".to_string(),
            }
            .into());
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LlmError::InvalidConfig {
                reason: e.to_string(),
            })?;
        Ok(Self { http, config })
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &OpenAiCompatibleConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<String, Report<LlmError>> {
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(LlmError::from)?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::from)?;
        if !status.is_success() {
            warn!(status = status.as_u16(), path, "LLM API returned an error");
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            }
            .into());
        }
        Ok(text)
    }
}

#[async_trait]
impl CompletionEngine for OpenAiCompatibleClient {
    #[instrument(skip(self, request), fields(messages = request.messages.len(), structured = request.output_schema.is_some()))]
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, Report<LlmError>> {
        let model = if request.has_image() {
            &self.config.vision_model
        } else {
            &self.config.chat_model
        };
        let body = ApiChatRequest {
            model,
            messages: &request.messages,
            temperature: request.temperature,
            response_format: request.output_schema.as_ref().map(|schema| ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchemaFormat {
                    name: &schema.name,
                    schema: &schema.schema,
                    strict: true,
                },
            }),
        };

        let text = self.post("chat/completions", &body).await?;
        let parsed: ApiChatResponse =
            serde_json::from_str(&text).map_err(|e| LlmError::ResponseParseFailed {
                reason: e.to_string(),
            })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ResponseParseFailed {
                reason: "response has no choices".to_string(),
            })?
            .message
            .content
            .unwrap_or_default();

        let structured_output = if request.output_schema.is_some() {
            Some(parse_structured(&content)?)
        } else {
            None
        };
        debug!(
            chars = content.len(),
            structured = structured_output.is_some(),
            "completion received"
        );

        Ok(CompletionResponse {
            content,
            structured_output,
            model: parsed.model.unwrap_or_else(|| model.clone()),
        })
    }
}

/// Parses the content of a structured reply, which must be a JSON object.
fn parse_structured(content: &str) -> Result<JsonValue, Report<LlmError>> {
    let value: JsonValue =
        serde_json::from_str(content).map_err(|e| LlmError::ResponseParseFailed {
            reason: format!("structured reply is not JSON: {e}"),
        })?;
    if !value.is_object() {
        return Err(LlmError::ResponseParseFailed {
            reason: "structured reply is not a JSON object".to_string(),
        }
        .into());
    }
    Ok(value)
}

#[async_trait]
impl ImageGenerator for OpenAiCompatibleClient {
    #[instrument(skip(self, prompt))]
    async fn generate_image(&self, prompt: &str) -> Result<String, Report<LlmError>> {
        let body = ApiImageRequest {
            model: &self.config.image_model,
            prompt,
        };
        let text = self.post("images/generations", &body).await?;
        let parsed: ApiImageResponse =
            serde_json::from_str(&text).map_err(|e| LlmError::ResponseParseFailed {
                reason: e.to_string(),
            })?;

        parsed
            .data
            .into_iter()
            .find_map(|image| image.url)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| LlmError::EmptyResponse.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answer::AnswerResult;
    use axum::{Json, Router, http::StatusCode, routing::post};
    use std::sync::{Arc, Mutex};

    type Captured = Arc<Mutex<Vec<JsonValue>>>;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("test server");
        });
        format!("http://{addr}/v1")
    }

    fn client(base_url: String) -> OpenAiCompatibleClient {
        OpenAiCompatibleClient::new(OpenAiCompatibleConfig::new("test-key").with_base_url(base_url))
            .expect("client")
    }

    fn chat_router(reply: JsonValue, captured: Captured) -> Router {
        Router::new().route(
            "/v1/chat/completions",
            post(move |Json(body): Json<JsonValue>| {
                let reply = reply.clone();
                let captured = captured.clone();
                async move {
                    captured.lock().unwrap().push(body);
                    Json(reply)
                }
            }),
        )
    }

    #[test]
    fn empty_api_key_is_rejected() {
        assert!(OpenAiCompatibleClient::new(OpenAiCompatibleConfig::new("  ")).is_err());
    }

    #[tokio::test]
    async fn structured_completion_round_trip() {
        let captured = Captured::default();
        let reply = serde_json::json!({
            "model": "grok-2-latest",
            "choices": [{"message": {"content": "{\"should_respond\":true,\"is_image_request\":false,\"answer\":\"Sunny.\"}"}}]
        });
        let base = serve(chat_router(reply, captured.clone())).await;

        let request = CompletionRequest::new(vec![
            ChatMessage::system("persona"),
            ChatMessage::user("What's the weather?"),
        ])
        .with_output_schema(AnswerResult::output_schema());
        let response = client(base).complete(&request).await.expect("completion");

        assert_eq!(
            AnswerResult::from_response(&response).expect("answer"),
            AnswerResult::text("Sunny.")
        );
        let sent = captured.lock().unwrap()[0].clone();
        assert_eq!(sent["model"], DEFAULT_CHAT_MODEL);
        assert_eq!(sent["response_format"]["type"], "json_schema");
        assert_eq!(sent["messages"][0]["role"], "system");
    }

    async fn complete_structured(content: &str) -> Result<CompletionResponse, Report<LlmError>> {
        let reply = serde_json::json!({"choices": [{"message": {"content": content}}]});
        let base = serve(chat_router(reply, Captured::default())).await;

        let request = CompletionRequest::new(vec![ChatMessage::user("hi")])
            .with_output_schema(AnswerResult::output_schema());
        client(base).complete(&request).await
    }

    #[tokio::test]
    async fn prose_reply_to_structured_request_is_an_error() {
        assert!(complete_structured("just text").await.is_err());
    }

    #[tokio::test]
    async fn truncated_structured_reply_is_an_error() {
        let truncated = r#"{"should_respond": false, "is_image_request": false, "answer": "hm"#;
        assert!(complete_structured(truncated).await.is_err());
    }

    #[tokio::test]
    async fn non_object_structured_reply_is_an_error() {
        assert!(complete_structured("[1, 2, 3]").await.is_err());
    }

    #[tokio::test]
    async fn prose_reply_to_plain_request_is_kept_as_content() {
        let reply = serde_json::json!({"choices": [{"message": {"content": "just text"}}]});
        let base = serve(chat_router(reply, Captured::default())).await;

        let request = CompletionRequest::new(vec![ChatMessage::user("hi")]);
        let response = client(base).complete(&request).await.expect("completion");

        assert!(response.structured_output.is_none());
        assert_eq!(response.content, "just text");
    }

    #[tokio::test]
    async fn image_requests_use_vision_model() {
        let captured = Captured::default();
        let reply = serde_json::json!({"choices": [{"message": {"content": "a cat"}}]});
        let base = serve(chat_router(reply, captured.clone())).await;

        let request = crate::vision::analysis_request(b"jpeg", &muaddib_core::FixedRandom(0.0));
        client(base).complete(&request).await.expect("completion");

        assert_eq!(captured.lock().unwrap()[0]["model"], DEFAULT_VISION_MODEL);
    }

    #[tokio::test]
    async fn empty_choices_are_an_error() {
        let reply = serde_json::json!({"choices": []});
        let base = serve(chat_router(reply, Captured::default())).await;

        let request = CompletionRequest::new(vec![ChatMessage::user("hi")]);
        assert!(client(base).complete(&request).await.is_err());
    }

    #[tokio::test]
    async fn api_errors_are_reported() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "overloaded") }),
        );
        let base = serve(router).await;

        let request = CompletionRequest::new(vec![ChatMessage::user("hi")]);
        let err = client(base).complete(&request).await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn image_generation_returns_first_url() {
        let router = Router::new().route(
            "/v1/images/generations",
            post(|Json(body): Json<JsonValue>| async move {
                assert_eq!(body["model"], DEFAULT_IMAGE_MODEL);
                Json(serde_json::json!({"data": [{"url": "https://img.example/1.png"}]}))
            }),
        );
        let base = serve(router).await;

        let url = client(base).generate_image("a sandworm").await.expect("image");
        assert_eq!(url, "https://img.example/1.png");
    }

    #[tokio::test]
    async fn image_generation_without_urls_fails() {
        let router = Router::new().route(
            "/v1/images/generations",
            post(|| async { Json(serde_json::json!({"data": []})) }),
        );
        let base = serve(router).await;

        assert!(client(base).generate_image("nothing").await.is_err());
    }
}
