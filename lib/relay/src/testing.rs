//! In-memory fakes shared by the relay tests.

use async_trait::async_trait;
use muaddib_ai::{
    CompletionEngine, CompletionRequest, CompletionResponse, ImageGenerator, LlmError,
};
use muaddib_core::ChatSource;
use muaddib_integration::{
    ConnectorError, ContentSource, DeliveryGateway, OutboundMessage, ProfileLookup,
};
use rootcause::Report;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Engine that records requests and replays scripted responses.
#[derive(Default)]
pub struct SpyEngine {
    responses: Mutex<VecDeque<Result<CompletionResponse, LlmError>>>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl SpyEngine {
    pub fn answering(response: CompletionResponse) -> Self {
        let engine = Self::default();
        engine.push(Ok(response));
        engine
    }

    pub fn failing(error: LlmError) -> Self {
        let engine = Self::default();
        engine.push(Err(error));
        engine
    }

    pub fn push(&self, response: Result<CompletionResponse, LlmError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> CompletionRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("engine was called")
    }
}

#[async_trait]
impl CompletionEngine for SpyEngine {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, Report<LlmError>> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyResponse))
            .map_err(Into::into)
    }
}

/// Image generator returning a fixed result.
pub struct StubImages {
    result: Result<String, LlmError>,
    pub prompts: Mutex<Vec<String>>,
}

impl StubImages {
    pub fn returning(url: &str) -> Self {
        Self {
            result: Ok(url.to_string()),
            prompts: Mutex::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            result: Err(LlmError::ApiError {
                status: 500,
                body: "boom".to_string(),
            }),
            prompts: Mutex::default(),
        }
    }
}

#[async_trait]
impl ImageGenerator for StubImages {
    async fn generate_image(&self, prompt: &str) -> Result<String, Report<LlmError>> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.result.clone().map_err(Into::into)
    }
}

/// A delivery recorded by [`RecordingGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Reply(String, Vec<OutboundMessage>),
    Push(String, Vec<OutboundMessage>),
}

/// Gateway that records every delivery and can be told to reject replies.
#[derive(Default)]
pub struct RecordingGateway {
    pub sent: Mutex<Vec<Sent>>,
    pub reject_replies: bool,
}

impl RecordingGateway {
    pub fn rejecting_replies() -> Self {
        Self {
            reject_replies: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn pushes(&self) -> Vec<(String, OutboundMessage)> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Push(to, messages) => Some((to, messages)),
                Sent::Reply(..) => None,
            })
            .flat_map(|(to, messages)| messages.into_iter().map(move |m| (to.clone(), m)))
            .collect()
    }

    pub fn replies(&self) -> Vec<OutboundMessage> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Reply(_, messages) => Some(messages),
                Sent::Push(..) => None,
            })
            .flatten()
            .collect()
    }
}

#[async_trait]
impl DeliveryGateway for RecordingGateway {
    async fn reply(
        &self,
        reply_token: &str,
        messages: &[OutboundMessage],
    ) -> Result<(), Report<ConnectorError>> {
        if self.reject_replies {
            return Err(ConnectorError::ApiError {
                status: 400,
                body: "Invalid reply token".to_string(),
            }
            .into());
        }
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Reply(reply_token.to_string(), messages.to_vec()));
        Ok(())
    }

    async fn push(
        &self,
        target: &str,
        messages: &[OutboundMessage],
    ) -> Result<(), Report<ConnectorError>> {
        self.sent
            .lock()
            .unwrap()
            .push(Sent::Push(target.to_string(), messages.to_vec()));
        Ok(())
    }
}

/// Profile lookup with a fixed answer; `None` simulates an outage.
pub struct StaticProfiles(pub Option<String>);

#[async_trait]
impl ProfileLookup for StaticProfiles {
    async fn display_name(
        &self,
        _source: &ChatSource,
    ) -> Result<Option<String>, Report<ConnectorError>> {
        match &self.0 {
            Some(name) => Ok(Some(name.clone())),
            None => Err(ConnectorError::Timeout.into()),
        }
    }
}

/// Content source with fixed bytes; `None` simulates a failed download.
pub struct StaticContent(pub Option<Vec<u8>>);

#[async_trait]
impl ContentSource for StaticContent {
    async fn message_content(&self, _message_id: &str) -> Result<Vec<u8>, Report<ConnectorError>> {
        self.0.clone().ok_or_else(|| {
            ConnectorError::ApiError {
                status: 404,
                body: "Not found".to_string(),
            }
            .into()
        })
    }
}
