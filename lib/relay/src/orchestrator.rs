//! The text-message pipeline.
//!
//! One call to [`ReplyOrchestrator::handle_text`] takes a message from the
//! policy decision through the completion call to delivery and the history
//! update. Nothing here fails outward: engine failures become the canned
//! apology and delivery failures are logged and dropped.

use crate::policy::{Decision, ResponsePolicy, SkipReason, Trigger};
use muaddib_ai::{
    AnswerResult, ChatMessage, CompletionEngine, CompletionRequest, ImageGenerator,
    PersonaSelector,
};
use muaddib_conversation::{SessionStore, Turn, TurnRole};
use muaddib_core::{ChatSource, ConversationKey, UNKNOWN_IDENTITY};
use muaddib_integration::{DeliveryGateway, OutboundMessage, ProfileLookup};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Acknowledgment sent through the reply token before the engine is asked.
pub const THINKING_TEXT: &str = "💭 讓我想想...";

/// Notice pushed before an image is generated.
pub const IMAGE_PENDING_TEXT: &str = "正在產生圖片中...";

/// Pushed when image generation fails.
pub const IMAGE_FAILED_TEXT: &str = "抱歉，圖片生成失敗，請稍後再試。";

/// What happened to a text message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The policy ignored the message.
    Skipped(SkipReason),
    /// The help text was sent.
    Help,
    /// A text answer was pushed.
    Answered,
    /// An image was requested; `delivered` is false if generation failed.
    Image { delivered: bool },
    /// The engine judged the message not worth answering.
    Silent,
}

/// Drives a text message from decision to delivery.
pub struct ReplyOrchestrator {
    sessions: Arc<SessionStore>,
    personas: Arc<PersonaSelector>,
    policy: Arc<ResponsePolicy>,
    engine: Arc<dyn CompletionEngine>,
    images: Arc<dyn ImageGenerator>,
    delivery: Arc<dyn DeliveryGateway>,
    profiles: Arc<dyn ProfileLookup>,
}

impl ReplyOrchestrator {
    /// Creates an orchestrator over shared components.
    #[must_use]
    pub fn new(
        sessions: Arc<SessionStore>,
        personas: Arc<PersonaSelector>,
        policy: Arc<ResponsePolicy>,
        engine: Arc<dyn CompletionEngine>,
        images: Arc<dyn ImageGenerator>,
        delivery: Arc<dyn DeliveryGateway>,
        profiles: Arc<dyn ProfileLookup>,
    ) -> Self {
        Self {
            sessions,
            personas,
            policy,
            engine,
            images,
            delivery,
            profiles,
        }
    }

    /// Handles one text message.
    #[instrument(skip_all, fields(channel = source.channel_id(), kind = %source.kind()))]
    pub async fn handle_text(
        &self,
        source: &ChatSource,
        reply_token: Option<&str>,
        text: &str,
    ) -> ReplyOutcome {
        let decision = self.policy.decide(source, text);
        if decision == Decision::Skip(SkipReason::NotAllowed) {
            info!("ignoring message from chat outside the allow-list");
            return ReplyOutcome::Skipped(SkipReason::NotAllowed);
        }

        let (trigger, prompt) = match decision {
            Decision::Skip(reason) => {
                debug!(?reason, "not responding");
                return ReplyOutcome::Skipped(reason);
            }
            Decision::Help => {
                self.reply_best_effort(reply_token, self.policy.help_text()).await;
                return ReplyOutcome::Help;
            }
            Decision::Respond { trigger, prompt } => (trigger, prompt),
        };

        let key = source.conversation_key();
        let identity = self.resolve_identity(source, &key).await;
        info!(?trigger, identity = %identity, "responding");

        self.reply_best_effort(reply_token, THINKING_TEXT).await;

        let persona = self.personas.select(&identity);
        let history = self.sessions.read(&key).await;
        let request = build_request(&persona.prompt, &history, &prompt);
        let answer = self.ask(&request, trigger).await;

        let target = source.push_target();
        let outcome = if answer.is_image_request {
            self.deliver_image(target, &answer.answer).await
        } else if answer.should_respond {
            self.push_best_effort(target, OutboundMessage::text(answer.answer.as_str()))
                .await;
            ReplyOutcome::Answered
        } else {
            debug!("engine judged the message not worth answering");
            ReplyOutcome::Silent
        };

        self.sessions
            .append_exchange(&key, text, answer.answer)
            .await;
        outcome
    }

    /// Returns the speaker's display name, falling back to the last known
    /// name for the conversation and then to the unknown sentinel.
    async fn resolve_identity(&self, source: &ChatSource, key: &ConversationKey) -> String {
        match self.profiles.display_name(source).await {
            Ok(Some(name)) => {
                self.sessions.record_display_name(key, name.as_str()).await;
                name
            }
            Ok(None) => UNKNOWN_IDENTITY.to_string(),
            Err(report) => {
                warn!(error = %report, "profile lookup failed");
                self.sessions
                    .display_name(key)
                    .await
                    .unwrap_or_else(|| UNKNOWN_IDENTITY.to_string())
            }
        }
    }

    async fn ask(&self, request: &CompletionRequest, trigger: Trigger) -> AnswerResult {
        let result = match self.engine.complete(request).await {
            Ok(response) => AnswerResult::from_response(&response),
            Err(report) => Err(report),
        };
        match result {
            Ok(answer) => {
                info!(
                    should_respond = answer.should_respond,
                    is_image_request = answer.is_image_request,
                    "engine answered"
                );
                answer
            }
            Err(report) => {
                error!(error = %report, ?trigger, "completion failed, using fallback answer");
                AnswerResult::fallback()
            }
        }
    }

    async fn deliver_image(&self, target: &str, prompt: &str) -> ReplyOutcome {
        self.push_best_effort(target, OutboundMessage::text(IMAGE_PENDING_TEXT))
            .await;
        match self.images.generate_image(prompt).await {
            Ok(url) => {
                self.push_best_effort(target, OutboundMessage::image(url)).await;
                ReplyOutcome::Image { delivered: true }
            }
            Err(report) => {
                error!(error = %report, "image generation failed");
                self.push_best_effort(target, OutboundMessage::text(IMAGE_FAILED_TEXT))
                    .await;
                ReplyOutcome::Image { delivered: false }
            }
        }
    }

    async fn reply_best_effort(&self, reply_token: Option<&str>, text: &str) {
        let Some(token) = reply_token else {
            debug!("no reply token, skipping synchronous reply");
            return;
        };
        if let Err(report) = self
            .delivery
            .reply(token, &[OutboundMessage::text(text)])
            .await
        {
            warn!(error = %report, "reply failed");
        }
    }

    async fn push_best_effort(&self, target: &str, message: OutboundMessage) {
        if let Err(report) = self.delivery.push(target, &[message]).await {
            error!(error = %report, target, "push failed");
        }
    }
}

/// Builds the structured request: persona, history oldest first, then the
/// new message.
fn build_request(persona_prompt: &str, history: &[Turn], prompt: &str) -> CompletionRequest {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(persona_prompt));
    messages.extend(history.iter().map(|turn| match turn.role() {
        TurnRole::User => ChatMessage::user(turn.content()),
        TurnRole::Assistant => ChatMessage::assistant(turn.content()),
    }));
    messages.push(ChatMessage::user(prompt));
    CompletionRequest::new(messages).with_output_schema(AnswerResult::output_schema())
}
