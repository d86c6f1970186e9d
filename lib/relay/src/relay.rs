//! Routes inbound events to the text or image pipeline.

use crate::image::{ImageAnalysisHandler, ImageOutcome};
use crate::orchestrator::{ReplyOrchestrator, ReplyOutcome};
use muaddib_core::{EventContent, HandlingId, InboundEvent};
use tracing::{Instrument, info, info_span};

/// What happened to an inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Text(ReplyOutcome),
    Image(ImageOutcome),
}

/// Entry point for inbound events.
pub struct Relay {
    replies: ReplyOrchestrator,
    images: ImageAnalysisHandler,
}

impl Relay {
    #[must_use]
    pub fn new(replies: ReplyOrchestrator, images: ImageAnalysisHandler) -> Self {
        Self { replies, images }
    }

    /// Handles one event under its own correlation id.
    pub async fn handle(&self, event: InboundEvent) -> EventOutcome {
        let handling_id = HandlingId::new();
        let span = info_span!("event", %handling_id, kind = %event.source.kind());
        async move {
            let reply_token = event.reply_token.as_deref();
            let outcome = match &event.content {
                EventContent::Text { text } => EventOutcome::Text(
                    self.replies
                        .handle_text(&event.source, reply_token, text)
                        .await,
                ),
                EventContent::Image { message_id } => EventOutcome::Image(
                    self.images
                        .handle_image(&event.source, reply_token, message_id)
                        .await,
                ),
            };
            info!(?outcome, "event handled");
            outcome
        }
        .instrument(span)
        .await
    }
}
