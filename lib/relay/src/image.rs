//! The image-message pipeline.
//!
//! Received images are kept briefly on disk and described by the vision
//! model in one of several critic voices. Image analysis never touches
//! conversation memory.

use crate::policy::ResponsePolicy;
use muaddib_ai::{ANALYSIS_FALLBACK, CompletionEngine, analysis_request};
use muaddib_core::{ChatSource, RandomSource};
use muaddib_integration::{ContentSource, DeliveryGateway, ImageStore, OutboundMessage};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Reply sent when the image cannot be downloaded.
pub const CONTENT_FAILED_TEXT: &str = "抱歉，無法處理此圖片。";

/// Notice pushed before the analysis starts.
pub const ANALYZING_TEXT: &str = "正在分析圖片中...";

/// What happened to an image message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOutcome {
    /// The chat is not on the allow-list.
    NotAllowed,
    /// The image could not be downloaded.
    DownloadFailed,
    /// An analysis, or the analysis apology, was pushed.
    Analyzed { fallback: bool },
}

/// Downloads, stores and describes received images.
pub struct ImageAnalysisHandler {
    policy: Arc<ResponsePolicy>,
    content: Arc<dyn ContentSource>,
    store: ImageStore,
    engine: Arc<dyn CompletionEngine>,
    delivery: Arc<dyn DeliveryGateway>,
    random: Arc<dyn RandomSource>,
}

impl ImageAnalysisHandler {
    #[must_use]
    pub fn new(
        policy: Arc<ResponsePolicy>,
        content: Arc<dyn ContentSource>,
        store: ImageStore,
        engine: Arc<dyn CompletionEngine>,
        delivery: Arc<dyn DeliveryGateway>,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            policy,
            content,
            store,
            engine,
            delivery,
            random,
        }
    }

    /// Handles one image message.
    #[instrument(skip_all, fields(channel = source.channel_id(), message_id = message_id))]
    pub async fn handle_image(
        &self,
        source: &ChatSource,
        reply_token: Option<&str>,
        message_id: &str,
    ) -> ImageOutcome {
        if !self.policy.is_allowed(source) {
            info!("ignoring image from chat outside the allow-list");
            return ImageOutcome::NotAllowed;
        }

        let bytes = match self.content.message_content(message_id).await {
            Ok(bytes) => bytes,
            Err(report) => {
                error!(error = %report, "failed to download image");
                if let Some(token) = reply_token {
                    if let Err(report) = self
                        .delivery
                        .reply(token, &[OutboundMessage::text(CONTENT_FAILED_TEXT)])
                        .await
                    {
                        warn!(error = %report, "reply failed");
                    }
                }
                return ImageOutcome::DownloadFailed;
            }
        };

        let target = source.push_target();
        self.push(target, ANALYZING_TEXT).await;

        match self.store.store(target, &bytes).await {
            Ok(path) => debug!(path = %path.display(), "image kept for analysis"),
            Err(report) => warn!(error = %report, "failed to store image"),
        }

        let request = analysis_request(&bytes, self.random.as_ref());
        let analysis = match self.engine.complete(&request).await {
            Ok(response) if !response.content.trim().is_empty() => Some(response.content),
            Ok(_) => {
                error!("vision model returned an empty analysis");
                None
            }
            Err(report) => {
                error!(error = %report, "image analysis failed");
                None
            }
        };

        let fallback = analysis.is_none();
        let text = analysis.unwrap_or_else(|| ANALYSIS_FALLBACK.to_string());
        self.push(target, &text).await;
        ImageOutcome::Analyzed { fallback }
    }

    async fn push(&self, target: &str, text: &str) {
        if let Err(report) = self
            .delivery
            .push(target, &[OutboundMessage::text(text)])
            .await
        {
            error!(error = %report, target, "push failed");
        }
    }
}
