//! The LINE webhook route.
//!
//! The route verifies the signature, decodes the payload and hands each
//! event to an [`EventSink`]. It answers `OK` before any event is handled.

use crate::error::CallbackError;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::Router;
use muaddib_core::InboundEvent;
use muaddib_integration::line::{SIGNATURE_HEADER, parse_events, verify_signature};
use muaddib_relay::Relay;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

/// Receives decoded events.
pub trait EventSink: Send + Sync {
    /// Accepts an event for handling. Must not block.
    fn dispatch(&self, event: InboundEvent);
}

/// Handles each event on its own task.
pub struct SpawningRelay(pub Arc<Relay>);

impl EventSink for SpawningRelay {
    fn dispatch(&self, event: InboundEvent) {
        let relay = self.0.clone();
        tokio::spawn(async move {
            relay.handle(event).await;
        });
    }
}

/// Shared state for the webhook route.
#[derive(Clone)]
pub struct WebhookState {
    pub channel_secret: Arc<str>,
    pub sink: Arc<dyn EventSink>,
}

/// Builds the application router.
pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/callback", post(callback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Receives a webhook delivery.
pub async fn callback(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, CallbackError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(CallbackError::InvalidSignature)?;
    if !verify_signature(&state.channel_secret, &body, signature) {
        return Err(CallbackError::InvalidSignature);
    }

    let events =
        parse_events(&body).map_err(|report| CallbackError::MalformedPayload(report.to_string()))?;
    if events.is_empty() {
        debug!("webhook delivery carried no handled events");
    } else {
        info!(count = events.len(), "dispatching webhook events");
    }
    for event in events {
        state.sink.dispatch(event);
    }
    Ok("OK")
}
