//! Assembles the relay from configuration.

use crate::config::ServerConfig;
use crate::error::ServerError;
use axum::Router;
use muaddib_ai::{OpenAiCompatibleClient, OpenAiCompatibleConfig, PersonaSelector};
use muaddib_conversation::SessionStore;
use muaddib_core::{RandomSource, Result, SeededRandom};
use muaddib_integration::{ImageStore, LineClient, LineConfig};
use muaddib_relay::{ImageAnalysisHandler, Relay, ReplyOrchestrator, ResponsePolicy};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Long-lived components shared by the routes and background tasks.
pub struct Services {
    pub relay: Arc<Relay>,
    pub sessions: Arc<SessionStore>,
}

/// Builds every component from `config`.
///
/// # Errors
///
/// Returns an error if a client, the policy or the image directory cannot be
/// set up.
pub async fn build(config: &ServerConfig) -> Result<Services, ServerError> {
    let random: Arc<dyn RandomSource> = Arc::new(SeededRandom::from_entropy());

    let line = Arc::new(
        LineClient::new(LineConfig::new(config.line_channel_access_token.as_str())).map_err(
            |report| ServerError::ComponentInit {
                component: "LINE client",
                reason: report.to_string(),
            },
        )?,
    );

    let mut llm_config = OpenAiCompatibleConfig::new(config.openai_api_key.as_str())
        .with_base_url(config.openai_base_url.as_str());
    llm_config.chat_model.clone_from(&config.models.chat);
    llm_config.image_model.clone_from(&config.models.image);
    llm_config.vision_model.clone_from(&config.models.vision);
    let llm = Arc::new(OpenAiCompatibleClient::new(llm_config).map_err(|report| {
        ServerError::ComponentInit {
            component: "completion client",
            reason: report.to_string(),
        }
    })?);

    let policy = Arc::new(
        ResponsePolicy::new(config.policy(), random.clone()).map_err(|report| {
            ServerError::ComponentInit {
                component: "response policy",
                reason: report.to_string(),
            }
        })?,
    );
    if policy.config().allowed_ids.is_empty() {
        warn!("ALLOWED_CHAT_IDS is empty; every message will be ignored");
    }

    let images = ImageStore::open(&config.images.dir, config.image_max_age())
        .await
        .map_err(|report| ServerError::ComponentInit {
            component: "image store",
            reason: report.to_string(),
        })?;

    let sessions = Arc::new(SessionStore::new(config.sessions()));
    let personas = Arc::new(PersonaSelector::from_settings(
        &config.personas(),
        random.clone(),
    ));

    let replies = ReplyOrchestrator::new(
        sessions.clone(),
        personas,
        policy.clone(),
        llm.clone(),
        llm.clone(),
        line.clone(),
        line.clone(),
    );
    let analysis = ImageAnalysisHandler::new(policy, line.clone(), images, llm, line, random);

    info!(
        allowed = config.allowed_ids().len(),
        chat_model = %config.models.chat,
        "relay assembled"
    );
    Ok(Services {
        relay: Arc::new(Relay::new(replies, analysis)),
        sessions,
    })
}

/// Binds the HTTP listener.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if `addr` is invalid or taken.
pub async fn bind(addr: &str) -> Result<tokio::net::TcpListener, ServerError> {
    tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| {
            ServerError::Bind {
                addr: addr.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
}

/// Serves `router` until `shutdown` resolves.
///
/// # Errors
///
/// Returns [`ServerError::Serve`] if the server stops with an I/O error.
pub async fn serve<F>(
    listener: tokio::net::TcpListener,
    router: Router,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServerError::Serve { reason: e.to_string() }.into())
}

/// Sweeps expired sessions every `interval` until the runtime shuts down.
pub fn spawn_session_cleanup(sessions: Arc<SessionStore>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let removed = sessions.purge_expired();
            if removed > 0 {
                debug!(removed, remaining = sessions.len(), "periodic session cleanup");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use muaddib_conversation::SessionConfig;
    use muaddib_core::{ConversationKey, ManualClock, SourceKind};

    #[tokio::test]
    async fn cleanup_task_purges_expired_sessions() {
        let start = chrono::Utc::now();
        let clock = Arc::new(ManualClock::new(start));
        let sessions = Arc::new(SessionStore::with_clock(
            SessionConfig::default(),
            clock.clone(),
        ));
        let key = ConversationKey::resolve("U1", SourceKind::Individual, None);
        sessions.append_exchange(&key, "hi", "hello").await;
        clock.advance(chrono::Duration::minutes(31));

        spawn_session_cleanup(sessions.clone(), Duration::from_millis(10));
        for _ in 0..100 {
            if sessions.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(sessions.is_empty());
    }

    #[tokio::test]
    async fn bind_failure_is_reported_with_address() {
        let err = bind("not-an-address").await.expect_err("bind should fail");
        assert!(err.to_string().contains("not-an-address"));
    }

    #[tokio::test]
    async fn serve_returns_after_shutdown() {
        let listener = bind("127.0.0.1:0").await.expect("listener");
        serve(listener, Router::new(), async {})
            .await
            .expect("clean shutdown");
    }

    #[tokio::test]
    async fn build_rejects_invalid_policy() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut config: ServerConfig = serde_json::from_value(serde_json::json!({
            "line_channel_access_token": "token",
            "line_channel_secret": "secret",
            "openai_api_key": "key",
            "allowed_chat_ids": "U1",
        }))
        .expect("config");
        config.images.dir = dir.path().join("images");
        config.bot.random_rate = 2.0;

        assert!(build(&config).await.is_err());

        config.bot.random_rate = 0.3;
        let services = build(&config).await.expect("services");
        assert!(services.sessions.is_empty());
        assert!(dir.path().join("images").is_dir());
    }
}
