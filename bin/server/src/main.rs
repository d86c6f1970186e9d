use muaddib_server::app::{self, spawn_session_cleanup};
use muaddib_server::config::ServerConfig;
use muaddib_server::webhook::{SpawningRelay, WebhookState, router};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = ServerConfig::from_env().expect("failed to load configuration");
    tracing::info!("Loaded configuration");

    let services = app::build(&config)
        .await
        .expect("failed to initialize relay");

    spawn_session_cleanup(
        services.sessions.clone(),
        Duration::from_secs(config.session.cleanup_interval_seconds.max(1)),
    );

    let state = WebhookState {
        channel_secret: Arc::from(config.line_channel_secret.as_str()),
        sink: Arc::new(SpawningRelay(services.relay)),
    };
    let routes = router(state);

    let listener = app::bind(&config.server.addr)
        .await
        .expect("failed to bind to address");

    tracing::info!("listening on http://{}", config.server.addr);

    app::serve(listener, routes, shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
