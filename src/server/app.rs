//! HTTP server setup and configuration.

use axum::{
    routing::{get, post},
    Router,
};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::config::Config;
use crate::relay::{ConfigSanitizer, DefaultSanitizer, EnvSecrets, SecretResolver};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub http_client: Client,
    pub config: Arc<Config>,
    pub secrets: Arc<dyn SecretResolver>,
    pub sanitizer: Arc<dyn ConfigSanitizer>,
}

impl AppState {
    /// State backed by the process environment and the default sanitizer.
    pub fn new(config: Config, http_client: Client) -> Self {
        Self {
            http_client,
            config: Arc::new(config),
            secrets: Arc::new(EnvSecrets),
            sanitizer: Arc::new(DefaultSanitizer),
        }
    }
}

/// Create the axum router with all endpoints.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Chat relay and engine discovery
        .route(
            "/llm/engines",
            get(handlers::list_engines).post(handlers::chat_stream),
        )
        .route("/llm/engines/default", get(handlers::default_engine))
        // Provider compatibility layer
        .route("/providers/validate", post(handlers::validate_provider))
        .route("/providers/models", post(handlers::list_provider_models))
        .route("/providers/voices", post(handlers::list_provider_voices))
        .route("/health", get(handlers::health))
        // State and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let listen_addr = config.server.listen.clone();

    // Per-request timeouts come from engine config; only connect is bounded here.
    let http_client = Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()?;

    let app = create_router(AppState::new(config, http_client));

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(address = %listen_addr, "Starting whalewhisper relay");

    axum::serve(listener, app).await?;

    Ok(())
}
