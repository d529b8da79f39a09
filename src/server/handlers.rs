//! HTTP request handlers.

use std::convert::Infallible;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use serde::Serialize;

use super::app::AppState;
use crate::config::{EngineConfig, LLM_KIND};
use crate::error::Error;
use crate::providers::{self, ProviderConfig};
use crate::relay::{run_chat, ChatRequest, EngineLookup};

/// Public description of an engine. Never includes credentials.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EngineDesc {
    pub id: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

impl From<&EngineConfig> for EngineDesc {
    fn from(engine: &EngineConfig) -> Self {
        Self {
            id: engine.id.clone(),
            model: engine.model.clone(),
            base_url: engine.base_url.clone(),
        }
    }
}

/// Handle POST /llm/engines - relay a chat request as `text/event-stream`.
///
/// Always answers 200; failures arrive as an `event: error` frame.
pub async fn chat_stream(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Response, Error> {
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("chat", request_id = %request_id, engine = %request.engine);

    let frames = span.in_scope(|| {
        run_chat(
            &state.http_client,
            &request,
            state.config.as_ref(),
            state.secrets.as_ref(),
            state.sanitizer.as_ref(),
        )
    });
    let body = frames.map(|frame| Ok::<_, Infallible>(frame.into_bytes()));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(body))
        .map_err(|e| Error::Internal(e.to_string()))
}

/// Handle GET /llm/engines
pub async fn list_engines(State(state): State<AppState>) -> impl IntoResponse {
    let engines: Vec<EngineDesc> = state
        .config
        .engines_of_kind(LLM_KIND)
        .map(EngineDesc::from)
        .collect();

    Json(serde_json::json!({ "engines": engines }))
}

/// Handle GET /llm/engines/default
pub async fn default_engine(State(state): State<AppState>) -> impl IntoResponse {
    let engine = state
        .config
        .get_default(LLM_KIND)
        .map(|engine| EngineDesc::from(&engine));

    Json(serde_json::json!({ "engine": engine }))
}

/// Handle POST /providers/validate
pub async fn validate_provider(
    State(state): State<AppState>,
    Json(config): Json<ProviderConfig>,
) -> impl IntoResponse {
    Json(providers::validate(&state.http_client, &config).await)
}

/// Handle POST /providers/models
pub async fn list_provider_models(
    State(state): State<AppState>,
    Json(config): Json<ProviderConfig>,
) -> Result<Json<serde_json::Value>, Error> {
    let models = providers::list_models(&state.http_client, &config)
        .await
        .map_err(|e| {
            tracing::warn!(provider = %config.provider_id, error = %e, "Model listing failed");
            Error::from(e)
        })?;

    Ok(Json(serde_json::json!({ "models": models })))
}

/// Handle POST /providers/voices
pub async fn list_provider_voices(Json(config): Json<ProviderConfig>) -> impl IntoResponse {
    Json(serde_json::json!({ "voices": providers::list_voices(&config) }))
}

/// Handle GET /health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "whalewhisper-relay"
    }))
}
