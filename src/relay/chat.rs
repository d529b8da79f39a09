//! Chat request pre-flight and relay entry point.

use futures::stream::{self, BoxStream};
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::capabilities::{ConfigSanitizer, EngineLookup, SecretResolver};
use super::messages::coerce_messages;
use super::sse::SseFrame;
use super::stream::{stream_relay, RelayRequest};
use crate::config::LLM_KIND;

/// Engine id that resolves to the configured default engine.
pub const DEFAULT_ENGINE_ALIAS: &str = "default";

/// A client chat request, before any normalization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    /// Engine id, or [`DEFAULT_ENGINE_ALIAS`]
    #[serde(default)]
    pub engine: String,
    /// Chat input in any shape [`coerce_messages`] accepts
    #[serde(default)]
    pub data: Option<Value>,
    /// Per-request overrides merged into the provider body after sanitizing
    #[serde(default)]
    pub config: Map<String, Value>,
}

/// Pre-flight failures, each surfaced as a single SSE error frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatSetupError {
    #[error("Missing engine id")]
    MissingEngine,

    #[error("LLM engine '{0}' not configured")]
    NotConfigured(String),

    #[error("LLM engine '{0}' missing model")]
    MissingModel(String),

    #[error("Missing chat messages")]
    MissingMessages,
}

/// Resolve the engine, validate it, and build the provider request.
///
/// No network access happens here; every check short-circuits before the
/// relay would open a connection.
pub fn prepare_chat(
    request: &ChatRequest,
    engines: &dyn EngineLookup,
    secrets: &dyn SecretResolver,
    sanitizer: &dyn ConfigSanitizer,
) -> Result<RelayRequest, ChatSetupError> {
    let engine_id = if request.engine == DEFAULT_ENGINE_ALIAS {
        engines
            .get_default(LLM_KIND)
            .map(|engine| engine.id)
            .unwrap_or_default()
    } else {
        request.engine.clone()
    };
    if engine_id.is_empty() {
        return Err(ChatSetupError::MissingEngine);
    }

    let engine = engines
        .get(LLM_KIND, &engine_id)
        .ok_or_else(|| ChatSetupError::NotConfigured(engine_id.clone()))?;
    let base_url = match engine.base_url.as_deref() {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => return Err(ChatSetupError::NotConfigured(engine_id)),
    };
    let model = match engine.model.as_deref() {
        Some(model) if !model.is_empty() => model.to_string(),
        _ => return Err(ChatSetupError::MissingModel(engine_id)),
    };

    let messages = coerce_messages(request.data.as_ref());
    if messages.is_empty() {
        return Err(ChatSetupError::MissingMessages);
    }

    let mut payload = Map::new();
    payload.insert("model".to_string(), Value::String(model));
    payload.insert(
        "messages".to_string(),
        Value::Array(messages.into_iter().map(Value::Object).collect()),
    );
    payload.insert("stream".to_string(), Value::Bool(true));
    payload.extend(engine.default_params.clone());
    payload.extend(sanitizer.sanitize(&request.config));

    // Content-Type, then engine headers, then the bearer token; later wins.
    let mut engine_headers: Vec<(String, String)> = engine.headers.clone().into_iter().collect();
    engine_headers.sort();

    let mut headers = Vec::with_capacity(engine_headers.len() + 2);
    headers.push(("Content-Type".to_string(), "application/json".to_string()));
    headers.extend(engine_headers);
    if let Some(api_key) = secrets.resolve_api_key(&engine.api_key_env) {
        headers.push(("Authorization".to_string(), format!("Bearer {}", api_key)));
    }

    Ok(RelayRequest {
        base_url,
        headers,
        payload: Value::Object(payload),
        timeout: engine.timeout(),
        path: engine.path("chat").map(str::to_string),
    })
}

/// Run a chat request end to end as a stream of SSE frames.
///
/// Setup failures yield a one-frame error stream without any network
/// attempt; otherwise the provider stream is relayed.
pub fn run_chat(
    client: &Client,
    request: &ChatRequest,
    engines: &dyn EngineLookup,
    secrets: &dyn SecretResolver,
    sanitizer: &dyn ConfigSanitizer,
) -> BoxStream<'static, SseFrame> {
    match prepare_chat(request, engines, secrets, sanitizer) {
        Ok(relay) => {
            tracing::info!(
                engine = %request.engine,
                model = ?relay.payload.get("model"),
                "Relaying chat request"
            );
            stream_relay(client, relay).boxed()
        }
        Err(e) => {
            tracing::warn!(engine = %request.engine, error = %e, "Rejected chat request");
            stream::once(async move { SseFrame::Error(e.to_string()) }).boxed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::config::EngineConfig;
    use crate::relay::DefaultSanitizer;
    use serde_json::json;

    struct FakeEngines {
        engines: Vec<EngineConfig>,
        default_id: Option<String>,
    }

    impl EngineLookup for FakeEngines {
        fn get(&self, kind: &str, engine_id: &str) -> Option<EngineConfig> {
            self.engines
                .iter()
                .find(|e| e.kind == kind && e.id == engine_id)
                .cloned()
        }

        fn get_default(&self, kind: &str) -> Option<EngineConfig> {
            self.get(kind, self.default_id.as_deref()?)
        }
    }

    struct FakeSecrets(Option<&'static str>);

    impl SecretResolver for FakeSecrets {
        fn resolve_api_key(&self, env_name: &str) -> Option<String> {
            assert_eq!(env_name, "TEST_KEY");
            self.0.map(str::to_string)
        }
    }

    fn engine(id: &str) -> EngineConfig {
        EngineConfig {
            id: id.to_string(),
            kind: LLM_KIND.to_string(),
            base_url: Some("https://llm.example.com/v1/".to_string()),
            model: Some("test-model".to_string()),
            api_key_env: "TEST_KEY".to_string(),
            headers: HashMap::from([("X-Team".to_string(), "voice".to_string())]),
            default_params: json!({"temperature": 0.7, "max_tokens": 256})
                .as_object()
                .cloned()
                .unwrap(),
            paths: HashMap::new(),
            timeout: 12.5,
        }
    }

    fn engines(list: Vec<EngineConfig>, default_id: Option<&str>) -> FakeEngines {
        FakeEngines {
            engines: list,
            default_id: default_id.map(str::to_string),
        }
    }

    fn chat(engine: &str, data: Value) -> ChatRequest {
        ChatRequest {
            engine: engine.to_string(),
            data: Some(data),
            config: Map::new(),
        }
    }

    fn prepare(
        request: &ChatRequest,
        lookup: &FakeEngines,
    ) -> Result<RelayRequest, ChatSetupError> {
        prepare_chat(request, lookup, &FakeSecrets(Some("sk-test")), &DefaultSanitizer)
    }

    #[test]
    fn default_alias_without_default_is_missing_engine() {
        let lookup = engines(vec![engine("a")], None);
        let err = prepare(&chat("default", json!("hi")), &lookup).unwrap_err();
        assert_eq!(err, ChatSetupError::MissingEngine);
        assert_eq!(err.to_string(), "Missing engine id");
    }

    #[test]
    fn empty_engine_is_missing_engine() {
        let lookup = engines(vec![], None);
        let err = prepare(&chat("", json!("hi")), &lookup).unwrap_err();
        assert_eq!(err, ChatSetupError::MissingEngine);
    }

    #[test]
    fn default_alias_resolves_configured_default() {
        let lookup = engines(vec![engine("a"), engine("b")], Some("b"));
        let relay = prepare(&chat("default", json!("hi")), &lookup).unwrap();
        assert_eq!(relay.url(), "https://llm.example.com/v1/chat/completions");
    }

    #[test]
    fn unknown_engine_is_not_configured() {
        let lookup = engines(vec![engine("a")], None);
        let err = prepare(&chat("ghost", json!("hi")), &lookup).unwrap_err();
        assert_eq!(err.to_string(), "LLM engine 'ghost' not configured");
    }

    #[test]
    fn engine_without_base_url_is_not_configured() {
        let mut e = engine("a");
        e.base_url = Some(String::new());
        let lookup = engines(vec![e], None);
        let err = prepare(&chat("a", json!("hi")), &lookup).unwrap_err();
        assert_eq!(err, ChatSetupError::NotConfigured("a".to_string()));
    }

    #[test]
    fn engine_without_model_is_rejected() {
        let mut e = engine("a");
        e.model = None;
        let lookup = engines(vec![e], None);
        let err = prepare(&chat("a", json!("hi")), &lookup).unwrap_err();
        assert_eq!(err.to_string(), "LLM engine 'a' missing model");
    }

    #[test]
    fn empty_messages_are_rejected() {
        let lookup = engines(vec![engine("a")], None);
        let err = prepare(&chat("a", json!({})), &lookup).unwrap_err();
        assert_eq!(err.to_string(), "Missing chat messages");
    }

    #[test]
    fn payload_merges_defaults_then_overrides() {
        let lookup = engines(vec![engine("a")], None);
        let mut request = chat("a", json!("hello"));
        request.config = json!({"temperature": 0.1, "model": "hijack", "stream": false})
            .as_object()
            .cloned()
            .unwrap();

        let relay = prepare(&request, &lookup).unwrap();
        assert_eq!(
            relay.payload,
            json!({
                "model": "test-model",
                "messages": [{"role": "user", "content": "hello"}],
                "stream": true,
                "temperature": 0.1,
                "max_tokens": 256
            })
        );
        assert_eq!(relay.timeout, std::time::Duration::from_secs_f64(12.5));
    }

    /// Effective value of a header: the last entry with a matching name.
    fn header<'a>(relay: &'a RelayRequest, name: &str) -> Option<&'a str> {
        relay
            .headers
            .iter()
            .rev()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn headers_carry_content_type_extras_and_bearer() {
        let lookup = engines(vec![engine("a")], None);
        let relay = prepare(&chat("a", json!("hello")), &lookup).unwrap();
        assert_eq!(
            relay.headers,
            vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                ("X-Team".to_string(), "voice".to_string()),
                ("Authorization".to_string(), "Bearer sk-test".to_string()),
            ]
        );
    }

    #[test]
    fn resolved_key_overrides_engine_authorization_header() {
        let mut e = engine("a");
        e.headers.insert("authorization".to_string(), "Bearer engine-header".to_string());
        e.headers.insert("content-type".to_string(), "application/x-ndjson".to_string());
        let lookup = engines(vec![e], None);

        for _ in 0..20 {
            let relay = prepare(&chat("a", json!("hello")), &lookup).unwrap();
            assert_eq!(header(&relay, "Authorization"), Some("Bearer sk-test"));
            assert_eq!(header(&relay, "Content-Type"), Some("application/x-ndjson"));
        }
    }

    #[test]
    fn engine_authorization_kept_without_resolved_key() {
        let mut e = engine("a");
        e.headers.insert("authorization".to_string(), "Bearer engine-header".to_string());
        let lookup = engines(vec![e], None);
        let relay = prepare_chat(
            &chat("a", json!("hello")),
            &lookup,
            &FakeSecrets(None),
            &DefaultSanitizer,
        )
        .unwrap();
        assert_eq!(header(&relay, "Authorization"), Some("Bearer engine-header"));
    }

    #[test]
    fn missing_secret_omits_authorization() {
        let lookup = engines(vec![engine("a")], None);
        let relay = prepare_chat(
            &chat("a", json!("hello")),
            &lookup,
            &FakeSecrets(None),
            &DefaultSanitizer,
        )
        .unwrap();
        assert_eq!(header(&relay, "Authorization"), None);
    }

    #[test]
    fn oversized_timeout_does_not_panic() {
        let mut e = engine("a");
        e.timeout = 1e20;
        let lookup = engines(vec![e], None);
        let relay = prepare(&chat("a", json!("hello")), &lookup).unwrap();
        assert_eq!(relay.timeout, std::time::Duration::from_secs(60));
    }

    #[test]
    fn chat_path_override_is_used() {
        let mut e = engine("a");
        e.paths.insert("chat".to_string(), "api/chat".to_string());
        let lookup = engines(vec![e], None);
        let relay = prepare(&chat("a", json!("hello")), &lookup).unwrap();
        assert_eq!(relay.url(), "https://llm.example.com/v1/api/chat");
    }

    #[tokio::test]
    async fn run_chat_setup_failure_is_single_error_frame() {
        let lookup = engines(vec![], None);
        let frames: Vec<String> = run_chat(
            &Client::new(),
            &chat("default", json!("hi")),
            &lookup,
            &FakeSecrets(None),
            &DefaultSanitizer,
        )
        .map(|frame| frame.to_wire())
        .collect()
        .await;

        assert_eq!(
            frames,
            vec!["event: error\ndata: {\"message\": \"Missing engine id\"}\n\n".to_string()]
        );
    }
}
