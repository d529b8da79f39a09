//! Capabilities the chat pipeline consumes from its surroundings.
//!
//! Engine lookup, secret resolution and override sanitizing are passed in
//! explicitly so the pipeline can be exercised with in-memory fakes.

use serde_json::{Map, Value};

use crate::config::EngineConfig;

/// Keyed lookup of configured engines.
pub trait EngineLookup: Send + Sync {
    /// Engine with the given id and kind, if configured.
    fn get(&self, kind: &str, engine_id: &str) -> Option<EngineConfig>;

    /// Engine configured as the default for a kind, if any.
    fn get_default(&self, kind: &str) -> Option<EngineConfig>;
}

/// Resolves a named secret (an environment variable name) to its value.
pub trait SecretResolver: Send + Sync {
    fn resolve_api_key(&self, env_name: &str) -> Option<String>;
}

/// Reduces client-supplied overrides to the subset safe to forward.
pub trait ConfigSanitizer: Send + Sync {
    fn sanitize(&self, overrides: &Map<String, Value>) -> Map<String, Value>;
}

/// Secrets read from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecrets;

impl SecretResolver for EnvSecrets {
    fn resolve_api_key(&self, env_name: &str) -> Option<String> {
        if env_name.is_empty() {
            return None;
        }
        std::env::var(env_name).ok().filter(|v| !v.is_empty())
    }
}

/// Keys a client may never override: the relay owns the conversation and
/// the stream flag, and endpoint/credential fields must not leak into the
/// provider body.
const RESERVED_KEYS: &[&str] = &[
    "model",
    "messages",
    "stream",
    "api_key",
    "apiKey",
    "base_url",
    "baseUrl",
    "headers",
];

/// Drops [`RESERVED_KEYS`] and forwards everything else unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSanitizer;

impl ConfigSanitizer for DefaultSanitizer {
    fn sanitize(&self, overrides: &Map<String, Value>) -> Map<String, Value> {
        overrides
            .iter()
            .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}
