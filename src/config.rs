//! Configuration parsing and validation for whalewhisper-relay.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::relay::EngineLookup;

/// Engine kind served by the chat relay.
pub const LLM_KIND: &str = "llm";

/// Root configuration structure.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    /// Engine kind -> id of the engine used for the `"default"` alias.
    pub defaults: HashMap<String, String>,
    pub engines: Vec<EngineConfig>,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:8090")
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_listen() -> String {
    "127.0.0.1:8090".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// How an engine's API key variable name was chosen.
#[derive(Debug, Clone, PartialEq)]
pub enum KeySource {
    /// `api_key_env` was set explicitly in the config file
    Configured(String),
    /// Derived from the engine id by naming convention (holds var name)
    Convention(String),
}

impl KeySource {
    /// Name of the environment variable holding the key.
    pub fn var_name(&self) -> &str {
        match self {
            KeySource::Configured(var) | KeySource::Convention(var) => var,
        }
    }
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Configured(var) => write!(f, "configured ({})", var),
            KeySource::Convention(var) => write!(f, "convention ({})", var),
        }
    }
}

/// A configured engine the chat relay can target.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Engine identifier, unique per kind
    pub id: String,
    /// Engine kind (e.g., "llm")
    pub kind: String,
    /// Provider base URL (e.g., "https://api.openai.com/v1")
    pub base_url: Option<String>,
    /// Model name sent in every request
    pub model: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: String,
    /// Extra HTTP headers sent to the provider
    pub headers: HashMap<String, String>,
    /// Parameters merged into every request body
    pub default_params: serde_json::Map<String, serde_json::Value>,
    /// Logical operation name -> URL path override (e.g., "chat" -> "/v1/chat")
    pub paths: HashMap<String, String>,
    /// Timeout in seconds for a whole provider exchange
    pub timeout: f64,
}

impl EngineConfig {
    /// Timeout as a [`Duration`].
    ///
    /// A value `Duration` cannot hold falls back to the default timeout;
    /// loaded configs never carry one.
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout)
            .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Path override for a logical operation, if configured.
    pub fn path(&self, operation: &str) -> Option<&str> {
        self.paths.get(operation).map(String::as_str)
    }
}

fn default_kind() -> String {
    LLM_KIND.to_string()
}

const DEFAULT_TIMEOUT_SECS: u64 = 60;

fn default_timeout() -> f64 {
    DEFAULT_TIMEOUT_SECS as f64
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment expansion failed for engine '{engine}' ({var}): {message}")]
    EnvVar {
        var: String,
        engine: String,
        message: String,
    },
}

/// Raw engine config deserialized directly from TOML.
/// `base_url` and header values may contain `${VAR}` references not yet expanded.
#[derive(Deserialize)]
pub struct RawEngineConfig {
    id: String,
    #[serde(default = "default_kind")]
    kind: String,
    base_url: Option<String>,
    model: Option<String>,
    api_key_env: Option<String>,
    #[serde(default)]
    headers: HashMap<String, String>,
    #[serde(default)]
    default_params: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    paths: HashMap<String, String>,
    #[serde(default = "default_timeout")]
    timeout: f64,
}

/// Raw configuration deserialized directly from TOML.
#[derive(Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    logging: LoggingConfig,
    #[serde(default)]
    defaults: HashMap<String, String>,
    #[serde(default)]
    engines: Vec<RawEngineConfig>,
}

/// Substitute every `${VAR}` reference in one engine value.
///
/// Values without `${` are returned untouched and never consult `lookup`.
fn expand_value<F>(input: &str, engine_id: &str, lookup: &F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let env_error = |var: &str, message: String| ConfigError::EnvVar {
        var: var.to_string(),
        engine: engine_id.to_string(),
        message,
    };

    let mut expanded = String::with_capacity(input.len());
    let mut rest = input;
    while let Some((literal, tail)) = rest.split_once("${") {
        expanded.push_str(literal);

        let (var, after) = tail
            .split_once('}')
            .ok_or_else(|| env_error("<unclosed>", format!("unclosed '${{' in '{}'", input)))?;
        if var.is_empty() {
            return Err(env_error("", "empty variable name in '${}'".to_string()));
        }
        let value = lookup(var)
            .ok_or_else(|| env_error(var, "variable is not set".to_string()))?;

        expanded.push_str(&value);
        rest = after;
    }
    expanded.push_str(rest);
    Ok(expanded)
}

/// Derive the convention-based API key variable name for an engine.
///
/// - "openai" -> "WHALEWHISPER_OPENAI_API_KEY"
/// - "glm-4" -> "WHALEWHISPER_GLM_4_API_KEY"
/// - "local llm" -> "WHALEWHISPER_LOCAL_LLM_API_KEY"
pub fn convention_env_var_name(engine_id: &str) -> String {
    let upper_snake = engine_id.to_uppercase().replace(['-', ' ', '.'], "_");
    format!("WHALEWHISPER_{}_API_KEY", upper_snake)
}

impl Config {
    /// Load configuration from a TOML file, expanding `${VAR}` references
    /// from the process environment.
    pub fn from_file(path: impl AsRef<Path>) -> Result<(Self, Vec<(String, KeySource)>), ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::parse_str(&content)
    }

    /// Parse configuration from a TOML string using the process environment.
    pub fn parse_str(content: &str) -> Result<(Self, Vec<(String, KeySource)>), ConfigError> {
        Self::parse_str_with(content, |name| std::env::var(name).ok())
    }

    /// Parse configuration from a TOML string with a custom variable lookup.
    pub fn parse_str_with<F>(
        content: &str,
        lookup: F,
    ) -> Result<(Self, Vec<(String, KeySource)>), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw: RawConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
        let (config, key_sources) = Self::from_raw(raw, &lookup)?;
        config.validate()?;
        Ok((config, key_sources))
    }

    /// Convert raw (deserialized) config to final config.
    ///
    /// For each engine:
    /// - `${VAR}` references in `base_url` and header values are expanded
    /// - `api_key_env` falls back to `WHALEWHISPER_<ID>_API_KEY`
    fn from_raw<F>(
        raw: RawConfig,
        lookup: &F,
    ) -> Result<(Self, Vec<(String, KeySource)>), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut engines = Vec::with_capacity(raw.engines.len());
        let mut key_sources = Vec::with_capacity(raw.engines.len());

        for re in raw.engines {
            let base_url = re
                .base_url
                .as_deref()
                .map(|url| expand_value(url, &re.id, lookup))
                .transpose()?;

            let mut headers = HashMap::with_capacity(re.headers.len());
            for (name, value) in &re.headers {
                headers.insert(name.clone(), expand_value(value, &re.id, lookup)?);
            }

            let source = match re.api_key_env {
                Some(var) if !var.is_empty() => KeySource::Configured(var),
                _ => KeySource::Convention(convention_env_var_name(&re.id)),
            };

            engines.push(EngineConfig {
                api_key_env: source.var_name().to_string(),
                id: re.id.clone(),
                kind: re.kind,
                base_url,
                model: re.model,
                headers,
                default_params: re.default_params,
                paths: re.paths,
                timeout: re.timeout,
            });
            key_sources.push((re.id, source));
        }

        let config = Config {
            server: raw.server,
            logging: raw.logging,
            defaults: raw.defaults,
            engines,
        };

        Ok((config, key_sources))
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.engines.is_empty() {
            tracing::warn!("No engines configured - chat requests will be rejected");
        }

        for (i, engine) in self.engines.iter().enumerate() {
            if engine.id.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "Engine #{} has an empty id",
                    i + 1
                )));
            }

            let duplicate = self.engines[..i]
                .iter()
                .any(|other| other.kind == engine.kind && other.id == engine.id);
            if duplicate {
                return Err(ConfigError::Validation(format!(
                    "Duplicate {} engine '{}'",
                    engine.kind, engine.id
                )));
            }

            if engine.timeout <= 0.0 || Duration::try_from_secs_f64(engine.timeout).is_err() {
                return Err(ConfigError::Validation(format!(
                    "Engine '{}' has invalid timeout {}",
                    engine.id, engine.timeout
                )));
            }

            if is_blank(engine.base_url.as_deref()) || is_blank(engine.model.as_deref()) {
                tracing::warn!(
                    engine = %engine.id,
                    "Engine is missing base_url or model - chat requests to it will fail"
                );
            }
        }

        for (kind, id) in &self.defaults {
            if self.get(kind, id).is_none() {
                return Err(ConfigError::Validation(format!(
                    "Default {} engine '{}' is not configured",
                    kind, id
                )));
            }
        }

        Ok(())
    }

    /// All engines of the given kind, in file order.
    pub fn engines_of_kind<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a EngineConfig> {
        self.engines.iter().filter(move |e| e.kind == kind)
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, str::is_empty)
}

impl EngineLookup for Config {
    fn get(&self, kind: &str, engine_id: &str) -> Option<EngineConfig> {
        self.engines
            .iter()
            .find(|e| e.kind == kind && e.id == engine_id)
            .cloned()
    }

    fn get_default(&self, kind: &str) -> Option<EngineConfig> {
        let id = self.defaults.get(kind)?;
        self.get(kind, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
            [server]
            listen = "127.0.0.1:9000"
        "#;

        let (config, key_sources) = Config::parse_str_with(toml, no_env).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:9000");
        assert_eq!(config.logging.level, "info");
        assert!(config.engines.is_empty());
        assert!(key_sources.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [server]
            listen = "0.0.0.0:8090"

            [logging]
            level = "debug"

            [defaults]
            llm = "openai"

            [[engines]]
            id = "openai"
            base_url = "https://api.openai.com/v1"
            model = "gpt-4o-mini"
            api_key_env = "OPENAI_API_KEY"
            timeout = 30
            headers = { "X-Team" = "voice" }
            paths = { chat = "/chat/completions" }

            [engines.default_params]
            temperature = 0.7
            max_tokens = 512
        "#;

        let (config, key_sources) = Config::parse_str_with(toml, no_env).unwrap();
        assert_eq!(config.engines.len(), 1);
        let engine = &config.engines[0];
        assert_eq!(engine.id, "openai");
        assert_eq!(engine.kind, LLM_KIND);
        assert_eq!(engine.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(engine.timeout(), Duration::from_secs(30));
        assert_eq!(engine.headers["X-Team"], "voice");
        assert_eq!(engine.path("chat"), Some("/chat/completions"));
        assert_eq!(engine.default_params["temperature"], 0.7);
        assert_eq!(engine.default_params["max_tokens"], 512);
        assert_eq!(
            key_sources[0].1,
            KeySource::Configured("OPENAI_API_KEY".to_string())
        );

        let default = config.get_default(LLM_KIND).unwrap();
        assert_eq!(default.id, "openai");
    }

    #[test]
    fn test_engine_defaults() {
        let toml = r#"
            [[engines]]
            id = "local-vllm"
            base_url = "http://localhost:8000/v1"
            model = "qwen"
        "#;

        let (config, key_sources) = Config::parse_str_with(toml, no_env).unwrap();
        let engine = &config.engines[0];
        assert_eq!(engine.timeout, 60.0);
        assert!(engine.headers.is_empty());
        assert!(engine.paths.is_empty());
        assert_eq!(engine.api_key_env, "WHALEWHISPER_LOCAL_VLLM_API_KEY");
        assert_eq!(
            key_sources[0].1,
            KeySource::Convention("WHALEWHISPER_LOCAL_VLLM_API_KEY".to_string())
        );
        assert!(config.get_default(LLM_KIND).is_none());
    }

    #[test]
    fn test_lookup_respects_kind() {
        let toml = r#"
            [[engines]]
            id = "shared"
            kind = "tts"
            base_url = "http://localhost:9000"
        "#;

        let (config, _) = Config::parse_str_with(toml, no_env).unwrap();
        assert!(config.get("tts", "shared").is_some());
        assert!(config.get(LLM_KIND, "shared").is_none());
        assert_eq!(config.engines_of_kind(LLM_KIND).count(), 0);
    }

    #[test]
    fn test_duplicate_engine_rejected() {
        let toml = r#"
            [[engines]]
            id = "a"
            [[engines]]
            id = "a"
        "#;

        let err = Config::parse_str_with(toml, no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn test_unknown_default_rejected() {
        let toml = r#"
            [defaults]
            llm = "ghost"
        "#;

        let err = Config::parse_str_with(toml, no_env).unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_non_positive_timeout_rejected() {
        let toml = r#"
            [[engines]]
            id = "a"
            timeout = 0
        "#;

        let err = Config::parse_str_with(toml, no_env).unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn test_overflowing_timeout_rejected() {
        for value in ["1e20", "inf", "nan"] {
            let toml = format!(
                r#"
                [[engines]]
                id = "a"
                timeout = {}
            "#,
                value
            );

            let err = Config::parse_str_with(&toml, no_env).unwrap_err();
            assert!(matches!(err, ConfigError::Validation(_)), "{}: {:?}", value, err);
            assert!(err.to_string().contains("timeout"), "{}", value);
        }
    }

    #[test]
    fn test_unrepresentable_timeout_falls_back_to_default() {
        let (config, _) = Config::parse_str_with("[[engines]]\nid = \"a\"\n", no_env).unwrap();
        let mut engine = config.engines[0].clone();
        engine.timeout = 1e20;
        assert_eq!(engine.timeout(), Duration::from_secs(60));
        engine.timeout = -1.0;
        assert_eq!(engine.timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_base_url_and_headers_expanded() {
        let toml = r#"
            [[engines]]
            id = "gateway"
            base_url = "${SCHEME}://${HOST}/v1"
            model = "m"
            headers = { "X-Org" = "${ORG}" }
        "#;
        let lookup = |name: &str| match name {
            "SCHEME" => Some("https".to_string()),
            "HOST" => Some("llm.example.com".to_string()),
            "ORG" => Some("acme".to_string()),
            _ => None,
        };

        let (config, _) = Config::parse_str_with(toml, lookup).unwrap();
        let engine = &config.engines[0];
        assert_eq!(
            engine.base_url.as_deref(),
            Some("https://llm.example.com/v1")
        );
        assert_eq!(engine.headers["X-Org"], "acme");
    }

    #[test]
    fn test_literal_values_skip_lookup() {
        let toml = r#"
            [[engines]]
            id = "plain"
            base_url = "https://cost$5.example.com/v1"
            headers = { "X-Note" = "$NOT_A_VAR" }
        "#;
        let lookup = |_: &str| -> Option<String> { panic!("lookup should not run") };

        let (config, _) = Config::parse_str_with(toml, lookup).unwrap();
        let engine = &config.engines[0];
        assert_eq!(engine.base_url.as_deref(), Some("https://cost$5.example.com/v1"));
        assert_eq!(engine.headers["X-Note"], "$NOT_A_VAR");
    }

    #[test]
    fn test_malformed_header_reference_names_engine() {
        for (value, needle) in [("${UNCLOSED", "unclosed"), ("${}", "empty")] {
            let toml = format!(
                r#"
                [[engines]]
                id = "voice-gw"
                headers = {{ "X-Org" = "{}" }}
            "#,
                value
            );

            let err = Config::parse_str_with(&toml, no_env).unwrap_err();
            match &err {
                ConfigError::EnvVar { engine, .. } => assert_eq!(engine, "voice-gw"),
                other => panic!("expected EnvVar error, got {:?}", other),
            }
            assert!(err.to_string().to_lowercase().contains(needle), "{}", err);
        }
    }

    #[test]
    fn test_convention_env_var_name() {
        assert_eq!(convention_env_var_name("openai"), "WHALEWHISPER_OPENAI_API_KEY");
        assert_eq!(convention_env_var_name("glm-4"), "WHALEWHISPER_GLM_4_API_KEY");
        assert_eq!(
            convention_env_var_name("my_service"),
            "WHALEWHISPER_MY_SERVICE_API_KEY"
        );
    }
}
