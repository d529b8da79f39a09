//! Model catalog fetching and vendor catalog quirks.

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Url};
use serde_json::Value;

use super::classify::{classify, Family};
use super::types::{ModelEntry, ProviderConfig, VoiceEntry};

/// Timeout for a model-listing call.
pub const CATALOG_TIMEOUT: Duration = Duration::from_secs(15);

/// Catalog fetch errors. The display text is what callers surface.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Base URL is required")]
    MissingBaseUrl,

    #[error("{0}")]
    Http(#[from] reqwest::Error),
}

/// Models a vendor's listing endpoint is known to omit.
#[derive(Debug, Clone, Copy)]
pub struct CatalogQuirk {
    /// Matched as a substring of the base URL's host
    pub host_fragment: &'static str,
    /// `(id, label)` pairs appended when missing
    pub extra: &'static [(&'static str, &'static str)],
}

impl CatalogQuirk {
    fn matches(&self, host: &str) -> bool {
        host.contains(self.host_fragment)
    }

    /// Append missing entries after the fetched ones, deduplicated by id.
    fn apply(&self, models: &mut Vec<ModelEntry>) {
        for (id, label) in self.extra {
            if !models.iter().any(|m| m.id == *id) {
                models.push(ModelEntry::new(*id, *label));
            }
        }
    }
}

/// Registered vendor quirks, evaluated in order after parsing.
pub const CATALOG_QUIRKS: &[CatalogQuirk] = &[
    // Zhipu's /models omits its free-tier text models.
    CatalogQuirk {
        host_fragment: "bigmodel.cn",
        extra: &[
            ("glm-4.7-flash", "glm-4.7-flash (free)"),
            ("glm-4-flash-250414", "glm-4-flash-250414 (free)"),
        ],
    },
];

fn catalog_host(base_url: &str) -> String {
    Url::parse(base_url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| base_url.to_string())
}

fn apply_quirks(quirks: &[CatalogQuirk], base_url: &str, models: &mut Vec<ModelEntry>) {
    let host = catalog_host(base_url);
    for quirk in quirks.iter().filter(|q| q.matches(&host)) {
        tracing::debug!(host = %host, fragment = quirk.host_fragment, "Applying catalog quirk");
        quirk.apply(models);
    }
}

/// Normalize an OpenAI-style `/models` body into catalog entries.
///
/// Anything other than `{"data": [...]}` yields an empty catalog; non-object
/// elements of `data` are skipped.
fn parse_catalog(body: &Value) -> Vec<ModelEntry> {
    let Some(items) = body.get("data").and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(Value::as_object)
        .map(|item| {
            let id = match item.get("id") {
                Some(Value::String(s)) => s.clone(),
                Some(other) if !other.is_null() => other.to_string(),
                _ => "unknown".to_string(),
            };
            ModelEntry::new(id.clone(), id)
        })
        .collect()
}

/// Fetch a provider's model catalog from `GET <base_url>/models`.
///
/// Sends a bearer token when an API key is present. A non-2xx status or any
/// transport failure is an error carrying the `reqwest` error text; a
/// reachable endpoint with an unexpected body yields an empty list.
pub async fn fetch_models(
    client: &Client,
    config: &ProviderConfig,
) -> Result<Vec<ModelEntry>, CatalogError> {
    let base_url = config.base_url().ok_or(CatalogError::MissingBaseUrl)?;
    let url = format!("{}/models", base_url.trim_end_matches('/'));

    let mut request = client.get(&url).timeout(CATALOG_TIMEOUT);
    if let Some(api_key) = config.api_key() {
        request = request.header(AUTHORIZATION, format!("Bearer {}", api_key.expose_secret()));
    }

    let response = request.send().await?.error_for_status()?;
    let body: Value = response.json().await?;

    let mut models = parse_catalog(&body);
    apply_quirks(CATALOG_QUIRKS, base_url, &mut models);

    tracing::debug!(
        provider = %config.provider_id,
        url = %url,
        count = models.len(),
        "Fetched model catalog"
    );
    Ok(models)
}

/// List models for any provider family.
///
/// Only OpenAI-compatible providers expose a catalog; other families
/// return an empty list without touching the network.
pub async fn list_models(
    client: &Client,
    config: &ProviderConfig,
) -> Result<Vec<ModelEntry>, CatalogError> {
    match classify(&config.provider_id) {
        Family::OpenAiCompatible => fetch_models(client, config).await,
        Family::BotStyle(_) | Family::BasicAuth => Ok(Vec::new()),
    }
}

/// List voices for any provider family.
///
/// No family publishes a voice catalog the relay can read, so every
/// provider yields an empty list and clients fall back to their own.
pub fn list_voices(config: &ProviderConfig) -> Vec<VoiceEntry> {
    tracing::debug!(provider = %config.provider_id, "No voice catalog for provider");
    Vec::new()
}
