//! Provider request and result types.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Provider API key as submitted by the settings UI.
///
/// Debug output is redacted; the raw value is only reachable through
/// [`ApiKey::expose_secret`].
#[derive(Clone, Deserialize)]
#[serde(from = "String")]
pub struct ApiKey(SecretString);

impl ApiKey {
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }
}

impl From<String> for ApiKey {
    fn from(key: String) -> Self {
        ApiKey(SecretString::from(key))
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// A provider instance as submitted by the settings UI.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Provider identifier, selects the family
    #[serde(alias = "provider_id")]
    pub provider_id: String,
    #[serde(default, alias = "base_url")]
    pub base_url: Option<String>,
    #[serde(default, alias = "api_key")]
    pub api_key: Option<ApiKey>,
    /// Provider-specific fields (e.g., `bot_id`)
    #[serde(default)]
    pub extra: HashMap<String, String>,
}

impl ProviderConfig {
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(ApiKey::from(api_key.into()));
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Base URL if present and non-empty.
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref().filter(|url| !url.is_empty())
    }

    /// API key if present and non-empty.
    pub fn api_key(&self) -> Option<&ApiKey> {
        self.api_key.as_ref().filter(|key| !key.is_empty())
    }

    /// Extra field if present and non-empty.
    pub fn extra(&self, field: &str) -> Option<&str> {
        self.extra
            .get(field)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// Outcome of validating a provider configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ProviderValidation {
    pub fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// A model offered by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Value sent back to the provider
    pub id: String,
    /// Display-only label
    pub label: String,
}

impl ModelEntry {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// A voice offered by a speech provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceEntry {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
