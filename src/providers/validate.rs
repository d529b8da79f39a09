//! Provider configuration validation.

use reqwest::Client;

use super::catalog::fetch_models;
use super::classify::{classify, Family};
use super::types::{ProviderConfig, ProviderValidation};

/// Field presence check shared by every family.
///
/// The API key is checked before the base URL, so a config missing both
/// always reports the key.
pub fn validate_basic(
    config: &ProviderConfig,
    require_base_url: bool,
    require_api_key: bool,
) -> ProviderValidation {
    if require_api_key && config.api_key().is_none() {
        return ProviderValidation::invalid("Missing API key");
    }
    if require_base_url && config.base_url().is_none() {
        return ProviderValidation::invalid("Missing base URL");
    }
    ProviderValidation::ok()
}

/// Decide whether a provider configuration is usable. Never fails.
///
/// OpenAI-compatible providers are probed live: the model catalog must be
/// reachable with the given credentials, and any probe failure becomes the
/// validation reason.
pub async fn validate(client: &Client, config: &ProviderConfig) -> ProviderValidation {
    let family = classify(&config.provider_id);

    let result = match family {
        Family::BotStyle(platform) => {
            let basic = validate_basic(config, true, true);
            match platform.required_field() {
                Some(field) if basic.valid && config.extra(field).is_none() => {
                    ProviderValidation::invalid(format!(
                        "Missing {} for {}",
                        field,
                        platform.display_name()
                    ))
                }
                _ => basic,
            }
        }
        Family::OpenAiCompatible => {
            let basic = validate_basic(config, true, true);
            if !basic.valid {
                basic
            } else {
                match fetch_models(client, config).await {
                    Ok(_) => ProviderValidation::ok(),
                    Err(e) => ProviderValidation::invalid(e.to_string()),
                }
            }
        }
        Family::BasicAuth => validate_basic(config, false, false),
    };

    tracing::info!(
        provider = %config.provider_id,
        family = ?family,
        valid = result.valid,
        reason = ?result.reason,
        "Validated provider"
    );
    result
}
