//! Provider compatibility layer.
//!
//! This module decides how an arbitrary provider configuration behaves:
//! - Which family it belongs to (OpenAI-compatible, bot platform, basic)
//! - Whether the configuration is usable, probing OpenAI-compatible
//!   providers live
//! - Which models and voices the provider offers, including known catalog gaps

mod catalog;
mod classify;
pub mod types;
mod validate;

pub use catalog::{
    fetch_models, list_models, list_voices, CatalogError, CatalogQuirk, CATALOG_QUIRKS, CATALOG_TIMEOUT,
};
pub use classify::{classify, BotPlatform, Family, OPENAI_COMPATIBLE_IDS};
pub use types::{ApiKey, ModelEntry, ProviderConfig, ProviderValidation, VoiceEntry};
pub use validate::{validate, validate_basic};
