//! whalewhisper-relay - Streaming LLM relay for WhaleWhisper
//!
//! This library provides the core of the relay: provider classification,
//! validation and model catalogs, chat message coercion, and the streaming
//! SSE relay, plus the configuration and HTTP surface around them.

pub mod config;
pub mod error;
pub mod providers;
pub mod relay;
pub mod server;

pub use config::Config;
pub use error::{Error, Result};
