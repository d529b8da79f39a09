//! Chat streaming relay.
//!
//! This module turns a loosely-shaped chat request into a provider request
//! and re-emits the provider's streaming body as normalized SSE frames.
//! Every failure, from a missing engine to a mid-stream disconnect, ends the
//! stream with a single `event: error` frame instead of an HTTP error.

mod capabilities;
mod chat;
mod messages;
mod sse;
mod stream;

pub use capabilities::{ConfigSanitizer, DefaultSanitizer, EngineLookup, EnvSecrets, SecretResolver};
pub use chat::{prepare_chat, run_chat, ChatRequest, ChatSetupError, DEFAULT_ENGINE_ALIAS};
pub use messages::{coerce_messages, ChatMessage};
pub use sse::SseFrame;
pub use stream::{stream_relay, RelayRequest, DEFAULT_CHAT_PATH};
