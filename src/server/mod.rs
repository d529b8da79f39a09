//! HTTP server module.
//!
//! This module exposes the relay over HTTP: the streaming chat endpoint,
//! engine discovery, and the provider validation and model-listing calls
//! used by the settings UI.

mod app;
mod handlers;

pub use app::{create_router, run_server, AppState};
pub use handlers::EngineDesc;
