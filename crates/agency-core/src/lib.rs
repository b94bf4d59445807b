//! Agency Core — deployment harness for a multi-agent chat service.
//!
//! Configuration, store access, schema migrations and the workflow registry
//! live here. There is **no HTTP framework dependency** by default; the HTTP
//! surface is in `agency-server` and the operator commands in `agency-cli`.
//!
//! # Feature Flags
//!
//! - `axum` — Enables `IntoResponse` impl on `ServerError` for use in axum handlers.
//! - `test-util` — Exposes [`llm::ScriptedChatModel`] to other crates' tests.

pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod migrations;
pub mod state;
pub mod workflow;

// Convenience re-exports
pub use config::Settings;
pub use db::Database;
pub use error::ServerError;
pub use state::{AppState, AppStateInner};
