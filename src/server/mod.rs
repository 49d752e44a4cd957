//! TTS Server Module
//!
//! HTTP front door over the synthesis pipeline:
//! - `POST /api/tts` synthesizes text and returns a locator for the audio
//! - `GET /health` reports the backend profile and uptime

pub mod config;
pub mod routes;
pub mod server_core;
pub mod types;

pub use config::ServerConfig;
pub use server_core::{create_router, ServerState, TtsServer};
pub use types::*;
