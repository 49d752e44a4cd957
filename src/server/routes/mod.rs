//! HTTP Routes

pub mod health;
pub mod tts;
