//! Backend protocol profiles
//!
//! Both supported backends run the same task state machine but differ in how
//! they authenticate, how control messages are shaped and how inbound events
//! are named. A [`ProtocolProfile`] hides those differences from the client.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio_tungstenite::tungstenite::handshake::client::Request;

use crate::core::Result;
use crate::protocol::state::ControlEvent;
use crate::protocol::types::{AudioFormat, SynthesisRequest};

/// Which wire protocol a backend speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    /// Model-serving style, bearer token in header (profile A)
    #[default]
    #[serde(alias = "a")]
    Dashscope,
    /// Token-gateway style, token in the URI (profile B)
    #[serde(alias = "b")]
    Nls,
}

impl ProfileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dashscope => "dashscope",
            Self::Nls => "nls",
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prosody and encoding defaults sent with every start message
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceParams {
    /// Output sample rate (Hz)
    pub sample_rate: u32,
    /// Volume, 0-100
    pub volume: u32,
    /// Speed multiplier, 0.5-2.0
    pub rate: f32,
    /// Pitch multiplier, 0.5-2.0
    pub pitch: f32,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            volume: 50,
            rate: 1.0,
            pitch: 1.0,
        }
    }
}

/// An inbound control message after decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundControl {
    /// Task id echoed by the backend, when present
    pub task_id: Option<String>,
    pub event: ControlEvent,
}

/// Wire-level behaviour of one backend
pub trait ProtocolProfile: Send + Sync {
    fn kind(&self) -> ProfileKind;

    /// WebSocket endpoint, without credentials
    fn endpoint(&self) -> &str;

    /// Whether the backend can produce `format`
    fn supports(&self, format: AudioFormat) -> bool;

    /// Handshake request carrying the credential
    fn connect_request(&self, credential: &str) -> Result<Request>;

    /// Start-task message
    fn start_message(&self, task_id: &str, request: &SynthesisRequest) -> Result<String>;

    /// Continue message carrying the whole text
    fn continue_message(&self, task_id: &str, text: &str) -> Result<String>;

    /// Finish-input message
    fn finish_message(&self, task_id: &str) -> Result<String>;

    /// Decode a text frame. Malformed frames return an error the caller logs
    /// and ignores.
    fn parse_event(&self, text: &str) -> serde_json::Result<InboundControl>;
}
