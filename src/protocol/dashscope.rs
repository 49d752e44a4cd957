//! Model-serving duplex protocol (profile A)
//!
//! Authenticates with `Authorization: bearer <api key>` on the handshake and
//! drives the task with `run-task` / `continue-task` / `finish-task` actions.
//! Inbound events are discriminated by `header.event`.

use serde::{Deserialize, Serialize};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::{HeaderValue, AUTHORIZATION};

use crate::core::{Result, ResultExt, TtsError};
use crate::protocol::profile::{InboundControl, ProfileKind, ProtocolProfile, VoiceParams};
use crate::protocol::state::ControlEvent;
use crate::protocol::types::{AudioFormat, SynthesisRequest};

pub const DEFAULT_ENDPOINT: &str = "wss://dashscope.aliyuncs.com/api-ws/v1/inference/";
pub const DEFAULT_MODEL: &str = "cosyvoice-v1";

const STREAMING_DUPLEX: &str = "duplex";

#[derive(Debug, Serialize)]
struct OutboundHeader<'a> {
    action: &'a str,
    task_id: &'a str,
    streaming: &'a str,
}

#[derive(Debug, Serialize)]
struct Envelope<'a, P> {
    header: OutboundHeader<'a>,
    payload: P,
}

/// Serializes as `{}`; some backends reject a start message without it
#[derive(Debug, Serialize, Default)]
struct EmptyInput {}

#[derive(Debug, Serialize)]
struct RunTaskPayload<'a> {
    task_group: &'a str,
    task: &'a str,
    function: &'a str,
    model: &'a str,
    parameters: Parameters<'a>,
    input: EmptyInput,
}

#[derive(Debug, Serialize)]
struct Parameters<'a> {
    text_type: &'a str,
    voice: &'a str,
    format: &'a str,
    sample_rate: u32,
    volume: u32,
    rate: f32,
    pitch: f32,
}

#[derive(Debug, Serialize)]
struct ContinuePayload<'a> {
    input: TextInput<'a>,
}

#[derive(Debug, Serialize)]
struct TextInput<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct FinishPayload {
    input: EmptyInput,
}

#[derive(Debug, Deserialize)]
struct InboundMessage {
    header: InboundHeader,
}

#[derive(Debug, Deserialize)]
struct InboundHeader {
    event: String,
    #[serde(default)]
    task_id: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
}

/// Profile A
#[derive(Debug, Clone)]
pub struct DashscopeProfile {
    endpoint: String,
    default_model: String,
    params: VoiceParams,
}

impl DashscopeProfile {
    pub fn new(endpoint: impl Into<String>, default_model: impl Into<String>, params: VoiceParams) -> Self {
        Self {
            endpoint: endpoint.into(),
            default_model: default_model.into(),
            params,
        }
    }

    fn encode<P: Serialize>(&self, action: &str, task_id: &str, payload: P) -> Result<String> {
        let envelope = Envelope {
            header: OutboundHeader {
                action,
                task_id,
                streaming: STREAMING_DUPLEX,
            },
            payload,
        };
        serde_json::to_string(&envelope).context("Failed to encode control message")
    }
}

impl Default for DashscopeProfile {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT, DEFAULT_MODEL, VoiceParams::default())
    }
}

impl ProtocolProfile for DashscopeProfile {
    fn kind(&self) -> ProfileKind {
        ProfileKind::Dashscope
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn supports(&self, _format: AudioFormat) -> bool {
        true
    }

    fn connect_request(&self, credential: &str) -> Result<Request> {
        let mut request = self
            .endpoint
            .as_str()
            .into_client_request()
            .map_err(|e| TtsError::config(format!("Invalid endpoint {}: {}", self.endpoint, e)))?;
        let value = HeaderValue::from_str(&format!("bearer {}", credential))
            .map_err(|_| TtsError::credential("API key contains characters not allowed in a header"))?;
        request.headers_mut().insert(AUTHORIZATION, value);
        Ok(request)
    }

    fn start_message(&self, task_id: &str, request: &SynthesisRequest) -> Result<String> {
        let payload = RunTaskPayload {
            task_group: "audio",
            task: "tts",
            function: "SpeechSynthesizer",
            model: request.model().unwrap_or(self.default_model.as_str()),
            parameters: Parameters {
                text_type: "PlainText",
                voice: request.voice(),
                format: request.format().as_str(),
                sample_rate: self.params.sample_rate,
                volume: self.params.volume,
                rate: self.params.rate,
                pitch: self.params.pitch,
            },
            input: EmptyInput::default(),
        };
        self.encode("run-task", task_id, payload)
    }

    fn continue_message(&self, task_id: &str, text: &str) -> Result<String> {
        let payload = ContinuePayload {
            input: TextInput { text },
        };
        self.encode("continue-task", task_id, payload)
    }

    fn finish_message(&self, task_id: &str) -> Result<String> {
        self.encode(
            "finish-task",
            task_id,
            FinishPayload {
                input: EmptyInput::default(),
            },
        )
    }

    fn parse_event(&self, text: &str) -> serde_json::Result<InboundControl> {
        let message: InboundMessage = serde_json::from_str(text)?;
        let header = message.header;
        let event = match header.event.as_str() {
            "task-started" => ControlEvent::Started,
            "result-generated" => ControlEvent::ResultGenerated,
            "task-finished" => ControlEvent::Finished,
            "task-failed" => ControlEvent::Failed {
                code: header.error_code,
                message: header.error_message,
            },
            _ => ControlEvent::Unknown(header.event),
        };
        Ok(InboundControl {
            task_id: header.task_id,
            event,
        })
    }
}
