//! Token-gateway flowing synthesis protocol (profile B)
//!
//! The token travels in the handshake URI. Control messages name themselves
//! in `header.name` and carry the application key.

use serde::{Deserialize, Serialize};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;

use crate::core::{Result, ResultExt, TtsError};
use crate::protocol::ids::new_task_id;
use crate::protocol::profile::{InboundControl, ProfileKind, ProtocolProfile, VoiceParams};
use crate::protocol::state::ControlEvent;
use crate::protocol::types::{AudioFormat, SynthesisRequest};

pub const DEFAULT_ENDPOINT: &str = "wss://nls-gateway-cn-shanghai.aliyuncs.com/ws/v1";

const NAMESPACE: &str = "FlowingSpeechSynthesizer";

#[derive(Debug, Serialize)]
struct OutboundHeader<'a> {
    message_id: String,
    task_id: &'a str,
    namespace: &'a str,
    name: &'a str,
    appkey: &'a str,
}

#[derive(Debug, Serialize)]
struct Envelope<'a, P> {
    header: OutboundHeader<'a>,
    payload: P,
}

#[derive(Debug, Serialize)]
struct StartPayload<'a> {
    voice: &'a str,
    format: &'a str,
    sample_rate: u32,
    volume: u32,
    speech_rate: i32,
    pitch_rate: i32,
}

#[derive(Debug, Serialize)]
struct RunPayload<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize, Default)]
struct StopPayload {}

#[derive(Debug, Deserialize)]
struct InboundMessage {
    header: InboundHeader,
}

#[derive(Debug, Deserialize)]
struct InboundHeader {
    name: String,
    #[serde(default)]
    task_id: Option<String>,
    #[serde(default)]
    status: Option<i64>,
    #[serde(default, alias = "status_message")]
    status_text: Option<String>,
}

/// Profile B
#[derive(Debug, Clone)]
pub struct NlsProfile {
    endpoint: String,
    appkey: String,
    params: VoiceParams,
}

impl NlsProfile {
    pub fn new(endpoint: impl Into<String>, appkey: impl Into<String>, params: VoiceParams) -> Self {
        Self {
            endpoint: endpoint.into(),
            appkey: appkey.into(),
            params,
        }
    }

    fn encode<P: Serialize>(&self, name: &str, task_id: &str, payload: P) -> Result<String> {
        let envelope = Envelope {
            header: OutboundHeader {
                message_id: new_task_id(),
                task_id,
                namespace: NAMESPACE,
                name,
                appkey: &self.appkey,
            },
            payload,
        };
        serde_json::to_string(&envelope).context("Failed to encode control message")
    }
}

/// Map a speed/pitch multiplier onto the gateway's -500..=500 scale.
///
/// 1.0 maps to 0, 2.0 to 500 and 0.5 to -500.
pub fn multiplier_to_rate(multiplier: f32) -> i32 {
    let m = multiplier.clamp(0.5, 2.0);
    let value = if m >= 1.0 {
        (1.0 - 1.0 / m) * 1000.0
    } else {
        (1.0 - 1.0 / m) * 500.0
    };
    (value.round() as i32).clamp(-500, 500)
}

impl ProtocolProfile for NlsProfile {
    fn kind(&self) -> ProfileKind {
        ProfileKind::Nls
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn supports(&self, format: AudioFormat) -> bool {
        matches!(format, AudioFormat::Mp3 | AudioFormat::Wav)
    }

    fn connect_request(&self, credential: &str) -> Result<Request> {
        let separator = if self.endpoint.contains('?') { '&' } else { '?' };
        let url = format!(
            "{}{}token={}",
            self.endpoint,
            separator,
            urlencoding::encode(credential)
        );
        url.into_client_request()
            .map_err(|e| TtsError::config(format!("Invalid endpoint {}: {}", self.endpoint, e)))
    }

    fn start_message(&self, task_id: &str, request: &SynthesisRequest) -> Result<String> {
        let payload = StartPayload {
            voice: request.voice(),
            format: request.format().as_str(),
            sample_rate: self.params.sample_rate,
            volume: self.params.volume.min(100),
            speech_rate: multiplier_to_rate(self.params.rate),
            pitch_rate: multiplier_to_rate(self.params.pitch),
        };
        self.encode("StartSynthesis", task_id, payload)
    }

    fn continue_message(&self, task_id: &str, text: &str) -> Result<String> {
        self.encode("RunSynthesis", task_id, RunPayload { text })
    }

    fn finish_message(&self, task_id: &str) -> Result<String> {
        self.encode("StopSynthesis", task_id, StopPayload::default())
    }

    fn parse_event(&self, text: &str) -> serde_json::Result<InboundControl> {
        let message: InboundMessage = serde_json::from_str(text)?;
        let header = message.header;
        let event = match header.name.as_str() {
            "SynthesisStarted" => ControlEvent::Started,
            "SentenceBegin" | "SentenceSynthesis" | "SentenceEnd" => ControlEvent::ResultGenerated,
            "SynthesisCompleted" => ControlEvent::Finished,
            "TaskFailed" => ControlEvent::Failed {
                code: header.status.map(|s| s.to_string()),
                message: header.status_text,
            },
            _ => ControlEvent::Unknown(header.name),
        };
        Ok(InboundControl {
            task_id: header.task_id,
            event,
        })
    }
}
