//! Server Types
//!
//! Request and response bodies of the HTTP front door

use serde::{Deserialize, Serialize};

use crate::protocol::AudioFormat;

/// `POST /api/tts` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsRequest {
    /// Text to synthesize
    pub text: String,

    /// Voice override
    #[serde(default)]
    pub voice: Option<String>,

    /// Model override (profile A)
    #[serde(default)]
    pub model: Option<String>,

    /// Output format override
    #[serde(default)]
    pub format: Option<AudioFormat>,

    /// Per-request API key (profile A)
    #[serde(default)]
    pub apikey: Option<String>,
}

/// `POST /api/tts` response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtsResponse {
    pub success: bool,

    /// Locator of the stored audio
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Characters synthesized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub char_count: Option<usize>,

    /// Failure description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TtsResponse {
    pub fn stored(url: String, char_count: usize) -> Self {
        Self {
            success: true,
            url: Some(url),
            char_count: Some(char_count),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            url: None,
            char_count: None,
            error: Some(error.into()),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Status
    pub status: String,

    /// Service name
    pub service: String,

    /// Version
    pub version: String,

    /// Backend profile
    pub profile: String,

    /// Uptime (seconds)
    pub uptime: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_optional_fields() {
        let req: TtsRequest = serde_json::from_str(r#"{"text":"hi","format":"wav"}"#).unwrap();
        assert_eq!(req.text, "hi");
        assert_eq!(req.format, Some(AudioFormat::Wav));
        assert!(req.voice.is_none() && req.apikey.is_none());
    }

    #[test]
    fn test_response_shapes() {
        let ok = serde_json::to_value(TtsResponse::stored("http://x/a.mp3".into(), 2)).unwrap();
        assert_eq!(ok, serde_json::json!({"success": true, "url": "http://x/a.mp3", "char_count": 2}));

        let failed = serde_json::to_value(TtsResponse::failed("boom")).unwrap();
        assert_eq!(failed, serde_json::json!({"success": false, "error": "boom"}));
    }
}
