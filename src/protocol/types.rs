//! Request and result types for one synthesis task

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Audio container requested from the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    Wav,
    Opus,
}

impl AudioFormat {
    /// Name used on the wire and in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Opus => "opus",
        }
    }

    /// File extension for stored objects
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Opus => "ogg",
        }
    }

    /// MIME content type
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::Wav => "audio/wav",
            Self::Opus => "audio/ogg",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mp3" => Ok(Self::Mp3),
            "wav" => Ok(Self::Wav),
            "opus" | "ogg" => Ok(Self::Opus),
            other => Err(format!("unsupported audio format: {}", other)),
        }
    }
}

/// One synthesis request, immutable once built
#[derive(Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    text: String,
    voice: String,
    model: Option<String>,
    format: AudioFormat,
    credential: String,
}

impl SynthesisRequest {
    pub fn new(
        text: impl Into<String>,
        voice: impl Into<String>,
        model: Option<String>,
        format: AudioFormat,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            voice: voice.into(),
            model,
            format,
            credential: credential.into(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn voice(&self) -> &str {
        &self.voice
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn credential(&self) -> &str {
        &self.credential
    }
}

// The credential never ends up in logs.
impl fmt::Debug for SynthesisRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynthesisRequest")
            .field("text_chars", &self.text.chars().count())
            .field("voice", &self.voice)
            .field("model", &self.model)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

/// Audio assembled from every binary frame of a task, in arrival order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AudioResult {
    audio: Vec<u8>,
    chunk_count: usize,
}

impl AudioResult {
    /// Concatenate chunks in the order given
    pub fn from_chunks(chunks: Vec<Bytes>) -> Self {
        let total = chunks.iter().map(Bytes::len).sum();
        let mut audio = Vec::with_capacity(total);
        for chunk in &chunks {
            audio.extend_from_slice(chunk);
        }
        Self {
            audio,
            chunk_count: chunks.len(),
        }
    }

    pub fn audio(&self) -> &[u8] {
        &self.audio
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.audio
    }

    /// Number of binary frames that made up the audio
    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    pub fn len(&self) -> usize {
        self.audio.len()
    }

    pub fn is_empty(&self) -> bool {
        self.audio.is_empty()
    }
}
