//! Server Configuration
//!
//! One backend profile per process, a delivery sink and logging.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::{Result, TtsError};
use crate::protocol::{AudioFormat, ProfileKind, VoiceParams};

/// Longest accepted per-task timeout
pub const MAX_TIMEOUT_SECS: u64 = 3600;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Remote synthesis backend
    #[serde(default)]
    pub backend: BackendConfig,

    /// Where finished audio is delivered
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend configuration
///
/// Unset optional fields fall back to the defaults of the selected profile.
#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Wire protocol
    #[serde(default)]
    pub profile: ProfileKind,

    /// WebSocket endpoint override
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Default model (profile A)
    #[serde(default)]
    pub model: Option<String>,

    /// Default voice
    #[serde(default)]
    pub voice: Option<String>,

    /// Default output format
    #[serde(default)]
    pub format: AudioFormat,

    /// Sample rate (Hz)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Volume (0-100)
    #[serde(default = "default_volume")]
    pub volume: u32,

    /// Speed multiplier (0.5-2.0)
    #[serde(default = "default_multiplier")]
    pub rate: f32,

    /// Pitch multiplier (0.5-2.0)
    #[serde(default = "default_multiplier")]
    pub pitch: f32,

    /// Maximum text length in characters
    #[serde(default)]
    pub max_chars: Option<usize>,

    /// Per-task time budget (seconds)
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// API key (profile A)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Application key (profile B)
    #[serde(default)]
    pub appkey: Option<String>,

    /// Access key id for token exchange (profile B)
    #[serde(default)]
    pub access_key_id: Option<String>,

    /// Access key secret for token exchange (profile B)
    #[serde(default)]
    pub access_key_secret: Option<String>,

    /// Token exchange endpoint override (profile B)
    #[serde(default)]
    pub token_endpoint: Option<String>,

    /// Token exchange region (profile B)
    #[serde(default)]
    pub region: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            profile: ProfileKind::default(),
            endpoint: None,
            model: None,
            voice: None,
            format: AudioFormat::default(),
            sample_rate: default_sample_rate(),
            volume: default_volume(),
            rate: default_multiplier(),
            pitch: default_multiplier(),
            max_chars: None,
            timeout_secs: None,
            api_key: None,
            appkey: None,
            access_key_id: None,
            access_key_secret: None,
            token_endpoint: None,
            region: None,
        }
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let set = |v: &Option<String>| v.as_ref().map(|_| "<set>");
        f.debug_struct("BackendConfig")
            .field("profile", &self.profile)
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("voice", &self.voice)
            .field("format", &self.format)
            .field("max_chars", &self.max_chars)
            .field("timeout_secs", &self.timeout_secs)
            .field("api_key", &set(&self.api_key))
            .field("appkey", &self.appkey)
            .field("access_key_id", &set(&self.access_key_id))
            .field("access_key_secret", &set(&self.access_key_secret))
            .finish_non_exhaustive()
    }
}

impl BackendConfig {
    pub fn max_chars(&self) -> usize {
        self.max_chars.unwrap_or(match self.profile {
            ProfileKind::Dashscope => 5000,
            ProfileKind::Nls => 2000,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(match self.profile {
            ProfileKind::Dashscope => 60,
            ProfileKind::Nls => 30,
        }))
    }

    pub fn voice(&self) -> &str {
        self.voice.as_deref().unwrap_or(match self.profile {
            ProfileKind::Dashscope => "longxiaochun",
            ProfileKind::Nls => "xiaoyun",
        })
    }

    pub fn voice_params(&self) -> VoiceParams {
        VoiceParams {
            sample_rate: self.sample_rate,
            volume: self.volume,
            rate: self.rate,
            pitch: self.pitch,
        }
    }
}

/// Delivery sink kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Local directory
    #[default]
    Local,
    /// HTTP PUT object store
    Http,
}

/// Storage configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub kind: StorageKind,

    /// Output directory (local)
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,

    /// Upload base URL (http)
    #[serde(default)]
    pub base_url: Option<String>,

    /// Prefix of returned locators
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Bearer token for uploads (http)
    #[serde(default)]
    pub bearer: Option<String>,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("kind", &self.kind)
            .field("root", &self.root)
            .field("base_url", &self.base_url)
            .field("public_base_url", &self.public_base_url)
            .field("bearer", &self.bearer.as_ref().map(|_| "<set>"))
            .finish()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::Local,
            root: default_storage_root(),
            base_url: None,
            public_base_url: default_public_base_url(),
            bearer: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Enable access log
    #[serde(default = "default_true")]
    pub access_log: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            access_log: true,
        }
    }
}

/// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

fn default_sample_rate() -> u32 {
    22050
}

fn default_volume() -> u32 {
    50
}

fn default_multiplier() -> f32 {
    1.0
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("audio_out")
}

fn default_public_base_url() -> String {
    "http://localhost:8080/files".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ServerConfig {
    /// Load from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| TtsError::Config {
            message: format!("Failed to read config: {}", e),
            path: Some(path.to_path_buf()),
        })?;
        serde_yaml::from_str(&content).map_err(|e| TtsError::Config {
            message: format!("Failed to parse config: {}", e),
            path: Some(path.to_path_buf()),
        })
    }

    /// Save to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| TtsError::config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| TtsError::Config {
            message: format!("Failed to write config: {}", e),
            path: Some(path.to_path_buf()),
        })
    }

    /// Model-serving backend (profile A)
    pub fn default_dashscope() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            backend: BackendConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }

    /// Token-gateway backend (profile B)
    pub fn default_nls() -> Self {
        Self {
            backend: BackendConfig {
                profile: ProfileKind::Nls,
                sample_rate: 16000,
                ..Default::default()
            },
            ..Self::default_dashscope()
        }
    }

    /// Check values that would only fail later at request time
    pub fn validate(&self) -> Result<()> {
        let b = &self.backend;
        if b.max_chars() == 0 {
            return Err(TtsError::config("backend.max_chars must be positive"));
        }
        if b.timeout().is_zero() {
            return Err(TtsError::config("backend.timeout_secs must be positive"));
        }
        if b.timeout().as_secs() > MAX_TIMEOUT_SECS {
            return Err(TtsError::config(format!(
                "backend.timeout_secs must not exceed {}",
                MAX_TIMEOUT_SECS
            )));
        }
        if b.volume > 100 {
            return Err(TtsError::config("backend.volume must be within 0-100"));
        }
        for (name, value) in [("rate", b.rate), ("pitch", b.pitch)] {
            if !(0.5..=2.0).contains(&value) {
                return Err(TtsError::config(format!("backend.{} must be within 0.5-2.0", name)));
            }
        }
        if b.profile == ProfileKind::Nls {
            if b.appkey.as_deref().unwrap_or_default().is_empty() {
                return Err(TtsError::config("backend.appkey is required for the nls profile"));
            }
            if !matches!(b.format, AudioFormat::Mp3 | AudioFormat::Wav) {
                return Err(TtsError::config(format!(
                    "backend.format {} is not supported by the nls profile",
                    b.format
                )));
            }
        }
        if self.storage.kind == StorageKind::Http && self.storage.base_url.is_none() {
            return Err(TtsError::config("storage.base_url is required for http storage"));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::default_dashscope()
    }
}
