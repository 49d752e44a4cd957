//! Synthesis orchestration
//!
//! Validates caller text, resolves a credential, runs one remote task and
//! optionally hands the audio to a [`DeliverySink`]. Nothing here retries;
//! errors from the collaborators bubble up unchanged.

use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::{Result, TtsError};
use crate::credentials::{CachedCredential, CredentialProvider, NlsTokenIssuer, StaticCredential};
use crate::protocol::dashscope::{self, DashscopeProfile};
use crate::protocol::nls::{self, NlsProfile};
use crate::protocol::{AudioFormat, AudioResult, ProfileKind, ProtocolProfile, SynthesisRequest, TaskClient};
use crate::server::config::{ServerConfig, StorageKind};
use crate::storage::{object_key, DeliverySink, HttpPutSink, LocalDirSink};

/// Per-call overrides of the backend defaults
#[derive(Debug, Clone, Default)]
pub struct SynthesisOptions {
    pub voice: Option<String>,
    pub model: Option<String>,
    pub format: Option<AudioFormat>,
    /// Caller-supplied API key; honoured by profile A only
    pub api_key: Option<String>,
}

/// Audio that has been handed to the delivery sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAudio {
    pub url: String,
    pub char_count: usize,
    pub key: String,
    pub bytes: usize,
}

/// Defaults applied when a call leaves a field unset
#[derive(Debug, Clone)]
pub struct SynthesisDefaults {
    pub voice: String,
    pub model: Option<String>,
    pub format: AudioFormat,
}

pub struct SynthesisService {
    client: TaskClient,
    credentials: Arc<dyn CredentialProvider>,
    sink: Arc<dyn DeliverySink>,
    defaults: SynthesisDefaults,
    max_chars: usize,
}

impl SynthesisService {
    pub fn new(
        client: TaskClient,
        credentials: Arc<dyn CredentialProvider>,
        sink: Arc<dyn DeliverySink>,
        defaults: SynthesisDefaults,
        max_chars: usize,
    ) -> Self {
        Self {
            client,
            credentials,
            sink,
            defaults,
            max_chars,
        }
    }

    /// Wire profile, credential provider and sink from configuration
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let backend = &config.backend;

        let (profile, credentials): (Arc<dyn ProtocolProfile>, Arc<dyn CredentialProvider>) =
            match backend.profile {
                ProfileKind::Dashscope => (
                    Arc::new(DashscopeProfile::new(
                        backend.endpoint.as_deref().unwrap_or(dashscope::DEFAULT_ENDPOINT),
                        backend.model.as_deref().unwrap_or(dashscope::DEFAULT_MODEL),
                        backend.voice_params(),
                    )),
                    Arc::new(StaticCredential::new(backend.api_key.clone().unwrap_or_default())),
                ),
                ProfileKind::Nls => {
                    let mut issuer = NlsTokenIssuer::new(
                        backend.access_key_id.clone().unwrap_or_default(),
                        backend.access_key_secret.clone().unwrap_or_default(),
                    )?;
                    if let Some(endpoint) = &backend.token_endpoint {
                        issuer = issuer.with_endpoint(endpoint);
                    }
                    if let Some(region) = &backend.region {
                        issuer = issuer.with_region(region);
                    }
                    (
                        Arc::new(NlsProfile::new(
                            backend.endpoint.as_deref().unwrap_or(nls::DEFAULT_ENDPOINT),
                            backend.appkey.clone().unwrap_or_default(),
                            backend.voice_params(),
                        )),
                        Arc::new(CachedCredential::new(issuer)),
                    )
                }
            };

        let storage = &config.storage;
        let sink: Arc<dyn DeliverySink> = match storage.kind {
            StorageKind::Local => Arc::new(LocalDirSink::new(&storage.root, &storage.public_base_url)),
            StorageKind::Http => {
                let base_url = storage
                    .base_url
                    .clone()
                    .ok_or_else(|| TtsError::config("storage.base_url is required for http storage"))?;
                Arc::new(HttpPutSink::new(
                    base_url,
                    storage.bearer.clone(),
                    &storage.public_base_url,
                )?)
            }
        };

        let defaults = SynthesisDefaults {
            voice: backend.voice().to_string(),
            model: backend.model.clone(),
            format: backend.format,
        };

        Ok(Self::new(
            TaskClient::new(profile, backend.timeout()),
            credentials,
            sink,
            defaults,
            backend.max_chars(),
        ))
    }

    pub fn profile_kind(&self) -> ProfileKind {
        self.client.profile().kind()
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Reject text the backend would refuse; returns the character count
    pub fn validate(&self, text: &str) -> Result<usize> {
        if text.trim().is_empty() {
            return Err(TtsError::invalid_field("text", "text must not be empty"));
        }
        let char_count = text.chars().count();
        if char_count > self.max_chars {
            return Err(TtsError::invalid_field(
                "text",
                format!(
                    "text is {} characters, the limit is {}",
                    char_count, self.max_chars
                ),
            ));
        }
        Ok(char_count)
    }

    /// Synthesize `text` and return the raw audio
    pub async fn synthesize(&self, text: &str, options: &SynthesisOptions) -> Result<AudioResult> {
        let char_count = self.validate(text)?;
        let format = options.format.unwrap_or(self.defaults.format);
        let profile = self.client.profile();
        if !profile.supports(format) {
            return Err(TtsError::invalid_field(
                "format",
                format!("format {} is not supported by the {} backend", format, profile.kind()),
            ));
        }

        let credential = self.resolve_credential(options).await?;
        let request = SynthesisRequest::new(
            text,
            options.voice.as_deref().unwrap_or(self.defaults.voice.as_str()),
            options.model.clone().or_else(|| self.defaults.model.clone()),
            format,
            credential,
        );
        debug!(chars = char_count, voice = request.voice(), format = %format, "Dispatching synthesis");

        self.client.synthesize(&request).await
    }

    /// Synthesize, then store the audio under a fresh object key
    pub async fn synthesize_and_store(&self, text: &str, options: &SynthesisOptions) -> Result<StoredAudio> {
        let audio = self.synthesize(text, options).await?;
        let char_count = text.chars().count();
        let format = options.format.unwrap_or(self.defaults.format);
        let key = object_key(format);
        let bytes = audio.len();

        let url = self
            .sink
            .upload(&key, Bytes::from(audio.into_bytes()), format.content_type(), true)
            .await?;

        info!(key = %key, bytes, chars = char_count, "Stored synthesized audio");
        Ok(StoredAudio {
            url,
            char_count,
            key,
            bytes,
        })
    }

    async fn resolve_credential(&self, options: &SynthesisOptions) -> Result<String> {
        match options.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() && self.profile_kind() == ProfileKind::Dashscope => {
                Ok(key.to_string())
            }
            _ => self.credentials.credential().await,
        }
    }
}
