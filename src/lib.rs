//! # SDKWork TTS Gateway
//!
//! Text-to-speech over duplex streaming WebSocket backends.
//!
//! A synthesis is one remote task on its own connection: send a start
//! message, the whole text and a finish message, then collect binary audio
//! frames until the backend reports completion or failure. Every task settles
//! exactly once, with the concatenated audio or with a single error.
//!
//! ## Features
//!
//! - **Two wire profiles**: bearer-key model-serving backends and
//!   token-gateway backends with signed token exchange
//! - **Deadline-bound tasks**: a per-task time budget, no retries
//! - **Credential cache**: tokens reused until shortly before expiry
//! - **Delivery**: local directory or HTTP `PUT` object stores
//! - **HTTP front door**: `POST /api/tts`, `GET /health`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use sdkwork_tts_gateway::server::ServerConfig;
//! use sdkwork_tts_gateway::synthesis::{SynthesisOptions, SynthesisService};
//!
//! let mut config = ServerConfig::default();
//! config.backend.api_key = Some("sk-...".into());
//!
//! let service = SynthesisService::from_config(&config)?;
//! let stored = service
//!     .synthesize_and_store("你好，世界", &SynthesisOptions::default())
//!     .await?;
//! println!("{}", stored.url);
//! ```
//!
//! ## Driving the protocol directly
//!
//! ```rust,ignore
//! use std::{sync::Arc, time::Duration};
//! use sdkwork_tts_gateway::protocol::*;
//!
//! let client = TaskClient::new(Arc::new(DashscopeProfile::default()), Duration::from_secs(60));
//! let request = SynthesisRequest::new("Hello", "longxiaochun", None, AudioFormat::Mp3, "sk-...");
//! let audio = client.synthesize(&request).await?;
//! ```

pub mod core;
pub mod credentials;
pub mod protocol;
pub mod server;
pub mod storage;
pub mod synthesis;

pub use core::{ErrorKind, Result, ResultExt, TtsError};
pub use credentials::{CachedCredential, CredentialProvider, NlsTokenIssuer, StaticCredential};
pub use protocol::{AudioFormat, AudioResult, ProfileKind, SynthesisRequest, TaskClient};
pub use storage::{DeliverySink, HttpPutSink, LocalDirSink};
pub use synthesis::{StoredAudio, SynthesisOptions, SynthesisService};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
