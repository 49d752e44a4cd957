//! TTS Server Core
//!
//! Axum application wrapping one [`SynthesisService`]

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::core::{Result, TtsError};
use crate::server::config::ServerConfig;
use crate::server::routes;
use crate::synthesis::SynthesisService;

/// Largest accepted request body
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Server state shared across handlers
pub struct ServerState {
    /// Synthesis pipeline
    pub service: SynthesisService,
    /// Start time for uptime calculation
    pub start_time: Instant,
}

impl ServerState {
    pub fn new(service: SynthesisService) -> Self {
        Self {
            service,
            start_time: Instant::now(),
        }
    }

    /// Get server uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}

/// Create the router with all routes
pub fn create_router(state: Arc<ServerState>, access_log: bool) -> Router {
    // CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/api/tts", post(routes::tts::synthesize))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors);

    if access_log {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// TTS Server
pub struct TtsServer {
    config: ServerConfig,
    state: Arc<ServerState>,
}

impl TtsServer {
    /// Build the synthesis pipeline described by `config`
    pub fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        let service = SynthesisService::from_config(&config)?;
        Ok(Self {
            state: Arc::new(ServerState::new(service)),
            config,
        })
    }

    /// Run the server
    pub async fn run(self) -> Result<()> {
        let router = create_router(self.state.clone(), self.config.logging.access_log);

        let addr = format!("{}:{}", self.config.host, self.config.port);
        info!(
            profile = %self.state.service.profile_kind(),
            max_chars = self.state.service.max_chars(),
            "Starting TTS gateway on {}",
            addr
        );

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| TtsError::config(format!("Failed to bind {}: {}", addr, e)))?;
        axum::serve(listener, router)
            .await
            .map_err(|e| TtsError::internal(format!("Server error: {}", e)))?;

        Ok(())
    }
}
