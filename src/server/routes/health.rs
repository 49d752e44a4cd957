//! Health Check Routes

use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use crate::server::server_core::ServerState;
use crate::server::types::HealthResponse;

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        profile: state.service.profile_kind().to_string(),
        uptime: state.uptime().as_secs(),
    })
}
