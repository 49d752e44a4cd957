//! Synthesis Routes

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;
use tracing::warn;

use crate::server::server_core::ServerState;
use crate::server::types::{TtsRequest, TtsResponse};
use crate::synthesis::SynthesisOptions;

/// Synthesize text and return the locator of the stored audio
pub async fn synthesize(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<TtsRequest>, JsonRejection>,
) -> (StatusCode, Json<TtsResponse>) {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(TtsResponse::failed(rejection.body_text())),
            )
        }
    };

    let options = SynthesisOptions {
        voice: request.voice,
        model: request.model,
        format: request.format,
        api_key: request.apikey,
    };

    match state.service.synthesize_and_store(&request.text, &options).await {
        Ok(stored) => (
            StatusCode::OK,
            Json(TtsResponse::stored(stored.url, stored.char_count)),
        ),
        Err(e) => {
            warn!(kind = %e.kind(), error = %e, "Synthesis request failed");
            let status =
                StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(TtsResponse::failed(e.to_string())))
        }
    }
}
