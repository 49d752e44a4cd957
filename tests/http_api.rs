//! HTTP front door and orchestration against a scripted backend

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::*;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use sdkwork_tts_gateway::protocol::dashscope::{DashscopeProfile, DEFAULT_MODEL};
use sdkwork_tts_gateway::protocol::{AudioFormat, TaskClient, VoiceParams};
use sdkwork_tts_gateway::server::{create_router, ServerState};
use sdkwork_tts_gateway::synthesis::{SynthesisDefaults, SynthesisService};
use sdkwork_tts_gateway::{LocalDirSink, StaticCredential};

/// Backend that answers every task with the given script outcome
async fn backend(fail: bool) -> Backend {
    spawn_backend("/", move |mut ws| async move {
        let task_id = dashscope_handshake(&mut ws).await;
        send_audio(&mut ws, b"ID3").await;
        send_audio(&mut ws, b"frame").await;
        if fail {
            send_json(
                &mut ws,
                json!({"header": {"task_id": task_id, "event": "task-failed",
                                  "error_code": "Throttling", "error_message": "rate limited"}}),
            )
            .await;
        } else {
            send_json(&mut ws, dashscope_event("task-finished", &task_id)).await;
        }
        drain(ws).await;
    })
    .await
}

fn app(backend_url: &str, root: &std::path::Path, api_key: &str) -> Router {
    let client = TaskClient::new(
        Arc::new(DashscopeProfile::new(backend_url, DEFAULT_MODEL, VoiceParams::default())),
        Duration::from_secs(5),
    );
    let service = SynthesisService::new(
        client,
        Arc::new(StaticCredential::new(api_key)),
        Arc::new(LocalDirSink::new(root, "http://files.test")),
        SynthesisDefaults {
            voice: "longxiaochun".into(),
            model: None,
            format: AudioFormat::Mp3,
        },
        10,
    );
    create_router(Arc::new(ServerState::new(service)), false)
}

async fn post_tts(app: Router, body: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/tts")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_tts_stores_audio_and_returns_locator() {
    let backend = backend(false).await;
    let dir = tempfile::tempdir().unwrap();

    let (status, body) = post_tts(app(&backend.url, dir.path(), "sk-server"), r#"{"text":"你好世界"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["char_count"], 4);
    let url = body["url"].as_str().unwrap();
    let key = url.strip_prefix("http://files.test/").unwrap();
    assert!(key.starts_with("tts/") && key.ends_with(".mp3"), "{}", key);
    assert_eq!(std::fs::read(dir.path().join(key)).unwrap(), b"ID3frame");

    assert_eq!(
        backend.handshakes()[0].authorization.as_deref(),
        Some("bearer sk-server")
    );
}

#[tokio::test]
async fn test_request_api_key_overrides_configured_key() {
    let backend = backend(false).await;
    let dir = tempfile::tempdir().unwrap();

    let (status, _) = post_tts(
        app(&backend.url, dir.path(), ""),
        r#"{"text":"hi","apikey":"sk-caller","format":"wav"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        backend.handshakes()[0].authorization.as_deref(),
        Some("bearer sk-caller")
    );
}

#[tokio::test]
async fn test_oversize_text_is_400_without_backend_contact() {
    let backend = backend(false).await;
    let dir = tempfile::tempdir().unwrap();

    let (status, body) = post_tts(
        app(&backend.url, dir.path(), "sk"),
        r#"{"text":"this is far longer than ten characters"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("limit is 10"));
    assert!(backend.handshakes().is_empty());
}

#[tokio::test]
async fn test_malformed_body_is_400() {
    let backend = backend(false).await;
    let dir = tempfile::tempdir().unwrap();

    let (status, body) = post_tts(app(&backend.url, dir.path(), "sk"), r#"{"voice":"x"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_backend_failure_is_500_and_nothing_stored() {
    let backend = backend(true).await;
    let dir = tempfile::tempdir().unwrap();

    let (status, body) = post_tts(app(&backend.url, dir.path(), "sk"), r#"{"text":"hi"}"#).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("rate limited"));
    assert!(!dir.path().join("tts").exists());
}

#[tokio::test]
async fn test_missing_credential_is_500() {
    let backend = backend(false).await;
    let dir = tempfile::tempdir().unwrap();

    let (status, body) = post_tts(app(&backend.url, dir.path(), ""), r#"{"text":"hi"}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("Credential"));
    assert!(backend.handshakes().is_empty());
}

#[tokio::test]
async fn test_health() {
    let dir = tempfile::tempdir().unwrap();
    let response = app("ws://127.0.0.1:1/", dir.path(), "sk")
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["profile"], "dashscope");
    assert_eq!(body["service"], "sdkwork-tts-gateway");
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let backend = backend(false).await;
    let dir = tempfile::tempdir().unwrap();
    let body = json!({ "text": "a".repeat(70 * 1024) }).to_string();

    let (status, body) = post_tts(app(&backend.url, dir.path(), "sk"), &body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(backend.handshakes().is_empty());
}
