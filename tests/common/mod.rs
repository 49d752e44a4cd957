//! Scripted in-process WebSocket backend shared by the integration tests

#![allow(dead_code)]

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

pub type Ws = WebSocketStream<TcpStream>;

/// What the client presented during the handshake
#[derive(Debug, Clone)]
pub struct Handshake {
    pub uri: String,
    pub authorization: Option<String>,
}

pub struct Backend {
    pub url: String,
    pub handshakes: Arc<Mutex<Vec<Handshake>>>,
}

impl Backend {
    pub fn handshakes(&self) -> Vec<Handshake> {
        self.handshakes.lock().unwrap().clone()
    }
}

/// Accept connections forever, running `script` on each
pub async fn spawn_backend<F, Fut>(path: &str, script: F) -> Backend
where
    F: Fn(Ws) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handshakes: Arc<Mutex<Vec<Handshake>>> = Arc::default();
    let script = Arc::new(script);

    let seen = handshakes.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let seen = seen.clone();
            let script = script.clone();
            tokio::spawn(async move {
                let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                    seen.lock().unwrap().push(Handshake {
                        uri: req.uri().to_string(),
                        authorization: req
                            .headers()
                            .get(AUTHORIZATION)
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string),
                    });
                    Ok(resp)
                };
                if let Ok(ws) = accept_hdr_async(stream, callback).await {
                    script(ws).await;
                }
            });
        }
    });

    Backend {
        url: format!("ws://{}{}", addr, path),
        handshakes,
    }
}

/// Next text frame as JSON
pub async fn next_json(ws: &mut Ws) -> Value {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return serde_json::from_str(text.as_str()).unwrap(),
            Some(Ok(_)) => continue,
            other => panic!("expected a text frame, got {:?}", other),
        }
    }
}

/// Read until the client goes away
pub async fn drain(mut ws: Ws) {
    while let Some(Ok(_)) = ws.next().await {}
}

pub async fn send_json(ws: &mut Ws, value: Value) {
    ws.send(Message::text(value.to_string())).await.unwrap();
}

pub async fn send_audio(ws: &mut Ws, data: &'static [u8]) {
    ws.send(Message::binary(data)).await.unwrap();
}

/// Profile A inbound event
pub fn dashscope_event(event: &str, task_id: &str) -> Value {
    json!({
        "header": {"task_id": task_id, "event": event, "attributes": {}},
        "payload": {}
    })
}

/// Profile B inbound event
pub fn nls_event(name: &str, task_id: &str) -> Value {
    json!({
        "header": {
            "message_id": "0123456789abcdef0123456789abcdef",
            "task_id": task_id,
            "namespace": "FlowingSpeechSynthesizer",
            "name": name,
            "status": 20000000,
            "status_text": "Gateway:SUCCESS:Success."
        },
        "payload": {}
    })
}

/// Profile A exchange up to the point where audio may flow; returns the task id
pub async fn dashscope_handshake(ws: &mut Ws) -> String {
    let start = next_json(ws).await;
    assert_eq!(start["header"]["action"], "run-task");
    let task_id = start["header"]["task_id"].as_str().unwrap().to_string();
    send_json(ws, dashscope_event("task-started", &task_id)).await;

    let cont = next_json(ws).await;
    assert_eq!(cont["header"]["action"], "continue-task");
    let finish = next_json(ws).await;
    assert_eq!(finish["header"]["action"], "finish-task");
    task_id
}
