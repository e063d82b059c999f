//! In-process mock servers for the text provider (HTTP) and the image
//! provider (WebSocket).

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use canvas_chat::ClientConfig;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message as WsMessage;

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl MockReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        MockReply { status, body: body.into(), delay: Duration::ZERO }
    }

    pub fn delayed(mut self, ms: u64) -> Self {
        self.delay = Duration::from_millis(ms);
        self
    }
}

pub struct MockHttp {
    pub base: String,
    pub requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockHttp {
    pub fn recorded(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// Serve every request with `route(method, path_and_query)`.
pub async fn spawn_http<F>(route: F) -> MockHttp
where
    F: Fn(&str, &str) -> MockReply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let route = Arc::new(route);

    let log = requests.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else { return };
            let route = route.clone();
            let log = log.clone();
            tokio::spawn(async move {
                let _ = serve_one(stream, route, log).await;
            });
        }
    });

    MockHttp { base: format!("http://{}", addr), requests }
}

async fn serve_one<F>(
    mut stream: TcpStream,
    route: Arc<F>,
    log: Arc<Mutex<Vec<Recorded>>>,
) -> Option<()>
where
    F: Fn(&str, &str) -> MockReply,
{
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let (method, path, header_len, content_length) = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);

        let mut headers = [httparse::EMPTY_HEADER; 32];
        let mut req = httparse::Request::new(&mut headers);
        if let Ok(httparse::Status::Complete(len)) = req.parse(&buf) {
            let content_length = req
                .headers
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case("content-length"))
                .and_then(|h| std::str::from_utf8(h.value).ok())
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            break (
                req.method.unwrap_or("").to_string(),
                req.path.unwrap_or("").to_string(),
                len,
                content_length,
            );
        }
    };

    while buf.len() < header_len + content_length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body_end = (header_len + content_length).min(buf.len());
    let body = String::from_utf8_lossy(&buf[header_len..body_end]).to_string();

    let reply = route(&method, &path);
    log.lock().unwrap().push(Recorded { method, path, body });

    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }

    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        reply.status,
        reason(reply.status),
        reply.body.len(),
        reply.body,
    );
    stream.write_all(response.as_bytes()).await.ok()?;
    stream.shutdown().await.ok()?;
    Some(())
}

pub fn catalog(names: &[&str]) -> String {
    let models: Vec<serde_json::Value> = names
        .iter()
        .map(|n| serde_json::json!({"name": n, "supportedGenerationMethods": ["generateContent"]}))
        .collect();
    serde_json::json!({ "models": models }).to_string()
}

pub fn candidate(text: &str) -> String {
    serde_json::json!({"candidates": [{"content": {"parts": [{"text": text}]}}]}).to_string()
}

// ---------------------------------------------------------------------------
// WebSocket
// ---------------------------------------------------------------------------

/// How the mock image provider behaves after the client connects.
#[derive(Debug, Clone)]
pub enum WsScript {
    /// Authenticate, then answer the inference request with this URL.
    Success(String),
    /// Same as `Success`, but send an unparseable frame first.
    GarbageThenSuccess(String),
    /// Read frames forever, never answer.
    Silent,
    /// Answer the authentication frame with an error frame.
    ErrorOnAuth,
    /// Authenticate, then answer the inference request with an error frame.
    ErrorOnInference,
    /// Close the socket as soon as the authentication frame arrives.
    CloseOnAuth,
    /// Hold the TCP connection this many ms before the WebSocket handshake,
    /// then stay silent.
    StallHandshake(u64),
}

pub struct MockWs {
    pub url: String,
    pub frames: Arc<Mutex<Vec<String>>>,
}

impl MockWs {
    pub fn received(&self) -> Vec<serde_json::Value> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .map(|f| serde_json::from_str(f).unwrap())
            .collect()
    }
}

pub async fn spawn_ws(script: WsScript) -> MockWs {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let frames = Arc::new(Mutex::new(Vec::new()));

    let log = frames.clone();
    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else { return };
        if let WsScript::StallHandshake(ms) = &script {
            tokio::time::sleep(Duration::from_millis(*ms)).await;
        }
        let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else { return };

        let auth_ok = r#"{"data":[{"taskType":"authentication","connectionSessionUUID":"s-1"}]}"#;
        let mut seen = 0usize;
        while let Some(Ok(msg)) = ws.next().await {
            let WsMessage::Text(text) = msg else { continue };
            log.lock().unwrap().push(text);
            seen += 1;

            let reply = match (&script, seen) {
                (WsScript::Silent, _) | (WsScript::StallHandshake(_), _) => continue,
                (WsScript::ErrorOnAuth, 1) => {
                    r#"{"error":{"code":"invalidApiKey","message":"Invalid API key"}}"#.to_string()
                }
                (WsScript::CloseOnAuth, 1) => {
                    let _ = ws.close(None).await;
                    return;
                }
                (WsScript::GarbageThenSuccess(_), 1) => {
                    let _ = ws.send(WsMessage::Text("not json at all".to_string())).await;
                    auth_ok.to_string()
                }
                (WsScript::ErrorOnInference, 2) => {
                    r#"{"errors":[{"code":"timeoutProvider"}]}"#.to_string()
                }
                (_, 1) => auth_ok.to_string(),
                (WsScript::Success(url), 2) | (WsScript::GarbageThenSuccess(url), 2) => {
                    serde_json::json!({"data": [{"taskType": "imageInference", "imageURL": url}]})
                        .to_string()
                }
                _ => continue,
            };
            if ws.send(WsMessage::Text(reply)).await.is_err() {
                return;
            }
        }
    });

    MockWs { url: format!("ws://{}", addr), frames }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

pub const FALLBACK_BASE: &str = "http://fallback.test";

/// Config pointing at local mocks. Unused endpoints point at closed ports.
pub fn test_config(keys: usize, text_base: &str, image_ws: &str) -> ClientConfig {
    let mut config = ClientConfig::new(
        (0..keys).map(|i| format!("key-{}", i)).collect(),
        "rw-secret",
    );
    config.text_base_url = text_base.to_string();
    config.image_ws_url = image_ws.to_string();
    config.fallback_base_url = FALLBACK_BASE.to_string();
    config.image_timeout_ms = 2_000;
    config.request_timeout_secs = 5;
    config
}

pub const CLOSED_HTTP: &str = "http://127.0.0.1:1";
pub const CLOSED_WS: &str = "ws://127.0.0.1:1";
