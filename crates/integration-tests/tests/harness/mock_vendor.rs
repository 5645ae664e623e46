//! Mock vendor server for integration tests
//!
//! Serves an OpenAI-compatible chat route (SSE when streaming) and an
//! Ollama chat route (NDJSON when streaming). Replies are taken from a
//! script in order; once the script is exhausted every request gets the
//! default text reply.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use bytes::Bytes;
use futures_util::StreamExt;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// Text returned when nothing else is scripted
pub const DEFAULT_REPLY: &str = "Hello from mock vendor";

/// One scripted reply
#[derive(Debug, Clone)]
pub enum Reply {
    /// Error status with a vendor-style JSON body
    Error {
        status: u16,
        message: String,
        retry_after: Option<u64>,
    },
    /// Successful reply, streamed or not as the request asks
    Text(String),
    /// Frames written verbatim, `delay` apart
    RawStream { frames: Vec<String>, delay: Duration },
}

impl Reply {
    pub fn error(status: u16, message: &str) -> Self {
        Self::Error {
            status,
            message: message.to_owned(),
            retry_after: None,
        }
    }

    /// SSE frames carrying one content delta each, without a `[DONE]` marker
    pub fn sse_deltas(count: usize, delay: Duration) -> Self {
        let frames = (0..count)
            .map(|i| {
                let chunk = json!({
                    "id": "chatcmpl-raw",
                    "object": "chat.completion.chunk",
                    "created": 1_700_000_000,
                    "model": "mock-model-1",
                    "choices": [{"index": 0, "delta": {"content": format!("w{i} ")}, "finish_reason": null}]
                });
                format!("data: {chunk}\n\n")
            })
            .collect();

        Self::RawStream { frames, delay }
    }
}

/// Mock vendor returning scripted responses
pub struct MockVendor {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

struct MockState {
    request_count: AtomicU32,
    script: Mutex<VecDeque<Reply>>,
    last_request: Mutex<Option<Value>>,
}

impl MockVendor {
    /// Start a mock that always answers with the default reply
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_scripted(Vec::new()).await
    }

    /// Start a mock that answers with `script` in order
    pub async fn start_scripted(script: Vec<Reply>) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            request_count: AtomicU32::new(0),
            script: Mutex::new(script.into()),
            last_request: Mutex::new(None),
        });

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(handle_openai))
            .route("/api/chat", routing::post(handle_ollama))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL for configuring the mock as an OpenAI-compatible provider
    pub fn openai_base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Base URL for configuring the mock as an Ollama provider
    pub fn ollama_base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Number of chat requests received on any route
    pub fn request_count(&self) -> u32 {
        self.state.request_count.load(Ordering::Relaxed)
    }

    /// Body of the most recent chat request
    pub fn last_request(&self) -> Option<Value> {
        self.state.last_request.lock().unwrap().clone()
    }
}

impl Drop for MockVendor {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl MockState {
    fn next_reply(&self, body: Value) -> Reply {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        *self.last_request.lock().unwrap() = Some(body);

        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Reply::Text(DEFAULT_REPLY.to_owned()))
    }
}

/// Request fields the mock reacts to
struct Requested {
    model: String,
    stream: bool,
    max_tokens: Option<usize>,
}

impl Requested {
    fn from_openai(body: &Value) -> Self {
        Self {
            model: body["model"].as_str().unwrap_or_default().to_owned(),
            stream: body["stream"].as_bool().unwrap_or(false),
            max_tokens: body["max_tokens"].as_u64().map(|n| n as usize),
        }
    }

    fn from_ollama(body: &Value) -> Self {
        Self {
            model: body["model"].as_str().unwrap_or_default().to_owned(),
            stream: body["stream"].as_bool().unwrap_or(true),
            max_tokens: body["options"]["num_predict"].as_u64().map(|n| n as usize),
        }
    }

    /// Words of `text` honoring `max_tokens`, and whether they were cut short
    fn words<'a>(&self, text: &'a str) -> (Vec<&'a str>, bool) {
        let all: Vec<&str> = text.split_whitespace().collect();
        match self.max_tokens {
            Some(limit) if limit < all.len() => (all[..limit].to_vec(), true),
            _ => (all, false),
        }
    }
}

// -- Handlers --

async fn handle_openai(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    let requested = Requested::from_openai(&body);

    match state.next_reply(body) {
        Reply::Error {
            status,
            message,
            retry_after,
        } => error_response(status, &message, retry_after),
        Reply::RawStream { frames, delay } => raw_stream(frames, delay, "text/event-stream"),
        Reply::Text(text) if requested.stream => openai_stream(&requested, &text),
        Reply::Text(text) => openai_completion(&requested, &text),
    }
}

async fn handle_ollama(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    let requested = Requested::from_ollama(&body);

    match state.next_reply(body) {
        Reply::Error {
            status,
            message,
            retry_after,
        } => error_response(status, &message, retry_after),
        Reply::RawStream { frames, delay } => raw_stream(frames, delay, "application/x-ndjson"),
        Reply::Text(text) if requested.stream => ollama_stream(&requested, &text),
        Reply::Text(text) => ollama_completion(&requested, &text),
    }
}

fn error_response(status: u16, message: &str, retry_after: Option<u64>) -> Response {
    let status = StatusCode::from_u16(status).unwrap();
    let body = Json(json!({
        "error": {
            "message": message,
            "type": "mock_error"
        }
    }));

    match retry_after {
        Some(secs) => (status, [(header::RETRY_AFTER, secs.to_string())], body).into_response(),
        None => (status, body).into_response(),
    }
}

fn raw_stream(frames: Vec<String>, delay: Duration, content_type: &'static str) -> Response {
    let body = futures_util::stream::iter(frames.into_iter().enumerate()).then(move |(i, frame)| async move {
        if i > 0 {
            tokio::time::sleep(delay).await;
        }
        Ok::<_, Infallible>(Bytes::from(frame))
    });

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type)],
        Body::from_stream(body),
    )
        .into_response()
}

/// Split words into deltas whose concatenation equals `words.join(" ")`
fn stream_pieces(words: &[&str]) -> Vec<String> {
    words
        .iter()
        .enumerate()
        .map(|(i, word)| if i == 0 { (*word).to_owned() } else { format!(" {word}") })
        .collect()
}

fn openai_completion(requested: &Requested, text: &str) -> Response {
    let (words, truncated) = requested.words(text);
    let completion_tokens = words.len();

    Json(json!({
        "id": "chatcmpl-mock-123",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": requested.model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": words.join(" ")},
            "finish_reason": if truncated { "length" } else { "stop" }
        }],
        "usage": {
            "prompt_tokens": 10,
            "completion_tokens": completion_tokens,
            "total_tokens": 10 + completion_tokens
        }
    }))
    .into_response()
}

fn openai_stream(requested: &Requested, text: &str) -> Response {
    let (words, truncated) = requested.words(text);
    let chunk = |choices: Value, usage: Value| {
        let chunk = json!({
            "id": "chatcmpl-mock-stream",
            "object": "chat.completion.chunk",
            "created": 1_700_000_000,
            "model": requested.model,
            "choices": choices,
            "usage": usage
        });
        format!("data: {chunk}\n\n")
    };

    let mut body = chunk(
        json!([{"index": 0, "delta": {"role": "assistant", "content": ""}, "finish_reason": null}]),
        Value::Null,
    );
    for piece in stream_pieces(&words) {
        body.push_str(&chunk(
            json!([{"index": 0, "delta": {"content": piece}, "finish_reason": null}]),
            Value::Null,
        ));
    }
    body.push_str(&chunk(
        json!([{"index": 0, "delta": {}, "finish_reason": if truncated { "length" } else { "stop" }}]),
        Value::Null,
    ));
    body.push_str(&chunk(
        json!([]),
        json!({"prompt_tokens": 10, "completion_tokens": words.len(), "total_tokens": 10 + words.len()}),
    ));
    body.push_str("data: [DONE]\n\n");

    (StatusCode::OK, [(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}

fn ollama_completion(requested: &Requested, text: &str) -> Response {
    let (words, truncated) = requested.words(text);

    Json(json!({
        "model": requested.model,
        "message": {"role": "assistant", "content": words.join(" ")},
        "done": true,
        "done_reason": if truncated { "length" } else { "stop" },
        "prompt_eval_count": 7,
        "eval_count": words.len()
    }))
    .into_response()
}

fn ollama_stream(requested: &Requested, text: &str) -> Response {
    let (words, truncated) = requested.words(text);
    let mut body = String::new();

    for piece in stream_pieces(&words) {
        let line = json!({
            "model": requested.model,
            "message": {"role": "assistant", "content": piece},
            "done": false
        });
        body.push_str(&format!("{line}\n"));
    }

    let last = json!({
        "model": requested.model,
        "message": {"role": "assistant", "content": ""},
        "done": true,
        "done_reason": if truncated { "length" } else { "stop" },
        "prompt_eval_count": 7,
        "eval_count": words.len()
    });
    body.push_str(&format!("{last}\n"));

    (StatusCode::OK, [(header::CONTENT_TYPE, "application/x-ndjson")], body).into_response()
}
