//! Mock generation backend for integration tests
//!
//! Serves both provider protocols from one listener: chat completions, and
//! async task submission plus status polling.

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing,
};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// What the chat endpoint answers with
#[derive(Clone)]
pub enum ChatReply {
    /// Image attached under `message.images`
    AttachedImage(String),
    /// Plain `message.content`
    Content(String),
    /// Non-2xx status with a text body
    Error(u16),
}

/// Terminal state a task reaches after its pending polls
#[derive(Clone)]
pub enum TaskOutcome {
    /// `output.images[0].url`
    NestedImage(String),
    /// `output_images[0]`
    FlatImage(String),
    /// `FAILED` with a message
    Failed(String),
    /// Never leaves `PENDING`
    Stuck,
}

pub struct MockProviderBuilder {
    api_key: String,
    chat: ChatReply,
    task: TaskOutcome,
    pending_polls: u32,
}

impl MockProviderBuilder {
    /// The only bearer key the mock accepts
    pub fn api_key(mut self, key: &str) -> Self {
        key.clone_into(&mut self.api_key);
        self
    }

    pub fn chat_reply(mut self, reply: ChatReply) -> Self {
        self.chat = reply;
        self
    }

    pub fn task_outcome(mut self, outcome: TaskOutcome) -> Self {
        self.task = outcome;
        self
    }

    /// Number of `PENDING` answers before the terminal one
    pub fn pending_polls(mut self, polls: u32) -> Self {
        self.pending_polls = polls;
        self
    }

    pub async fn start(self) -> anyhow::Result<MockProvider> {
        let state = Arc::new(MockState {
            api_key: self.api_key,
            chat: self.chat,
            task: self.task,
            pending_polls: self.pending_polls,
            chat_count: AtomicU32::new(0),
            submit_count: AtomicU32::new(0),
            poll_count: AtomicU32::new(0),
        });

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(handle_chat))
            .route("/v1/images/generations", routing::post(handle_submit))
            .route("/v1/tasks/{task_id}", routing::get(handle_poll))
            .route("/v1/models", routing::get(handle_models))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let stop = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { stop.cancelled().await })
                .await
                .ok();
        });

        Ok(MockProvider { addr, shutdown, state })
    }
}

/// Running mock backend
pub struct MockProvider {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

struct MockState {
    api_key: String,
    chat: ChatReply,
    task: TaskOutcome,
    pending_polls: u32,
    chat_count: AtomicU32,
    submit_count: AtomicU32,
    poll_count: AtomicU32,
}

impl MockProvider {
    pub fn builder() -> MockProviderBuilder {
        MockProviderBuilder {
            api_key: "test-key".to_owned(),
            chat: ChatReply::Content("hello from mock".to_owned()),
            task: TaskOutcome::FlatImage("http://mock/img.png".to_owned()),
            pending_polls: 0,
        }
    }

    /// Base URL including `/v1`
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    pub fn chat_count(&self) -> u32 {
        self.state.chat_count.load(Ordering::Relaxed)
    }

    pub fn submit_count(&self) -> u32 {
        self.state.submit_count.load(Ordering::Relaxed)
    }

    pub fn poll_count(&self) -> u32 {
        self.state.poll_count.load(Ordering::Relaxed)
    }

    /// Total upstream calls of any kind
    pub fn total_calls(&self) -> u32 {
        self.chat_count() + self.submit_count() + self.poll_count()
    }
}

impl Drop for MockProvider {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn authorized(state: &MockState, headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == format!("Bearer {}", state.api_key))
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, "invalid api key").into_response()
}

async fn handle_chat(State(state): State<Arc<MockState>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.chat_count.fetch_add(1, Ordering::Relaxed);

    if !authorized(&state, &headers) {
        return unauthorized();
    }

    let message = match &state.chat {
        ChatReply::AttachedImage(url) => json!({
            "role": "assistant",
            "content": "",
            "images": [{ "type": "image_url", "image_url": { "url": url } }]
        }),
        ChatReply::Content(content) => json!({ "role": "assistant", "content": content }),
        ChatReply::Error(status) => {
            let status = StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            return (status, "mock chat failure").into_response();
        }
    };

    Json(json!({
        "id": "gen-mock",
        "model": body["model"],
        "choices": [{ "index": 0, "message": message, "finish_reason": "stop" }]
    }))
    .into_response()
}

async fn handle_submit(State(state): State<Arc<MockState>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let n = state.submit_count.fetch_add(1, Ordering::Relaxed) + 1;

    if !authorized(&state, &headers) {
        return unauthorized();
    }

    if headers.get("x-modelscope-async-mode").and_then(|v| v.to_str().ok()) != Some("true") {
        return (StatusCode::BAD_REQUEST, "async mode header required").into_response();
    }

    if body["prompt"].as_str().is_none_or(str::is_empty) {
        return (StatusCode::BAD_REQUEST, "prompt required").into_response();
    }

    Json(json!({ "task_id": format!("task-{n}"), "request_id": format!("req-{n}") })).into_response()
}

async fn handle_poll(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(task_id): Path<String>,
) -> Response {
    let n = state.poll_count.fetch_add(1, Ordering::Relaxed) + 1;

    if !authorized(&state, &headers) {
        return unauthorized();
    }

    if headers.get("x-modelscope-task-type").and_then(|v| v.to_str().ok()) != Some("image_generation") {
        return (StatusCode::BAD_REQUEST, "task type header required").into_response();
    }

    if n <= state.pending_polls {
        return Json(json!({ "task_id": task_id, "task_status": "PENDING" })).into_response();
    }

    let body = match &state.task {
        TaskOutcome::NestedImage(url) => json!({
            "task_id": task_id,
            "task_status": "SUCCEED",
            "output": { "images": [{ "url": url }] }
        }),
        TaskOutcome::FlatImage(url) => json!({
            "task_id": task_id,
            "task_status": "SUCCEED",
            "output_images": [url]
        }),
        TaskOutcome::Failed(message) => json!({
            "task_id": task_id,
            "task_status": "FAILED",
            "message": message
        }),
        TaskOutcome::Stuck => json!({ "task_id": task_id, "task_status": "RUNNING" }),
    };

    Json(body).into_response()
}

async fn handle_models(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }

    Json(json!({
        "object": "list",
        "data": [
            { "id": "MusePublic/489_ckpt_FLUX_1", "owned_by": "mock" },
            { "id": "Qwen/Qwen-Image", "owned_by": "mock" }
        ]
    }))
    .into_response()
}
