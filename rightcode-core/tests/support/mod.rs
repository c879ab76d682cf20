//! Fake task backend served over real HTTP on an ephemeral port.

#![allow(dead_code)]

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::extract::multipart::MultipartError;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use futures::stream;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use rightcode_core::{ClientConfig, TaskClient};

/// One multipart field as received by `POST /ocr`.
#[derive(Debug, Clone)]
pub struct UploadField {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl UploadField {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

#[derive(Debug, Default)]
pub struct Recorded {
    pub scan_uploads: Vec<Vec<UploadField>>,
    pub executions: Vec<Value>,
    pub cancelled: Vec<String>,
    /// `(path, Accept header)` of every stream request.
    pub stream_requests: Vec<(String, Option<String>)>,
}

/// Canned responses, fixed before the server starts.
#[derive(Debug, Default)]
pub struct Script {
    pub scan_submission: Value,
    pub scan_poll: Value,
    pub execution_status: Option<StatusCode>,
    pub execution_submission: Value,
    pub execution_poll: Option<Value>,
    pub health: Value,
    /// Body chunks per stream path, e.g. `"ocr/abc"`.
    pub streams: HashMap<String, Vec<Vec<u8>>>,
}

impl Script {
    pub fn stream<C>(mut self, key: &str, chunks: impl IntoIterator<Item = C>) -> Self
    where
        C: Into<Vec<u8>>,
    {
        let chunks = chunks.into_iter().map(Into::into).collect();
        self.streams.insert(key.to_string(), chunks);
        self
    }
}

#[derive(Debug, Default)]
struct BackendState {
    script: Script,
    recorded: Mutex<Recorded>,
}

pub struct FakeBackend {
    pub base_url: String,
    state: Arc<BackendState>,
    handle: JoinHandle<()>,
}

impl FakeBackend {
    pub async fn spawn(script: Script) -> anyhow::Result<Self> {
        init_tracing();

        let state = Arc::new(BackendState {
            script,
            recorded: Mutex::new(Recorded::default()),
        });

        let app = Router::new()
            .route("/ocr", post(submit_scan))
            .route("/ocr/{task_id}", get(poll_scan))
            .route("/ocr/stream/{task_id}", get(stream_scan))
            .route("/execute", post(submit_execution))
            .route("/execute/{task_id}", get(poll_execution))
            .route("/execute/stream/{task_id}", get(stream_execution))
            .route("/task/{task_id}", delete(cancel_task))
            .route("/health", get(health))
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind fake backend")?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            base_url: format!("http://{addr}"),
            state,
            handle,
        })
    }

    pub fn client(&self) -> anyhow::Result<TaskClient> {
        let config = ClientConfig::new(&self.base_url)?;
        Ok(TaskClient::new(&config)?)
    }

    pub fn recorded<R>(&self, read: impl FnOnce(&Recorded) -> R) -> R {
        let recorded = self
            .state
            .recorded
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        read(&recorded)
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Encode JSON documents as `data:` frames, one chunk per frame.
pub fn frames(events: &[Value]) -> Vec<String> {
    events.iter().map(|e| format!("data: {e}\n\n")).collect()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

type Shared = State<Arc<BackendState>>;

async fn submit_scan(
    State(state): Shared,
    mut multipart: Multipart,
) -> Result<Json<Value>, MultipartError> {
    let mut fields = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await?.to_vec();
        fields.push(UploadField {
            name,
            file_name,
            content_type,
            data,
        });
    }
    state
        .recorded
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .scan_uploads
        .push(fields);

    Ok(Json(state.script.scan_submission.clone()))
}

async fn poll_scan(State(state): Shared, Path(_task_id): Path<String>) -> Json<Value> {
    Json(state.script.scan_poll.clone())
}

async fn submit_execution(State(state): Shared, Json(body): Json<Value>) -> Response {
    state
        .recorded
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .executions
        .push(body);

    let status = state.script.execution_status.unwrap_or(StatusCode::OK);
    (status, Json(state.script.execution_submission.clone())).into_response()
}

async fn poll_execution(State(state): Shared, Path(_task_id): Path<String>) -> Response {
    match &state.script.execution_poll {
        Some(event) => Json(Value::String(format!("data:{event}"))).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn stream_scan(
    State(state): Shared,
    Path(task_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    event_stream(&state, format!("ocr/{task_id}"), &headers)
}

async fn stream_execution(
    State(state): Shared,
    Path(task_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    event_stream(&state, format!("execute/{task_id}"), &headers)
}

fn event_stream(state: &BackendState, key: String, headers: &HeaderMap) -> Response {
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state
        .recorded
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .stream_requests
        .push((key.clone(), accept));

    let Some(chunks) = state.script.streams.get(&key) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let body = Body::from_stream(stream::iter(
        chunks.clone().into_iter().map(Ok::<_, Infallible>),
    ));
    ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}

async fn cancel_task(State(state): Shared, Path(task_id): Path<String>) -> Json<Value> {
    state
        .recorded
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .cancelled
        .push(task_id.clone());
    Json(serde_json::json!({ "status": "cancelled", "task_id": task_id }))
}

async fn health(State(state): Shared) -> Json<Value> {
    Json(state.script.health.clone())
}
