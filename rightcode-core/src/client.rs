//! Task client: submission and progress streaming for OCR scans and code
//! execution.
//!
//! Both families have the same shape. A submit call returns the server's
//! task id once the backend has accepted the job; the matching stream call
//! follows `{family}/stream/{task_id}` and yields decoded events in arrival
//! order until the server closes the response.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use rightcode_model::{
    ExecutionEvent, ExecutionSubmission, HealthReport, Language, ScanEvent,
    ScanSubmission, TaskStatus,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{Result, TaskError};
use crate::routes;
use crate::sse;
use crate::transport::Transport;

/// Decoded events of one task stream.
pub type EventStream<T> = Pin<Box<dyn Stream<Item = Result<T>> + Send>>;

/// A submission the backend accepted, with the task id to stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Submitted<T> {
    /// Id to stream, poll or cancel.
    pub task_id: String,
    /// Full submission response.
    pub response: T,
}

/// Submission and streaming operations the orchestrator depends on.
#[async_trait]
pub trait TaskService: Send + Sync {
    /// Upload a drawing for recognition.
    ///
    /// Only a `processing` response with a task id is accepted; anything
    /// else is an error and no stream should be opened.
    async fn submit_scan(
        &self,
        language: Language,
        title: &str,
        image: Vec<u8>,
    ) -> Result<Submitted<ScanSubmission>>;

    /// Follow the progress of an OCR task.
    async fn stream_scan(&self, task_id: &str) -> Result<EventStream<ScanEvent>>;

    /// Queue source code for execution.
    async fn submit_execution(
        &self,
        source_code: &str,
        language: Language,
    ) -> Result<Submitted<ExecutionSubmission>>;

    /// Follow the progress of an execution task.
    async fn stream_execution(&self, task_id: &str) -> Result<EventStream<ExecutionEvent>>;
}

/// Drive a stream to completion, handing each event to `on_event`.
///
/// Returns the number of events delivered. A transport failure mid-stream
/// is returned after the events that preceded it were delivered.
pub async fn for_each_event<T, F>(mut events: EventStream<T>, mut on_event: F) -> Result<usize>
where
    F: FnMut(T) + Send,
{
    let mut delivered = 0;
    while let Some(event) = events.next().await {
        on_event(event?);
        delivered += 1;
    }
    Ok(delivered)
}

#[derive(Serialize)]
struct ExecutionRequest<'a> {
    code: &'a str,
    language: &'a str,
}

/// HTTP implementation of [`TaskService`], plus the non-streaming
/// status, cancellation and health endpoints.
#[derive(Debug, Clone)]
pub struct TaskClient {
    transport: Transport,
}

impl TaskClient {
    /// Client for the backend described by `config`.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        Ok(Self::from_transport(Transport::new(config)?))
    }

    /// Client over an existing transport.
    pub fn from_transport(transport: Transport) -> Self {
        Self { transport }
    }

    /// Underlying transport.
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// `GET /ocr/{task_id}`: current status of an OCR task without
    /// streaming.
    pub async fn poll_scan(&self, task_id: &str) -> Result<ScanSubmission> {
        let url = self.transport.endpoint(routes::ocr::TASKS, Some(task_id))?;
        let response = self.transport.get(url).await?;
        decode_body(&response.body)
    }

    /// `GET /execute/{task_id}`: current status of an execution task.
    ///
    /// The backend answers with a JSON string holding a single `data:`
    /// frame, which is decoded like a stream line.
    pub async fn poll_execution(&self, task_id: &str) -> Result<ExecutionEvent> {
        let url = self
            .transport
            .endpoint(routes::execute::TASKS, Some(task_id))?;
        let response = self.transport.get(url).await?;
        let frame: String = decode_body(&response.body)?;

        match sse::decode_line::<ExecutionEvent>(&frame) {
            Ok(Some(event)) => Ok(event),
            Ok(None) => Err(TaskError::Decode(format!(
                "execution status is not a data frame: {frame}"
            ))),
            Err(err) => Err(TaskError::Decode(err.to_string())),
        }
    }

    /// `DELETE /task/{task_id}`: ask the backend to revoke a task.
    pub async fn cancel_task(&self, task_id: &str) -> Result<()> {
        let url = self.transport.endpoint(routes::tasks::ITEM, Some(task_id))?;
        self.transport.delete(url).await?;
        info!(task_id, "requested task cancellation");
        Ok(())
    }

    /// `GET /health`: backend readiness.
    pub async fn health(&self) -> Result<HealthReport> {
        let url = self.transport.endpoint(routes::HEALTH, None)?;
        let response = self.transport.get(url).await?;
        decode_body(&response.body)
    }

    /// Callback form of [`TaskService::stream_scan`].
    pub async fn stream_scan_with<F>(&self, task_id: &str, on_event: F) -> Result<usize>
    where
        F: FnMut(ScanEvent) + Send,
    {
        for_each_event(self.stream_scan(task_id).await?, on_event).await
    }

    /// Callback form of [`TaskService::stream_execution`].
    pub async fn stream_execution_with<F>(&self, task_id: &str, on_event: F) -> Result<usize>
    where
        F: FnMut(ExecutionEvent) + Send,
    {
        for_each_event(self.stream_execution(task_id).await?, on_event).await
    }

    async fn open_events<T>(&self, route: &[&str], task_id: &str) -> Result<EventStream<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let url = self.transport.endpoint(route, Some(task_id))?;
        let lines = self.transport.open_stream(url).await?;
        Ok(Box::pin(sse::decode::<T, _>(lines)))
    }
}

#[async_trait]
impl TaskService for TaskClient {
    async fn submit_scan(
        &self,
        language: Language,
        title: &str,
        image: Vec<u8>,
    ) -> Result<Submitted<ScanSubmission>> {
        let url = self.transport.endpoint(routes::ocr::TASKS, None)?;

        let drawing = Part::bytes(image)
            .file_name("drawing")
            .mime_str("image/jpeg")
            .map_err(|e| TaskError::Protocol(format!("invalid drawing part: {e}")))?;
        let form = Form::new()
            .text("title", title.to_string())
            .text("language", language.as_str())
            .part("drawing", drawing);

        let response = self.transport.post_multipart(url, form).await?;
        let submission: ScanSubmission = decode_body(&response.body)?;
        debug!(?submission, "scan submission response");

        if let Some(error) = submission.error() {
            warn!(error, "scan submission rejected by server");
            return Err(TaskError::ServerReported(error.to_string()));
        }

        if submission.status_kind() != TaskStatus::Processing {
            return Err(TaskError::Protocol(format!(
                "scan submission returned status {:?}, expected \"processing\"",
                submission.status
            )));
        }

        let task_id = accepted_task_id(submission.task_id.as_deref())?;
        info!(task_id = %task_id, %language, "scan submitted");

        Ok(Submitted {
            task_id,
            response: submission,
        })
    }

    async fn stream_scan(&self, task_id: &str) -> Result<EventStream<ScanEvent>> {
        self.open_events(routes::ocr::STREAM, task_id).await
    }

    async fn submit_execution(
        &self,
        source_code: &str,
        language: Language,
    ) -> Result<Submitted<ExecutionSubmission>> {
        let url = self.transport.endpoint(routes::execute::TASKS, None)?;
        let body = ExecutionRequest {
            code: source_code,
            language: language.as_str(),
        };

        let response = self.transport.post_json(url, &body).await?;
        if response.status != StatusCode::OK {
            return Err(TaskError::Protocol(format!(
                "execution submission returned status {}",
                response.status
            )));
        }

        let submission: ExecutionSubmission = decode_body(&response.body)?;
        debug!(?submission, "execution submission response");

        if !matches!(
            submission.status_kind(),
            TaskStatus::Queued | TaskStatus::Processing
        ) {
            return Err(TaskError::Protocol(format!(
                "execution submission returned status {:?}",
                submission.status
            )));
        }

        let task_id = accepted_task_id(submission.task_id.as_deref())?;
        info!(task_id = %task_id, %language, "execution submitted");

        Ok(Submitted {
            task_id,
            response: submission,
        })
    }

    async fn stream_execution(&self, task_id: &str) -> Result<EventStream<ExecutionEvent>> {
        self.open_events(routes::execute::STREAM, task_id).await
    }
}

fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| TaskError::Decode(e.to_string()))
}

fn accepted_task_id(task_id: Option<&str>) -> Result<String> {
    match task_id.map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(TaskError::Protocol(
            "accepted submission did not include a task id".to_string(),
        )),
    }
}
