//! Wire payloads exchanged with the OCR and execution task endpoints.

use std::fmt::{Display, Formatter};

use crate::execution::ExecutionResult;

/// Classification of the free-form status strings the backend emits.
///
/// Matching is case-sensitive: the backend always reports lowercase
/// statuses on the task endpoints, while the uppercase Celery states
/// (`SUCCESS`, `FAILURE`) only appear nested inside OCR result payloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// `pending`: accepted, not yet picked up.
    Pending,
    /// `processing`: a worker is on it.
    Processing,
    /// `queued`: waiting for an execution worker.
    Queued,
    /// `completed`: OCR finished.
    Completed,
    /// `success`: execution finished.
    Success,
    /// `failed`
    Failed,
    /// `timeout` or `timed out`
    TimedOut,
    /// `error`
    Error,
    /// Anything else, treated as progress.
    Other(String),
}

impl TaskStatus {
    /// Classify a raw status string.
    pub fn parse(status: &str) -> Self {
        match status {
            "pending" => TaskStatus::Pending,
            "processing" => TaskStatus::Processing,
            "queued" => TaskStatus::Queued,
            "completed" => TaskStatus::Completed,
            "success" => TaskStatus::Success,
            "failed" => TaskStatus::Failed,
            "timeout" | "timed out" => TaskStatus::TimedOut,
            "error" => TaskStatus::Error,
            other => TaskStatus::Other(other.to_string()),
        }
    }

    /// No further events are expected once a task reports this status.
    pub fn is_terminal(&self) -> bool {
        self.is_success() || self.is_failure()
    }

    /// Terminal and successful.
    pub fn is_success(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Success)
    }

    /// Terminal and failed.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            TaskStatus::Failed | TaskStatus::TimedOut | TaskStatus::Error
        )
    }
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => f.write_str("pending"),
            TaskStatus::Processing => f.write_str("processing"),
            TaskStatus::Queued => f.write_str("queued"),
            TaskStatus::Completed => f.write_str("completed"),
            TaskStatus::Success => f.write_str("success"),
            TaskStatus::Failed => f.write_str("failed"),
            TaskStatus::TimedOut => f.write_str("timeout"),
            TaskStatus::Error => f.write_str("error"),
            TaskStatus::Other(other) => f.write_str(other),
        }
    }
}

/// Common view over the events decoded from a task stream.
pub trait TaskEvent {
    /// Raw status string.
    fn status(&self) -> &str;
    /// Backend task id the event belongs to.
    fn task_id(&self) -> &str;
    /// Server-reported error carried by the event, if any and non-empty.
    fn error(&self) -> Option<&str>;

    /// Classified status.
    fn status_kind(&self) -> TaskStatus {
        TaskStatus::parse(self.status())
    }

    /// Whether this is the last event of its task.
    fn is_terminal(&self) -> bool {
        self.status_kind().is_terminal()
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.trim().is_empty())
}

/// Response to `POST /ocr` and `GET /ocr/{task_id}`.
///
/// A missing `task_id` signals the submission failed outright.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanSubmission {
    /// Id to stream or poll; absent when the submission failed.
    #[cfg_attr(feature = "serde", serde(default))]
    pub task_id: Option<String>,
    /// Raw status string.
    pub status: String,
    /// Recognized text, on a completed poll.
    #[cfg_attr(feature = "serde", serde(default))]
    pub result: Option<String>,
    /// Server-side failure message.
    #[cfg_attr(feature = "serde", serde(default))]
    pub error: Option<String>,
    /// Whether the result came from the OCR cache.
    #[cfg_attr(feature = "serde", serde(default))]
    pub cached: Option<bool>,
    /// Seconds spent on recognition.
    #[cfg_attr(feature = "serde", serde(default))]
    pub execution_time: Option<f64>,
}

impl ScanSubmission {
    /// Classified status.
    pub fn status_kind(&self) -> TaskStatus {
        TaskStatus::parse(&self.status)
    }

    /// Non-empty error message, if any.
    pub fn error(&self) -> Option<&str> {
        non_empty(self.error.as_ref())
    }
}

/// Result object nested inside an OCR stream event.
///
/// Progress frames carry only a human readable `status`; the final frame
/// carries the recognized `result` or an `error`.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ScanOutcome {
    /// Human readable progress note or Celery state.
    pub status: Option<String>,
    /// Recognized text.
    pub result: Option<String>,
    /// Failure message from the OCR worker.
    pub error: Option<String>,
    /// Whether the result came from the OCR cache.
    pub cached: Option<bool>,
    /// Seconds spent on recognition.
    pub execution_time: Option<f64>,
}

/// The `result` slot of an OCR event: an outcome object, or a bare message
/// string when the backend reports a failed task.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum ScanPayload {
    /// Structured progress or result.
    Outcome(ScanOutcome),
    /// Bare failure message.
    Message(String),
}

/// One `data:` frame from `GET /ocr/stream/{task_id}`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanEvent {
    /// Raw status string.
    pub status: String,
    /// Task the frame belongs to.
    pub task_id: String,
    /// Progress or outcome, absent on early frames.
    #[cfg_attr(feature = "serde", serde(default))]
    pub result: Option<ScanPayload>,
}

impl ScanEvent {
    /// The structured payload, when the frame has one.
    pub fn outcome(&self) -> Option<&ScanOutcome> {
        match &self.result {
            Some(ScanPayload::Outcome(outcome)) => Some(outcome),
            _ => None,
        }
    }

    /// Recognized source text, when the frame carries a non-empty one.
    pub fn recognized_text(&self) -> Option<&str> {
        self.outcome().and_then(|o| non_empty(o.result.as_ref()))
    }
}

impl TaskEvent for ScanEvent {
    fn status(&self) -> &str {
        &self.status
    }

    fn task_id(&self) -> &str {
        &self.task_id
    }

    fn error(&self) -> Option<&str> {
        match &self.result {
            Some(ScanPayload::Outcome(outcome)) => non_empty(outcome.error.as_ref()),
            Some(ScanPayload::Message(message))
                if self.status_kind().is_failure() =>
            {
                non_empty(Some(message))
            }
            _ => None,
        }
    }
}

/// Response to `POST /execute`.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExecutionSubmission {
    /// Id to stream or poll; absent when the submission failed.
    #[cfg_attr(feature = "serde", serde(default))]
    pub task_id: Option<String>,
    /// `queued` or `processing` when accepted.
    pub status: String,
}

impl ExecutionSubmission {
    /// Classified status.
    pub fn status_kind(&self) -> TaskStatus {
        TaskStatus::parse(&self.status)
    }
}

/// One `data:` frame from `GET /execute/stream/{task_id}`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExecutionEvent {
    /// Raw status string.
    pub status: String,
    /// Task the frame belongs to.
    pub task_id: String,
    /// Present on the terminal frame.
    #[cfg_attr(feature = "serde", serde(default))]
    pub result: Option<ExecutionResult>,
}

impl TaskEvent for ExecutionEvent {
    fn status(&self) -> &str {
        &self.status
    }

    fn task_id(&self) -> &str {
        &self.task_id
    }

    fn error(&self) -> Option<&str> {
        None
    }
}

/// Response to `GET /health`.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HealthReport {
    /// `healthy` when the backend is ready.
    pub status: String,
    /// Server time as Unix seconds.
    #[cfg_attr(feature = "serde", serde(default))]
    pub timestamp: Option<f64>,
    /// Device the OCR model runs on, e.g. `cpu`.
    #[cfg_attr(feature = "serde", serde(default))]
    pub device: Option<String>,
    /// Number of live Celery workers.
    #[cfg_attr(feature = "serde", serde(default))]
    pub celery_workers: Option<u32>,
    /// Whether the OCR model is loaded.
    #[cfg_attr(feature = "serde", serde(default))]
    pub model_loaded: Option<bool>,
}

impl HealthReport {
    /// True when `status` is `healthy`.
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}
