use rightcode_model::{ModelError, NoteId};
use thiserror::Error;

use crate::store::StoreError;

/// Failures surfaced by the transport, the task client and the orchestrator.
#[derive(Error, Debug)]
pub enum TaskError {
    /// The base URL or a task id cannot form a request URL.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Connection failure or a non-2xx response.
    #[error("Network error: {0}")]
    Network(String),

    /// A response body did not match the expected schema.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A single `data:` frame that could not be parsed. The decoder logs and
    /// drops these; they never end a stream.
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// The backend reported the task as failed.
    #[error("Server reported error: {0}")]
    ServerReported(String),

    /// A well-formed response the client cannot act on.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The stream closed before a terminal status.
    #[error("Stream for task {0} ended before a terminal event")]
    StreamEnded(String),

    /// No note with this id.
    #[error("Note not found: {0}")]
    NoteNotFound(NoteId),

    /// Execution needs recognized text.
    #[error("Note {0} has not been scanned")]
    NotScanned(NoteId),

    /// The note is busy with another operation.
    #[error("Note {0} already has an operation in flight")]
    AlreadyInFlight(NoteId),

    /// Another note already has this title.
    #[error("A note titled {0:?} already exists")]
    DuplicateTitle(String),

    /// The operation was cancelled before it settled.
    #[error("Operation cancelled for note {0}")]
    Cancelled(NoteId),

    /// Note validation failed.
    #[error("Invalid note: {0}")]
    Model(#[from] ModelError),

    /// Persisting the note list failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl TaskError {
    /// Whether the user can reasonably retry the same operation.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TaskError::Network(_)
                | TaskError::ServerReported(_)
                | TaskError::StreamEnded(_)
                | TaskError::Cancelled(_)
        )
    }
}

impl From<reqwest::Error> for TaskError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            TaskError::InvalidEndpoint(err.to_string())
        } else if err.is_decode() {
            TaskError::Decode(err.to_string())
        } else {
            TaskError::Network(err.to_string())
        }
    }
}

impl From<url::ParseError> for TaskError {
    fn from(err: url::ParseError) -> Self {
        TaskError::InvalidEndpoint(err.to_string())
    }
}

/// Result alias for [`TaskError`].
pub type Result<T> = std::result::Result<T, TaskError>;
