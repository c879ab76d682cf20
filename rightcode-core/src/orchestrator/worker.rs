//! Submit-then-stream workers, one spawned task per in-flight operation.
//!
//! Workers never touch notes. They report [`TaskUpdate`]s over the
//! orchestrator's channel and always end with exactly one terminal update,
//! even when aborted or unwound.

use std::sync::Arc;

use futures::StreamExt;
use rightcode_model::{ExecutionResult, Language, NoteId, TaskEvent};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use crate::client::TaskService;
use crate::error::TaskError;

use super::Operation;

#[derive(Debug)]
pub(crate) enum UpdateKind {
    Submitted { task_id: String },
    Progress { status: String },
    Scanned { recognized_text: String },
    Executed { result: ExecutionResult },
    Failed { error: TaskError },
}

impl UpdateKind {
    fn is_terminal(&self) -> bool {
        matches!(
            self,
            UpdateKind::Scanned { .. } | UpdateKind::Executed { .. } | UpdateKind::Failed { .. }
        )
    }
}

#[derive(Debug)]
pub(crate) struct TaskUpdate {
    pub(crate) note_id: NoteId,
    pub(crate) generation: u64,
    pub(crate) kind: UpdateKind,
}

/// Sending half owned by one worker.
///
/// If the worker is dropped before it reported a terminal update, the
/// reporter sends `Cancelled` on its behalf.
pub(crate) struct Reporter {
    tx: UnboundedSender<TaskUpdate>,
    note_id: NoteId,
    generation: u64,
    operation: Operation,
    settled: bool,
}

impl Reporter {
    pub(crate) fn new(
        tx: UnboundedSender<TaskUpdate>,
        note_id: NoteId,
        generation: u64,
        operation: Operation,
    ) -> Self {
        Self {
            tx,
            note_id,
            generation,
            operation,
            settled: false,
        }
    }

    fn send(&mut self, kind: UpdateKind) {
        if self.settled {
            return;
        }
        self.settled = kind.is_terminal();

        let update = TaskUpdate {
            note_id: self.note_id,
            generation: self.generation,
            kind,
        };
        if self.tx.send(update).is_err() {
            debug!(note_id = %self.note_id, "orchestrator gone, dropping update");
        }
    }

    fn fail(&mut self, error: TaskError) {
        error!(
            note_id = %self.note_id,
            operation = ?self.operation,
            error = %error,
            "operation failed"
        );
        self.send(UpdateKind::Failed { error });
    }
}

impl Drop for Reporter {
    fn drop(&mut self) {
        if !self.settled {
            self.send(UpdateKind::Failed {
                error: TaskError::Cancelled(self.note_id),
            });
        }
    }
}

pub(crate) struct ScanJob {
    pub(crate) language: Language,
    pub(crate) title: String,
    pub(crate) image: Vec<u8>,
}

pub(crate) async fn run_scan<S>(service: Arc<S>, job: ScanJob, mut reporter: Reporter)
where
    S: TaskService + ?Sized,
{
    let submitted = match service
        .submit_scan(job.language, &job.title, job.image)
        .await
    {
        Ok(submitted) => submitted,
        Err(err) => return reporter.fail(err),
    };
    let task_id = submitted.task_id;
    reporter.send(UpdateKind::Submitted {
        task_id: task_id.clone(),
    });

    let mut events = match service.stream_scan(&task_id).await {
        Ok(events) => events,
        Err(err) => return reporter.fail(err),
    };

    while let Some(event) = events.next().await {
        let event = match event {
            Ok(event) => event,
            Err(err) => return reporter.fail(err),
        };

        if let Some(message) = event.error() {
            return reporter.fail(TaskError::ServerReported(message.to_string()));
        }

        let status = event.status_kind();
        if status.is_success() {
            return match event.recognized_text() {
                Some(text) => {
                    info!(%task_id, note_id = %reporter.note_id, "scan completed");
                    reporter.send(UpdateKind::Scanned {
                        recognized_text: text.to_string(),
                    });
                }
                None => reporter.fail(TaskError::ServerReported(format!(
                    "scan {task_id} completed without recognized text"
                ))),
            };
        }
        if status.is_failure() {
            return reporter.fail(TaskError::ServerReported(format!(
                "scan {task_id} reported status {status}"
            )));
        }

        reporter.send(UpdateKind::Progress {
            status: event.status,
        });
    }

    warn!(%task_id, "scan stream closed before a terminal event");
    reporter.fail(TaskError::StreamEnded(task_id));
}

pub(crate) struct ExecuteJob {
    pub(crate) language: Language,
    pub(crate) source_code: String,
}

pub(crate) async fn run_execution<S>(service: Arc<S>, job: ExecuteJob, mut reporter: Reporter)
where
    S: TaskService + ?Sized,
{
    let submitted = match service
        .submit_execution(&job.source_code, job.language)
        .await
    {
        Ok(submitted) => submitted,
        Err(err) => return reporter.fail(err),
    };
    let task_id = submitted.task_id;
    reporter.send(UpdateKind::Submitted {
        task_id: task_id.clone(),
    });

    let mut events = match service.stream_execution(&task_id).await {
        Ok(events) => events,
        Err(err) => return reporter.fail(err),
    };

    while let Some(event) = events.next().await {
        let event = match event {
            Ok(event) => event,
            Err(err) => return reporter.fail(err),
        };

        let status = event.status_kind();
        if status.is_success() {
            return match event.result {
                Some(result) => {
                    info!(
                        %task_id,
                        note_id = %reporter.note_id,
                        success = result.success,
                        "execution finished"
                    );
                    reporter.send(UpdateKind::Executed { result });
                }
                None => reporter.fail(TaskError::ServerReported(format!(
                    "execution {task_id} succeeded without a result"
                ))),
            };
        }
        if status.is_failure() {
            return reporter.fail(TaskError::ServerReported(format!(
                "execution {task_id} reported status {status}"
            )));
        }

        reporter.send(UpdateKind::Progress {
            status: event.status,
        });
    }

    warn!(%task_id, "execution stream closed before a terminal event");
    reporter.fail(TaskError::StreamEnded(task_id));
}
