//! Note-facing orchestration of scans and executions.
//!
//! The [`Orchestrator`] owns the note list and the current selection. Each
//! scan or execution runs as its own spawned task that submits the job,
//! follows its event stream and reports back over a channel. Updates are
//! applied one at a time by [`Orchestrator::next_event`], so the note list is
//! only ever mutated from the caller's context.
//!
//! ```text
//! Unscanned --scan--> Scanning --completed--> Scanned --execute--> Executing --success--> Executed
//!     ^                  |                       ^                    |
//!     +----- failure ----+                       +----- failure ------+
//! ```
//!
//! Persistence happens once per successful terminal transition and once per
//! direct edit. Failures, progress and cancellation never write.

mod worker;


use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use rightcode_model::{
    Drawing, ExecutionResult, Language, ModelError, Note, NoteId, NoteStatus,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::TaskService;
use crate::error::{Result, TaskError};
use crate::store::NoteStore;

use self::worker::{ExecuteJob, Reporter, ScanJob, TaskUpdate, UpdateKind};

/// The two remote operations a note can have in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// OCR of the drawing.
    Scan,
    /// Execution of the recognized text.
    Execute,
}

/// Observable outcome of applying one worker update.
#[derive(Debug)]
pub enum NoteEvent {
    /// The backend accepted the job under `task_id`.
    Submitted {
        /// Note the operation belongs to.
        note_id: NoteId,
        /// Operation that was submitted.
        operation: Operation,
        /// Backend task id.
        task_id: String,
    },
    /// A non-terminal status arrived on the stream.
    Progress {
        /// Note the operation belongs to.
        note_id: NoteId,
        /// Operation in progress.
        operation: Operation,
        /// Raw status string.
        status: String,
    },
    /// Recognized text was stored on the note and persisted.
    Scanned {
        /// Scanned note.
        note_id: NoteId,
        /// Text now on the note.
        recognized_text: String,
    },
    /// An execution result was stored on the note and persisted.
    Executed {
        /// Executed note.
        note_id: NoteId,
        /// Whether the code ran without error.
        success: bool,
    },
    /// The operation ended without changing the note.
    Failed {
        /// Note the operation belonged to.
        note_id: NoteId,
        /// Operation that failed.
        operation: Operation,
        /// Why it failed.
        error: TaskError,
    },
}

impl NoteEvent {
    /// Note the event is about.
    pub fn note_id(&self) -> NoteId {
        match self {
            NoteEvent::Submitted { note_id, .. }
            | NoteEvent::Progress { note_id, .. }
            | NoteEvent::Scanned { note_id, .. }
            | NoteEvent::Executed { note_id, .. }
            | NoteEvent::Failed { note_id, .. } => *note_id,
        }
    }

    /// True for the last event of an operation.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            NoteEvent::Scanned { .. } | NoteEvent::Executed { .. } | NoteEvent::Failed { .. }
        )
    }
}

struct InFlight {
    operation: Operation,
    generation: u64,
    /// Backend task id, once the submission is accepted.
    task_id: Option<String>,
    handle: JoinHandle<()>,
}

/// Owner of the note list and of every in-flight operation.
///
/// Workers run as spawned tasks and report back over a channel. Their
/// updates are applied one at a time by [`next_event`](Self::next_event),
/// so the list itself needs no locking.
pub struct Orchestrator<S, P>
where
    S: TaskService + 'static,
    P: NoteStore,
{
    service: Arc<S>,
    store: P,
    notes: Vec<Note>,
    selected: Option<NoteId>,
    in_flight: HashMap<NoteId, InFlight>,
    next_generation: u64,
    updates_tx: mpsc::UnboundedSender<TaskUpdate>,
    updates_rx: mpsc::UnboundedReceiver<TaskUpdate>,
}

impl<S, P> fmt::Debug for Orchestrator<S, P>
where
    S: TaskService + 'static,
    P: NoteStore,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("service_type", &type_name::<S>())
            .field("store_type", &type_name::<P>())
            .field("note_count", &self.notes.len())
            .field("selected", &self.selected)
            .field("in_flight_count", &self.in_flight.len())
            .finish()
    }
}

impl<S, P> Orchestrator<S, P>
where
    S: TaskService + 'static,
    P: NoteStore,
{
    /// Orchestrator over an already loaded list.
    pub fn new(service: Arc<S>, store: P, notes: Vec<Note>) -> Self {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        Self {
            service,
            store,
            notes,
            selected: None,
            in_flight: HashMap::new(),
            next_generation: 0,
            updates_tx,
            updates_rx,
        }
    }

    /// Restore the note list from `store`.
    pub async fn load(service: Arc<S>, store: P) -> Result<Self> {
        let notes = store.load().await?;
        info!(count = notes.len(), "loaded notes");
        Ok(Self::new(service, store, notes))
    }

    /// Task backend in use.
    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    /// Store the list is persisted to.
    pub fn store(&self) -> &P {
        &self.store
    }

    /// All notes, in display order.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Look up one note.
    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    /// Pipeline position of a note, including in-flight operations.
    pub fn status(&self, id: NoteId) -> Option<NoteStatus> {
        let note = self.note(id)?;
        Some(match self.in_flight.get(&id).map(|f| f.operation) {
            Some(Operation::Scan) => NoteStatus::Scanning,
            Some(Operation::Execute) => NoteStatus::Executing,
            None => note.lifecycle().status(),
        })
    }

    /// Operation the note has in flight, if any.
    pub fn in_flight(&self, id: NoteId) -> Option<Operation> {
        self.in_flight.get(&id).map(|f| f.operation)
    }

    /// Mark a note as the one being viewed.
    pub fn select(&mut self, id: NoteId) -> Result<()> {
        self.index_of(id)?;
        self.selected = Some(id);
        Ok(())
    }

    /// Clear the selected note.
    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// The selected note, if it still exists.
    pub fn selected(&self) -> Option<&Note> {
        self.selected.and_then(|id| self.note(id))
    }

    /// Append a new unscanned note and persist the list.
    pub async fn create_note(
        &mut self,
        title: impl Into<String>,
        language: Language,
        drawing: Drawing,
    ) -> Result<NoteId> {
        let note = Note::new(title, language, drawing)?;
        let id = note.id;
        self.notes.push(note);

        if let Err(err) = self.persist().await {
            self.notes.pop();
            return Err(err);
        }
        debug!(note_id = %id, "created note");
        Ok(id)
    }

    /// Insert an unscanned copy right after the original.
    pub async fn duplicate_note(&mut self, id: NoteId) -> Result<NoteId> {
        let index = self.index_of(id)?;
        let copy = self.notes[index].duplicate();
        let copy_id = copy.id;
        self.notes.insert(index + 1, copy);

        if let Err(err) = self.persist().await {
            self.notes.remove(index + 1);
            return Err(err);
        }
        debug!(note_id = %id, copy_id = %copy_id, "duplicated note");
        Ok(copy_id)
    }

    /// Remove a note, cancelling whatever it had in flight.
    pub async fn delete_note(&mut self, id: NoteId) -> Result<Note> {
        let index = self.index_of(id)?;
        self.cancel(id);
        let note = self.notes.remove(index);

        if let Err(err) = self.persist().await {
            self.notes.insert(index, note);
            return Err(err);
        }
        if self.selected == Some(id) {
            self.selected = None;
        }
        debug!(note_id = %id, "deleted note");
        Ok(note)
    }

    /// Change a note's title. Titles must stay unique and non-empty.
    pub async fn rename_note(&mut self, id: NoteId, title: impl Into<String>) -> Result<()> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(ModelError::EmptyTitle.into());
        }
        let index = self.index_of(id)?;
        if self.notes.iter().any(|n| n.id != id && n.title == title) {
            return Err(TaskError::DuplicateTitle(title));
        }

        let previous = std::mem::replace(&mut self.notes[index].title, title);
        if let Err(err) = self.persist().await {
            self.notes[index].title = previous;
            return Err(err);
        }
        Ok(())
    }

    /// Manually correct the recognized text of a scanned note.
    pub async fn edit_recognized_text(
        &mut self,
        id: NoteId,
        recognized_text: impl Into<String>,
    ) -> Result<()> {
        let index = self.idle_index(id)?;
        let snapshot = self.notes[index].clone();

        self.notes[index]
            .edit_recognized_text(recognized_text)
            .map_err(|err| match err {
                ModelError::NotScanned => TaskError::NotScanned(id),
                other => other.into(),
            })?;
        self.commit(index, snapshot).await
    }

    /// Replace the drawing. The recognized text is kept until the next scan.
    pub async fn update_drawing(&mut self, id: NoteId, drawing: Drawing) -> Result<()> {
        let index = self.idle_index(id)?;
        let snapshot = self.notes[index].clone();

        self.notes[index].drawing = drawing;
        self.commit(index, snapshot).await
    }

    /// Submit the note's drawing for recognition without waiting.
    ///
    /// Progress is observed through [`next_event`](Self::next_event). Must be
    /// called from within a tokio runtime.
    pub fn start_scan(&mut self, id: NoteId) -> Result<()> {
        let index = self.idle_index(id)?;
        let note = &self.notes[index];
        let job = ScanJob {
            language: note.language,
            title: note.title.clone(),
            image: note.drawing.as_bytes().to_vec(),
        };

        let reporter = self.reporter(id, Operation::Scan);
        let generation = self.next_generation;
        let handle = tokio::spawn(worker::run_scan(Arc::clone(&self.service), job, reporter));
        self.track(id, Operation::Scan, generation, handle);
        Ok(())
    }

    /// Submit the note's recognized text for execution without waiting.
    pub fn start_execution(&mut self, id: NoteId) -> Result<()> {
        let index = self.idle_index(id)?;
        let note = &self.notes[index];
        let source_code = note
            .recognized_text()
            .ok_or(TaskError::NotScanned(id))?
            .to_string();
        let job = ExecuteJob {
            language: note.language,
            source_code,
        };

        let reporter = self.reporter(id, Operation::Execute);
        let generation = self.next_generation;
        let handle = tokio::spawn(worker::run_execution(
            Arc::clone(&self.service),
            job,
            reporter,
        ));
        self.track(id, Operation::Execute, generation, handle);
        Ok(())
    }

    /// Abort the note's in-flight operation, closing its connection.
    ///
    /// The note keeps its pre-operation state. Returns the operation that was
    /// cancelled, if any.
    pub fn cancel(&mut self, id: NoteId) -> Option<Operation> {
        let in_flight = self.in_flight.remove(&id)?;
        in_flight.handle.abort();
        info!(note_id = %id, operation = ?in_flight.operation, "cancelled operation");
        Some(in_flight.operation)
    }

    /// Wait for and apply the next update from any in-flight operation.
    ///
    /// Returns `None` once nothing is in flight. Updates from cancelled or
    /// superseded operations are discarded.
    pub async fn next_event(&mut self) -> Option<NoteEvent> {
        loop {
            if self.in_flight.is_empty() {
                while let Ok(stale) = self.updates_rx.try_recv() {
                    debug!(note_id = %stale.note_id, "discarding stale update");
                }
                return None;
            }

            let update = self.updates_rx.recv().await?;
            if let Some(event) = self.apply(update).await {
                return Some(event);
            }
        }
    }

    /// Scan a note and wait for the outcome.
    ///
    /// Updates for other notes that arrive meanwhile are applied but not
    /// returned.
    pub async fn scan(&mut self, id: NoteId) -> Result<String> {
        self.start_scan(id)?;
        match self.settle(id).await? {
            NoteEvent::Scanned {
                recognized_text, ..
            } => Ok(recognized_text),
            other => Err(TaskError::Protocol(format!(
                "scan settled with unexpected event {other:?}"
            ))),
        }
    }

    /// Execute a scanned note's code and wait for the result.
    pub async fn execute(&mut self, id: NoteId) -> Result<ExecutionResult> {
        self.start_execution(id)?;
        self.settle(id).await?;
        self.note(id)
            .and_then(Note::execution_result)
            .cloned()
            .ok_or(TaskError::NoteNotFound(id))
    }

    async fn settle(&mut self, id: NoteId) -> Result<NoteEvent> {
        while let Some(event) = self.next_event().await {
            if event.note_id() != id || !event.is_settled() {
                continue;
            }
            return match event {
                NoteEvent::Failed { error, .. } => Err(error),
                settled => Ok(settled),
            };
        }
        Err(TaskError::Cancelled(id))
    }

    async fn apply(&mut self, update: TaskUpdate) -> Option<NoteEvent> {
        let TaskUpdate {
            note_id,
            generation,
            kind,
        } = update;

        let operation = match self.in_flight.get(&note_id) {
            Some(f) if f.generation == generation => f.operation,
            _ => {
                debug!(%note_id, generation, "discarding stale update");
                return None;
            }
        };

        let Ok(index) = self.index_of(note_id) else {
            self.in_flight.remove(&note_id);
            warn!(%note_id, "update for a note that no longer exists");
            return None;
        };

        let event = match kind {
            UpdateKind::Submitted { task_id } => {
                if let Some(in_flight) = self.in_flight.get_mut(&note_id) {
                    in_flight.task_id = Some(task_id.clone());
                }
                NoteEvent::Submitted {
                    note_id,
                    operation,
                    task_id,
                }
            }
            UpdateKind::Progress { status } => {
                debug!(%note_id, %status, "progress");
                NoteEvent::Progress {
                    note_id,
                    operation,
                    status,
                }
            }
            UpdateKind::Scanned { recognized_text } => {
                let task_id = self.in_flight.remove(&note_id).and_then(|f| f.task_id);
                let snapshot = self.notes[index].clone();
                let note = &mut self.notes[index];
                if task_id.is_some() {
                    note.most_recent_ocr_task_id = task_id;
                }
                note.record_scan(recognized_text.clone());

                match self.commit(index, snapshot).await {
                    Ok(()) => NoteEvent::Scanned {
                        note_id,
                        recognized_text,
                    },
                    Err(error) => NoteEvent::Failed {
                        note_id,
                        operation,
                        error,
                    },
                }
            }
            UpdateKind::Executed { result } => {
                let task_id = self.in_flight.remove(&note_id).and_then(|f| f.task_id);
                let snapshot = self.notes[index].clone();
                let success = result.success;

                let note = &mut self.notes[index];
                if task_id.is_some() {
                    note.most_recent_exe_task_id = task_id;
                }
                let outcome = match note.record_execution(result) {
                    Ok(()) => self.commit(index, snapshot).await,
                    Err(_) => {
                        self.notes[index] = snapshot;
                        Err(TaskError::NotScanned(note_id))
                    }
                };
                match outcome {
                    Ok(()) => NoteEvent::Executed { note_id, success },
                    Err(error) => NoteEvent::Failed {
                        note_id,
                        operation,
                        error,
                    },
                }
            }
            UpdateKind::Failed { error } => {
                self.in_flight.remove(&note_id);
                NoteEvent::Failed {
                    note_id,
                    operation,
                    error,
                }
            }
        };
        Some(event)
    }

    async fn persist(&self) -> Result<()> {
        self.store.save(&self.notes).await?;
        debug!(count = self.notes.len(), "persisted notes");
        Ok(())
    }

    /// Persist, restoring `snapshot` at `index` if the write fails.
    async fn commit(&mut self, index: usize, snapshot: Note) -> Result<()> {
        if let Err(err) = self.persist().await {
            warn!(note_id = %snapshot.id, error = %err, "persist failed, reverting note");
            self.notes[index] = snapshot;
            return Err(err);
        }
        Ok(())
    }

    fn index_of(&self, id: NoteId) -> Result<usize> {
        self.notes
            .iter()
            .position(|n| n.id == id)
            .ok_or(TaskError::NoteNotFound(id))
    }

    fn idle_index(&self, id: NoteId) -> Result<usize> {
        let index = self.index_of(id)?;
        if self.in_flight.contains_key(&id) {
            return Err(TaskError::AlreadyInFlight(id));
        }
        Ok(index)
    }

    fn reporter(&mut self, id: NoteId, operation: Operation) -> Reporter {
        self.next_generation += 1;
        Reporter::new(self.updates_tx.clone(), id, self.next_generation, operation)
    }

    fn track(&mut self, id: NoteId, operation: Operation, generation: u64, handle: JoinHandle<()>) {
        debug!(note_id = %id, ?operation, generation, "operation started");
        self.in_flight.insert(
            id,
            InFlight {
                operation,
                generation,
                task_id: None,
                handle,
            },
        );
    }
}

impl<S, P> Drop for Orchestrator<S, P>
where
    S: TaskService + 'static,
    P: NoteStore,
{
    fn drop(&mut self) {
        for (_, in_flight) in self.in_flight.drain() {
            in_flight.handle.abort();
        }
    }
}
