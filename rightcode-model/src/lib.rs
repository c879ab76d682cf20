//! Core data model definitions shared across RightCode crates.
//!
//! Notes carry a hand-drawn code snippet, the text recognized from it and
//! the outcome of executing that text. Wire payloads for the OCR and
//! execution task endpoints live in [`task`] and [`execution`].

/// Opaque drawing bytes.
pub mod drawing;
/// Validation errors.
pub mod error;
/// Execution results.
pub mod execution;
/// Typed identifiers.
pub mod ids;
/// Supported source languages.
pub mod language;
/// Notes and their pipeline state.
pub mod note;
/// Task endpoint payloads.
pub mod task;

// Intentionally curated re-exports for downstream consumers.
pub use drawing::Drawing;
pub use error::{ModelError, Result as ModelResult};
pub use execution::ExecutionResult;
pub use ids::NoteId;
pub use language::Language;
pub use note::{Note, NoteLifecycle, NoteStatus};
pub use task::{
    ExecutionEvent, ExecutionSubmission, HealthReport, ScanEvent, ScanOutcome,
    ScanPayload, ScanSubmission, TaskEvent, TaskStatus,
};
