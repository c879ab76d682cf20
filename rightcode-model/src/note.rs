use chrono::{DateTime, Utc};

use crate::drawing::Drawing;
use crate::error::{ModelError, Result};
use crate::execution::ExecutionResult;
use crate::ids::NoteId;
use crate::language::Language;

/// Settled position of a note in the scan/execute pipeline.
///
/// This is what gets persisted. Executing a note requires recognized text,
/// so an executed note always carries the text its result was produced from.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "state", rename_all = "snake_case")
)]
pub enum NoteLifecycle {
    /// No text has been recognized yet.
    #[default]
    Unscanned,
    /// Text was recognized and can be executed.
    Scanned {
        /// Source text recognized from the drawing.
        recognized_text: String,
    },
    /// The recognized text was executed.
    Executed {
        /// Source text the result was produced from.
        recognized_text: String,
        /// Outcome of the last execution.
        result: ExecutionResult,
    },
}

/// Full pipeline view of a note, including in-flight operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteStatus {
    /// Never scanned.
    Unscanned,
    /// OCR in flight.
    Scanning,
    /// Text recognized, not executed since.
    Scanned,
    /// Execution in flight.
    Executing,
    /// Result available for the current text.
    Executed,
}

impl NoteLifecycle {
    /// Status of a note with nothing in flight.
    pub fn status(&self) -> NoteStatus {
        match self {
            NoteLifecycle::Unscanned => NoteStatus::Unscanned,
            NoteLifecycle::Scanned { .. } => NoteStatus::Scanned,
            NoteLifecycle::Executed { .. } => NoteStatus::Executed,
        }
    }
}

/// A handwritten code note.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Note {
    /// Stable identity, unique within a note list.
    pub id: NoteId,
    /// Display title, never empty.
    pub title: String,
    /// Language the drawn code is written in.
    pub language: Language,
    /// Creation time in UTC.
    pub created_at: DateTime<Utc>,
    /// The hand-drawn snippet.
    #[cfg_attr(feature = "serde", serde(default))]
    pub drawing: Drawing,
    /// Backend id of the OCR task that produced the current text.
    #[cfg_attr(feature = "serde", serde(default))]
    pub most_recent_ocr_task_id: Option<String>,
    /// Backend id of the execution task that produced the current result.
    #[cfg_attr(feature = "serde", serde(default))]
    pub most_recent_exe_task_id: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    lifecycle: NoteLifecycle,
}

impl Note {
    /// Create an unscanned note stamped with the current time.
    pub fn new(title: impl Into<String>, language: Language, drawing: Drawing) -> Result<Self> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(ModelError::EmptyTitle);
        }

        Ok(Note {
            id: NoteId::new(),
            title,
            language,
            created_at: Utc::now(),
            drawing,
            most_recent_ocr_task_id: None,
            most_recent_exe_task_id: None,
            lifecycle: NoteLifecycle::Unscanned,
        })
    }

    /// Fresh unscanned copy sharing the drawing and language.
    pub fn duplicate(&self) -> Self {
        Note {
            id: NoteId::new(),
            title: format!("{}-copy", self.title),
            language: self.language,
            created_at: Utc::now(),
            drawing: self.drawing.clone(),
            most_recent_ocr_task_id: None,
            most_recent_exe_task_id: None,
            lifecycle: NoteLifecycle::Unscanned,
        }
    }

    /// Settled pipeline state.
    pub fn lifecycle(&self) -> &NoteLifecycle {
        &self.lifecycle
    }

    /// True once a terminal OCR event has populated the recognized text.
    pub fn has_been_scanned(&self) -> bool {
        !matches!(self.lifecycle, NoteLifecycle::Unscanned)
    }

    /// Recognized text, once scanned.
    pub fn recognized_text(&self) -> Option<&str> {
        match &self.lifecycle {
            NoteLifecycle::Unscanned => None,
            NoteLifecycle::Scanned { recognized_text }
            | NoteLifecycle::Executed {
                recognized_text, ..
            } => Some(recognized_text),
        }
    }

    /// Result of the last execution of the current text.
    pub fn execution_result(&self) -> Option<&ExecutionResult> {
        match &self.lifecycle {
            NoteLifecycle::Executed { result, .. } => Some(result),
            _ => None,
        }
    }

    /// Store freshly recognized text. A previous execution result belongs
    /// to the old text and is discarded.
    pub fn record_scan(&mut self, recognized_text: impl Into<String>) {
        self.lifecycle = NoteLifecycle::Scanned {
            recognized_text: recognized_text.into(),
        };
    }

    /// Store an execution result for the current text.
    ///
    /// Fails with [`ModelError::NotScanned`] when there is no text to attach it to.
    pub fn record_execution(&mut self, result: ExecutionResult) -> Result<()> {
        let recognized_text = self
            .recognized_text()
            .ok_or(ModelError::NotScanned)?
            .to_string();
        self.lifecycle = NoteLifecycle::Executed {
            recognized_text,
            result,
        };
        Ok(())
    }

    /// Replace the recognized text with a manual correction.
    pub fn edit_recognized_text(&mut self, recognized_text: impl Into<String>) -> Result<()> {
        if !self.has_been_scanned() {
            return Err(ModelError::NotScanned);
        }
        self.record_scan(recognized_text);
        Ok(())
    }
}
