//! Persistence collaborators for the note list.
//!
//! The list is stored as one JSON document. The orchestrator calls
//! [`NoteStore::save`] after terminal transitions and direct edits; it
//! never writes partial progress.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rightcode_model::{Note, NoteId};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

/// Failures loading or saving the note list.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored document is not a valid note list.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Two stored notes share an id.
    #[error("Duplicate note id in stored list: {0}")]
    DuplicateId(NoteId),

    /// The store refused the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Durable home of the note list.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Read the whole list. A store that was never written yields an empty list.
    async fn load(&self) -> Result<Vec<Note>, StoreError>;
    /// Replace the stored list with `notes`.
    async fn save(&self, notes: &[Note]) -> Result<(), StoreError>;
}

/// Encode a list as a JSON array.
pub fn encode_notes(notes: &[Note]) -> Result<Vec<u8>, StoreError> {
    Ok(serde_json::to_vec(notes)?)
}

/// Decode a stored list, rejecting lists where an id repeats.
pub fn decode_notes(bytes: &[u8]) -> Result<Vec<Note>, StoreError> {
    let notes: Vec<Note> = serde_json::from_slice(bytes)?;
    let mut seen = HashSet::with_capacity(notes.len());
    for note in &notes {
        if !seen.insert(note.id) {
            return Err(StoreError::DuplicateId(note.id));
        }
    }
    Ok(notes)
}

#[derive(Debug, Default)]
struct MemoryState {
    data: Option<Vec<u8>>,
    saves: usize,
    fail_saves: bool,
}

/// In-process store holding the encoded list, like a preferences blob.
#[derive(Debug, Default)]
pub struct MemoryNoteStore {
    state: Mutex<MemoryState>,
}

impl MemoryNoteStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `notes`.
    pub fn with_notes(notes: &[Note]) -> Result<Self, StoreError> {
        Ok(Self {
            state: Mutex::new(MemoryState {
                data: Some(encode_notes(notes)?),
                ..Default::default()
            }),
        })
    }

    /// Number of successful saves so far.
    pub async fn save_count(&self) -> usize {
        self.state.lock().await.saves
    }

    /// Make subsequent saves fail, to exercise error paths.
    pub async fn set_fail_saves(&self, fail: bool) {
        self.state.lock().await.fail_saves = fail;
    }
}

#[async_trait]
impl NoteStore for MemoryNoteStore {
    async fn load(&self) -> Result<Vec<Note>, StoreError> {
        match &self.state.lock().await.data {
            Some(bytes) => decode_notes(bytes),
            None => Ok(Vec::new()),
        }
    }

    async fn save(&self, notes: &[Note]) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.fail_saves {
            return Err(StoreError::Unavailable("saves disabled".to_string()));
        }
        state.data = Some(encode_notes(notes)?);
        state.saves += 1;
        Ok(())
    }
}

/// Store backed by a single JSON file.
///
/// Writes go to a sibling temp file that is then renamed over the target,
/// so a crash mid-write leaves the previous list intact.
#[derive(Debug, Clone)]
pub struct JsonFileNoteStore {
    path: PathBuf,
}

impl JsonFileNoteStore {
    /// Store writing to `path`. The file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "notes.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl NoteStore for JsonFileNoteStore {
    async fn load(&self) -> Result<Vec<Note>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => decode_notes(&bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    async fn save(&self, notes: &[Note]) -> Result<(), StoreError> {
        let bytes = encode_notes(notes)?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, &bytes).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        debug!(path = %self.path.display(), count = notes.len(), "saved notes");
        Ok(())
    }
}
