//! Remote task client and note orchestration for RightCode.
//!
//! Layers, leaves first:
//!
//! - [`transport`]: HTTP requests against one base endpoint, including
//!   long-lived `text/event-stream` responses exposed as lines.
//! - [`sse`]: turns those lines into typed task events, dropping malformed
//!   frames.
//! - [`client`]: OCR and execution submission plus progress streaming,
//!   behind the [`TaskService`] seam.
//! - [`orchestrator`]: the note list and its scan/execute state machine,
//!   persisted through a [`NoteStore`].

/// Task submission and streaming.
pub mod client;
/// Client configuration.
pub mod config;
/// Error type shared by every layer.
pub mod error;
/// Note list and scan/execute state machine.
pub mod orchestrator;
/// Backend routes.
pub mod routes;
/// Event stream decoding.
pub mod sse;
/// Note list persistence.
pub mod store;
/// HTTP transport.
pub mod transport;

pub use client::{EventStream, Submitted, TaskClient, TaskService, for_each_event};
pub use config::{ClientConfig, ConfigError};
pub use error::{Result, TaskError};
pub use orchestrator::{NoteEvent, Operation, Orchestrator};
pub use store::{JsonFileNoteStore, MemoryNoteStore, NoteStore, StoreError};
pub use transport::Transport;

pub use rightcode_model as model;
