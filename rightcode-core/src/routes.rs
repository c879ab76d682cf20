//! Backend route definitions, as path segments relative to the base URL.
//!
//! Task ids are appended as a final, percent-encoded segment by
//! [`Transport::endpoint`](crate::transport::Transport::endpoint).

/// Handwriting recognition tasks.
pub mod ocr {
    /// `POST /ocr` (multipart) and `GET /ocr/{task_id}`
    pub const TASKS: &[&str] = &["ocr"];
    /// `GET /ocr/stream/{task_id}`
    pub const STREAM: &[&str] = &["ocr", "stream"];
}

/// Code execution tasks.
pub mod execute {
    /// `POST /execute` (JSON) and `GET /execute/{task_id}`
    pub const TASKS: &[&str] = &["execute"];
    /// `GET /execute/stream/{task_id}`
    pub const STREAM: &[&str] = &["execute", "stream"];
}

/// Operations on any task.
pub mod tasks {
    /// `DELETE /task/{task_id}`
    pub const ITEM: &[&str] = &["task"];
}

/// `GET /health`
pub const HEALTH: &[&str] = &["health"];
