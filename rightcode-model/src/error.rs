use std::fmt::{self, Display};

/// Errors produced by model constructors and parsers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// A language tag outside the supported set.
    UnknownLanguage(String),
    /// A note title that is empty once trimmed.
    EmptyTitle,
    /// The operation needs recognized text but the note was never scanned.
    NotScanned,
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::UnknownLanguage(tag) => {
                write!(f, "unknown language tag: {tag}")
            }
            ModelError::EmptyTitle => write!(f, "note title must not be empty"),
            ModelError::NotScanned => write!(f, "note has not been scanned"),
        }
    }
}

impl std::error::Error for ModelError {}

/// Result alias for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
