use uuid::Uuid;

/// Strongly typed ID for notes
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct NoteId(pub Uuid);

impl Default for NoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteId {
    /// Generate a fresh, time-ordered id.
    pub fn new() -> Self {
        NoteId(Uuid::now_v7())
    }

    /// Borrow the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Copy out the underlying UUID.
    pub fn to_uuid(&self) -> Uuid {
        self.0
    }
}

impl AsRef<Uuid> for NoteId {
    fn as_ref(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for NoteId {
    fn from(value: Uuid) -> Self {
        NoteId(value)
    }
}

impl std::fmt::Display for NoteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
