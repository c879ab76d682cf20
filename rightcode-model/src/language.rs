use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::error::ModelError;

/// Source language of a note's code snippet.
///
/// The wire tag is the lowercase name, which is what both the OCR and the
/// execution endpoints expect in their `language` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Language {
    /// Swift.
    Swift,
    /// Python, the default for new notes.
    #[default]
    Python,
    /// JavaScript (`javascript` on the wire).
    Javascript,
    /// Java.
    Java,
}

impl Language {
    /// Every supported language, in display order.
    pub const ALL: [Language; 4] = [
        Language::Swift,
        Language::Python,
        Language::Javascript,
        Language::Java,
    ];

    /// Lowercase tag sent to the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Swift => "swift",
            Language::Python => "python",
            Language::Javascript => "javascript",
            Language::Java => "java",
        }
    }
}

impl Display for Language {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim();
        Language::ALL
            .into_iter()
            .find(|lang| lang.as_str().eq_ignore_ascii_case(tag))
            .ok_or_else(|| ModelError::UnknownLanguage(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tags_case_insensitively() {
        assert_eq!("Python".parse::<Language>(), Ok(Language::Python));
        assert_eq!(" java ".parse::<Language>(), Ok(Language::Java));
        assert_eq!(
            "cobol".parse::<Language>(),
            Err(ModelError::UnknownLanguage("cobol".into()))
        );
    }

    #[test]
    fn wire_tag_is_lowercase() {
        for lang in Language::ALL {
            assert_eq!(lang.to_string(), lang.as_str().to_lowercase());
        }
    }
}
