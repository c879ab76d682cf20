/// Raw drawing payload captured by the canvas.
///
/// The bytes are opaque to this crate; the presentation layer decides the
/// image format (the OCR endpoint is sent them as `image/jpeg`). When
/// serialized the payload is base64 encoded so the note list stays a plain
/// JSON document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Drawing(Vec<u8>);

impl Drawing {
    /// Wrap raw image bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Drawing(bytes.into())
    }

    /// The raw bytes, as uploaded to the OCR endpoint.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume the drawing, returning its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// True when nothing has been drawn.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Drawing {
    fn from(value: Vec<u8>) -> Self {
        Drawing(value)
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
    use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

    use super::Drawing;

    impl Serialize for Drawing {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&BASE64_STANDARD.encode(&self.0))
        }
    }

    impl<'de> Deserialize<'de> for Drawing {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let encoded = String::deserialize(deserializer)?;
            BASE64_STANDARD
                .decode(encoded.as_bytes())
                .map(Drawing)
                .map_err(de::Error::custom)
        }
    }
}
