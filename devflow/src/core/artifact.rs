//! Files materialized from delimited blocks in stage output.

use super::StageId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A named file extracted from a transcript entry.
///
/// `name` is a relative path inside the workspace. The content is kept as raw
/// bytes and serialized as base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Relative path of the file.
    pub name: String,

    /// File body.
    #[serde(with = "base64_bytes")]
    pub content: Vec<u8>,

    /// The stage whose output contained the block.
    pub produced_by: StageId,

    /// Sequence number of the transcript entry the block came from.
    pub sequence: usize,
}

impl Artifact {
    /// Creates a new artifact.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        content: impl Into<Vec<u8>>,
        produced_by: StageId,
        sequence: usize,
    ) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
            produced_by,
            sequence,
        }
    }

    /// Size of the body in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Returns true if the body is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// The body as text, if it is valid UTF-8.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        std::str::from_utf8(&self.content).ok()
    }

    /// Hex-encoded SHA-256 of the body.
    #[must_use]
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(&self.content))
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
