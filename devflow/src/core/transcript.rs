//! Append-only log of stage outputs for one run.

use super::StageId;
use crate::utils::{now_utc, Timestamp};
use serde::{Deserialize, Serialize};

/// One stage output in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Position in the transcript, starting at zero.
    pub sequence: usize,
    /// The stage that produced the content.
    pub stage: StageId,
    /// The raw content.
    pub content: String,
    /// When the entry was appended.
    pub timestamp: Timestamp,
}

/// Ordered record of every stage output of a run.
///
/// Entries can only be appended; `sequence` always equals the entry's index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    /// Creates an empty transcript.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry and returns it.
    pub fn append(&mut self, stage: StageId, content: impl Into<String>) -> &TranscriptEntry {
        let sequence = self.entries.len();
        self.entries.push(TranscriptEntry {
            sequence,
            stage,
            content: content.into(),
            timestamp: now_utc(),
        });
        &self.entries[sequence]
    }

    /// Returns true if `stage` appears anywhere in the log.
    #[must_use]
    pub fn has_spoken(&self, stage: StageId) -> bool {
        self.entries.iter().any(|e| e.stage == stage)
    }

    /// Number of entries produced by `stage`.
    #[must_use]
    pub fn count_from(&self, stage: StageId) -> usize {
        self.entries.iter().filter(|e| e.stage == stage).count()
    }

    /// The most recent entry.
    #[must_use]
    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }

    /// The most recent entry produced by `stage`.
    #[must_use]
    pub fn last_from(&self, stage: StageId) -> Option<&TranscriptEntry> {
        self.entries.iter().rev().find(|e| e.stage == stage)
    }

    /// All entries in order.
    #[must_use]
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Iterates over the entries in order.
    pub fn iter(&self) -> std::slice::Iter<'_, TranscriptEntry> {
        self.entries.iter()
    }

    /// The speakers in order.
    #[must_use]
    pub fn stage_sequence(&self) -> Vec<StageId> {
        self.entries.iter().map(|e| e.stage).collect()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was appended yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consumes the transcript and returns its entries.
    #[must_use]
    pub fn into_entries(self) -> Vec<TranscriptEntry> {
        self.entries
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a TranscriptEntry;
    type IntoIter = std::slice::Iter<'a, TranscriptEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
