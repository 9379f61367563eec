//! Artifact extraction from stage output.
//!
//! Stages embed files in their output as delimited blocks:
//!
//! ```text
//! ===BEGIN_FILE:calculator.py===
//! def add(a, b):
//!     return a + b
//! ===END_FILE===
//! ```
//!
//! The scan is line-oriented. Delimiter lines must stand on their own line
//! (surrounding whitespace is ignored), so code that merely mentions a
//! marker inside a longer line is never mistaken for a block boundary.

mod workspace;

pub(crate) use workspace::CACHE_DIR;
pub use workspace::Workspace;

use crate::core::{Artifact, StageId, Transcript, TranscriptEntry};
use crate::errors::ConfigError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path};
use tracing::{debug, warn};

/// Delimiter tokens for file blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelimiterConfig {
    /// Text before the file name on a begin line.
    #[serde(default = "default_begin_prefix")]
    pub begin_prefix: String,
    /// Text after the file name on a begin line.
    #[serde(default = "default_begin_suffix")]
    pub begin_suffix: String,
    /// The whole end line.
    #[serde(default = "default_end_marker")]
    pub end_marker: String,
}

fn default_begin_prefix() -> String {
    "===BEGIN_FILE:".to_string()
}

fn default_begin_suffix() -> String {
    "===".to_string()
}

fn default_end_marker() -> String {
    "===END_FILE===".to_string()
}

impl Default for DelimiterConfig {
    fn default() -> Self {
        Self {
            begin_prefix: default_begin_prefix(),
            begin_suffix: default_begin_suffix(),
            end_marker: default_end_marker(),
        }
    }
}

impl DelimiterConfig {
    /// Validates the tokens.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDelimiter`] if a token is blank, contains
    /// whitespace, or the begin prefix is also a valid end line.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, token) in [
            ("begin_prefix", &self.begin_prefix),
            ("end_marker", &self.end_marker),
        ] {
            if token.is_empty() {
                return Err(ConfigError::InvalidDelimiter(format!("{field} must not be empty")));
            }
        }
        for (field, token) in [
            ("begin_prefix", &self.begin_prefix),
            ("begin_suffix", &self.begin_suffix),
            ("end_marker", &self.end_marker),
        ] {
            if token.chars().any(char::is_whitespace) {
                return Err(ConfigError::InvalidDelimiter(format!(
                    "{field} must not contain whitespace"
                )));
            }
        }
        if self.end_marker.starts_with(&self.begin_prefix) {
            return Err(ConfigError::InvalidDelimiter(
                "end_marker must not start with begin_prefix".to_string(),
            ));
        }
        Ok(())
    }

    /// Renders a complete block for `name` and `body`.
    #[must_use]
    pub fn render(&self, name: &str, body: &str) -> String {
        format!(
            "{}{}{}\n{}\n{}",
            self.begin_prefix, name, self.begin_suffix, body, self.end_marker
        )
    }
}

/// Why a block did not produce a persisted artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionFailureKind {
    /// A begin line had no matching end line.
    Unterminated,
    /// The file name is empty, absolute or escapes the workspace.
    UnsafeName,
    /// The workspace write failed.
    WriteFailed,
}

impl fmt::Display for ExtractionFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unterminated => write!(f, "unterminated"),
            Self::UnsafeName => write!(f, "unsafe_name"),
            Self::WriteFailed => write!(f, "write_failed"),
        }
    }
}

/// A block that was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionFailure {
    /// The file name from the begin line.
    pub name: String,
    /// Sequence of the transcript entry holding the block.
    pub sequence: usize,
    /// Stage that produced the entry.
    pub stage: StageId,
    /// Failure category.
    pub kind: ExtractionFailureKind,
    /// Human-readable detail.
    pub reason: String,
}

impl ExtractionFailure {
    pub(crate) fn write_failed(artifact: &Artifact, reason: impl Into<String>) -> Self {
        Self {
            name: artifact.name.clone(),
            sequence: artifact.sequence,
            stage: artifact.produced_by,
            kind: ExtractionFailureKind::WriteFailed,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' from {} (message {}): {}: {}",
            self.name, self.stage, self.sequence, self.kind, self.reason
        )
    }
}

/// Result of scanning a transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    /// Artifacts ordered by name; on collisions the latest block wins.
    pub artifacts: Vec<Artifact>,
    /// Blocks that were skipped, in scan order.
    pub failures: Vec<ExtractionFailure>,
}

impl Extraction {
    /// Number of distinct artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    /// Returns true if no artifact was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Looks up an artifact by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.name == name)
    }

    /// Artifact names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.artifacts.iter().map(|a| a.name.as_str()).collect()
    }
}

struct OpenBlock<'a> {
    name: &'a str,
    lines: Vec<&'a str>,
}

/// Line scanner turning delimited blocks into [`Artifact`]s.
#[derive(Debug, Clone)]
pub struct ArtifactExtractor {
    begin: Regex,
    end_marker: String,
}

impl ArtifactExtractor {
    /// Creates an extractor for the given delimiters.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidDelimiter`] if the tokens are invalid.
    pub fn new(delimiters: &DelimiterConfig) -> Result<Self, ConfigError> {
        delimiters.validate()?;
        Self::build(delimiters)
    }

    fn build(delimiters: &DelimiterConfig) -> Result<Self, ConfigError> {
        let pattern = format!(
            r"^\s*{}(\S*?){}\s*$",
            regex::escape(&delimiters.begin_prefix),
            regex::escape(&delimiters.begin_suffix)
        );
        let begin = Regex::new(&pattern).map_err(|e| ConfigError::InvalidDelimiter(e.to_string()))?;
        Ok(Self {
            begin,
            end_marker: delimiters.end_marker.clone(),
        })
    }

    /// Scans every entry of `transcript`.
    #[must_use]
    pub fn extract(&self, transcript: &Transcript) -> Extraction {
        let mut artifacts = BTreeMap::new();
        let mut failures = Vec::new();

        for entry in transcript {
            self.scan_entry(entry, &mut artifacts, &mut failures);
        }

        Extraction {
            artifacts: artifacts.into_values().collect(),
            failures,
        }
    }

    /// Sequences of entries that contain fenced code but no file block.
    ///
    /// Used to explain an empty extraction.
    #[must_use]
    pub fn fenced_without_blocks(&self, transcript: &Transcript) -> Vec<usize> {
        transcript
            .iter()
            .filter(|e| e.content.contains("```"))
            .filter(|e| !e.content.lines().any(|l| self.begin.is_match(l)))
            .map(|e| e.sequence)
            .collect()
    }

    fn scan_entry(
        &self,
        entry: &TranscriptEntry,
        artifacts: &mut BTreeMap<String, Artifact>,
        failures: &mut Vec<ExtractionFailure>,
    ) {
        let mut open: Option<OpenBlock<'_>> = None;

        for line in entry.content.split_inclusive('\n') {
            let bare = line.trim_end_matches(['\n', '\r']);

            if let Some(caps) = self.begin.captures(bare) {
                let name = caps.get(1).map_or("", |m| m.as_str());
                if let Some(block) = open.take() {
                    failures.push(unterminated(entry, block.name, "a new block began before the end line"));
                }
                open = Some(OpenBlock { name, lines: Vec::new() });
                continue;
            }

            if bare.trim() == self.end_marker {
                match open.take() {
                    Some(block) => self.close_block(entry, block, artifacts, failures),
                    None => debug!(sequence = entry.sequence, "End line without an open block"),
                }
                continue;
            }

            if let Some(block) = open.as_mut() {
                block.lines.push(line);
            }
        }

        if let Some(block) = open {
            failures.push(unterminated(entry, block.name, "the message ended before the end line"));
        }
    }

    fn close_block(
        &self,
        entry: &TranscriptEntry,
        block: OpenBlock<'_>,
        artifacts: &mut BTreeMap<String, Artifact>,
        failures: &mut Vec<ExtractionFailure>,
    ) {
        if !is_safe_name(block.name) {
            warn!(name = block.name, sequence = entry.sequence, "Rejected unsafe artifact name");
            failures.push(ExtractionFailure {
                name: block.name.to_string(),
                sequence: entry.sequence,
                stage: entry.stage,
                kind: ExtractionFailureKind::UnsafeName,
                reason: "name must be a non-empty relative path inside the workspace".to_string(),
            });
            return;
        }

        let body = block_body(&block.lines);
        debug!(
            name = block.name,
            stage = %entry.stage,
            sequence = entry.sequence,
            bytes = body.len(),
            "Found file block"
        );
        artifacts.insert(
            block.name.to_string(),
            Artifact::new(block.name, body, entry.stage, entry.sequence),
        );
    }
}

fn unterminated(entry: &TranscriptEntry, name: &str, reason: &str) -> ExtractionFailure {
    warn!(name, sequence = entry.sequence, "Unterminated file block: {}", reason);
    ExtractionFailure {
        name: name.to_string(),
        sequence: entry.sequence,
        stage: entry.stage,
        kind: ExtractionFailureKind::Unterminated,
        reason: reason.to_string(),
    }
}

/// Joins body lines, dropping blank lines at both ends and the final line break.
fn block_body(lines: &[&str]) -> String {
    let is_blank = |l: &&str| l.trim().is_empty();
    let start = lines.iter().position(|l| !is_blank(l)).unwrap_or(lines.len());
    let end = lines.iter().rposition(|l| !is_blank(l)).map_or(start, |i| i + 1);

    let mut body: String = lines[start..end].concat();
    if body.ends_with('\n') {
        body.pop();
        if body.ends_with('\r') {
            body.pop();
        }
    }
    body
}

fn is_safe_name(name: &str) -> bool {
    let path = Path::new(name);
    let mut has_normal = false;
    for component in path.components() {
        match component {
            Component::Normal(_) => has_normal = true,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    has_normal && !name.ends_with('/')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::file_block;
    use pretty_assertions::assert_eq;

    fn extractor() -> ArtifactExtractor {
        ArtifactExtractor::new(&DelimiterConfig::default()).unwrap()
    }

    fn transcript(entries: &[(StageId, &str)]) -> Transcript {
        let mut t = Transcript::new();
        for (stage, content) in entries {
            t.append(*stage, *content);
        }
        t
    }

    #[test]
    fn test_single_block() {
        let content = "Here is the code:\n===BEGIN_FILE:calc.py===\ndef add(a, b):\n    return a + b\n===END_FILE===\nDone.";
        let extraction = extractor()
            .extract(&transcript(&[(StageId::Implementation, content)]));

        assert_eq!(extraction.len(), 1);
        let artifact = extraction.get("calc.py").unwrap();
        assert_eq!(artifact.as_text(), Some("def add(a, b):\n    return a + b"));
        assert_eq!(artifact.produced_by, StageId::Implementation);
        assert_eq!(artifact.sequence, 0);
        assert!(extraction.failures.is_empty());
    }

    #[test]
    fn test_blank_edges_trimmed_and_indentation_kept() {
        let content = "===BEGIN_FILE:a.py===\n\n   \n    indented\n\n\tx = 1  \n\n===END_FILE===";
        let extraction = extractor().extract(&transcript(&[(StageId::Implementation, content)]));

        assert_eq!(
            extraction.get("a.py").unwrap().as_text(),
            Some("    indented\n\n\tx = 1  ")
        );
    }

    #[test]
    fn test_delimiters_with_surrounding_whitespace() {
        let content = "  ===BEGIN_FILE:notes.md===  \r\n# Notes\r\n\t===END_FILE===\t";
        let extraction = extractor().extract(&transcript(&[(StageId::Documentation, content)]));

        assert_eq!(extraction.get("notes.md").unwrap().as_text(), Some("# Notes"));
    }

    #[test]
    fn test_inline_marker_is_not_a_delimiter() {
        let content = "===BEGIN_FILE:gen.py===\nprint(\"===END_FILE=== is the end token\")\n===END_FILE===";
        let extraction = extractor().extract(&transcript(&[(StageId::Implementation, content)]));

        assert_eq!(
            extraction.get("gen.py").unwrap().as_text(),
            Some("print(\"===END_FILE=== is the end token\")")
        );
    }

    #[test]
    fn test_no_blocks_is_empty() {
        let extraction = extractor()
            .extract(&transcript(&[(StageId::Requirements, "Just prose, no files.")]));
        assert!(extraction.is_empty());
        assert!(extraction.failures.is_empty());
    }

    #[test]
    fn test_unterminated_block_does_not_hide_later_block() {
        let content = format!(
            "===BEGIN_FILE:broken.py===\nx = 1\n{}",
            file_block("ok.py", "y = 2")
        );
        let extraction = extractor()
            .extract(&transcript(&[(StageId::Implementation, content.as_str())]));

        assert_eq!(extraction.names(), vec!["ok.py"]);
        assert_eq!(extraction.failures.len(), 1);
        assert_eq!(extraction.failures[0].name, "broken.py");
        assert_eq!(extraction.failures[0].kind, ExtractionFailureKind::Unterminated);
    }

    #[test]
    fn test_unterminated_at_end_of_entry() {
        let extraction = extractor().extract(&transcript(&[
            (StageId::Implementation, "===BEGIN_FILE:half.py===\nx = 1"),
            (StageId::Documentation, "===END_FILE==="),
        ]));

        assert!(extraction.is_empty());
        assert_eq!(extraction.failures.len(), 1);
        assert_eq!(extraction.failures[0].sequence, 0);
    }

    #[test]
    fn test_later_block_wins_and_output_sorted() {
        let first = format!("{}\n{}", file_block("z.py", "old"), file_block("a.py", "a"));
        let second = file_block("z.py", "new");
        let extraction = extractor().extract(&transcript(&[
            (StageId::Implementation, first.as_str()),
            (StageId::Implementation, second.as_str()),
        ]));

        assert_eq!(extraction.names(), vec!["a.py", "z.py"]);
        let z = extraction.get("z.py").unwrap();
        assert_eq!(z.as_text(), Some("new"));
        assert_eq!(z.sequence, 1);
    }

    #[test]
    fn test_unsafe_names_rejected() {
        let content = [
            file_block("../escape.py", "x"),
            file_block("/etc/passwd", "x"),
            "===BEGIN_FILE:===\nx\n===END_FILE===".to_string(),
            file_block("pkg/mod.py", "ok"),
        ]
        .join("\n");
        let extraction = extractor()
            .extract(&transcript(&[(StageId::Delivery, content.as_str())]));

        assert_eq!(extraction.names(), vec!["pkg/mod.py"]);
        assert_eq!(extraction.failures.len(), 3);
        assert!(extraction
            .failures
            .iter()
            .all(|f| f.kind == ExtractionFailureKind::UnsafeName));
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let content = format!("{}\n{}", file_block("a.py", "1"), file_block("b.py", "2"));
        let t = transcript(&[(StageId::Implementation, content.as_str())]);
        let extractor = extractor();

        assert_eq!(extractor.extract(&t), extractor.extract(&t));
    }

    #[test]
    fn test_custom_delimiters() {
        let delimiters = DelimiterConfig {
            begin_prefix: "<<<FILE:".to_string(),
            begin_suffix: ">>>".to_string(),
            end_marker: "<<<END>>>".to_string(),
        };
        let extractor = ArtifactExtractor::new(&delimiters).unwrap();
        let content = delimiters.render("x.txt", "hello");
        let extraction = extractor.extract(&transcript(&[(StageId::Documentation, content.as_str())]));

        assert_eq!(extraction.get("x.txt").unwrap().as_text(), Some("hello"));
    }

    #[test]
    fn test_default_delimiters_build_through_checked_constructor() {
        let result = ArtifactExtractor::new(&DelimiterConfig::default());
        assert!(result.is_ok());
    }

    #[test]
    fn test_invalid_delimiters() {
        let mut delimiters = DelimiterConfig::default();
        delimiters.end_marker = String::new();
        assert!(ArtifactExtractor::new(&delimiters).is_err());

        let mut delimiters = DelimiterConfig::default();
        delimiters.begin_prefix = "BEGIN FILE".to_string();
        assert!(delimiters.validate().is_err());
    }

    #[test]
    fn test_fenced_without_blocks() {
        let t = transcript(&[
            (StageId::Requirements, "plain"),
            (StageId::Implementation, "```python\nprint(1)\n```"),
            (StageId::Implementation, "===BEGIN_FILE:a.py===\n```\n===END_FILE==="),
        ]);
        assert_eq!(extractor().fenced_without_blocks(&t), vec![1]);
    }
}
