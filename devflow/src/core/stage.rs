//! Stage identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifies one participant of the pipeline.
///
/// The set is closed: a pipeline configuration picks an ordered subset of the
/// content stages, and [`StageId::Start`] always carries the user request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    /// Designated start stage holding the original request.
    Start,
    /// Turns the request into requirements.
    Requirements,
    /// Writes the code.
    Implementation,
    /// Reviews the code and approves it or asks for rework.
    Review,
    /// Writes the documentation.
    Documentation,
    /// Writes the tests.
    Verification,
    /// Writes deployment files.
    Delivery,
    /// Designs the user interface.
    Interface,
}

impl StageId {
    /// Every stage, start included, in canonical pipeline order.
    pub const ALL: [Self; 8] = [
        Self::Start,
        Self::Requirements,
        Self::Implementation,
        Self::Review,
        Self::Documentation,
        Self::Verification,
        Self::Delivery,
        Self::Interface,
    ];

    /// Returns the snake_case identifier.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Requirements => "requirements",
            Self::Implementation => "implementation",
            Self::Review => "review",
            Self::Documentation => "documentation",
            Self::Verification => "verification",
            Self::Delivery => "delivery",
            Self::Interface => "interface",
        }
    }

    /// Returns true for the designated start stage.
    #[must_use]
    pub fn is_start(self) -> bool {
        matches!(self, Self::Start)
    }

    /// Progress label used when this stage is about to run.
    #[must_use]
    pub fn action_label(self) -> &'static str {
        match self {
            Self::Start => "starting",
            Self::Requirements => "analyzing",
            Self::Implementation => "coding",
            Self::Review => "reviewing",
            Self::Documentation => "documenting",
            Self::Verification => "testing",
            Self::Delivery => "deploying",
            Self::Interface => "designing",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == normalized)
            .ok_or_else(|| format!("unknown stage '{s}'"))
    }
}
