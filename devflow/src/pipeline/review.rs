//! Classification of reviewer output.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The reviewer's decision, parsed from free-form text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewVerdict {
    /// The rework marker was present.
    Rework,
    /// The approval marker was present and the rework marker was not.
    Approved,
    /// Neither marker was present.
    Ambiguous,
}

impl fmt::Display for ReviewVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rework => write!(f, "rework"),
            Self::Approved => write!(f, "approved"),
            Self::Ambiguous => write!(f, "ambiguous"),
        }
    }
}

/// How to treat a review that carries neither marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguousReviewPolicy {
    /// Treat as approved and move on.
    #[default]
    FailOpen,
    /// Treat as a rework request.
    FailClosed,
}

impl AmbiguousReviewPolicy {
    /// The verdict an ambiguous review resolves to under this policy.
    #[must_use]
    pub fn resolve(self) -> ReviewVerdict {
        match self {
            Self::FailOpen => ReviewVerdict::Approved,
            Self::FailClosed => ReviewVerdict::Rework,
        }
    }
}

/// Marker tokens a reviewer uses to signal its decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewMarkers {
    /// Token requesting rework.
    #[serde(default = "default_rework")]
    pub rework: String,
    /// Token approving the work.
    #[serde(default = "default_approval")]
    pub approval: String,
}

fn default_rework() -> String {
    "FIX_REQUIRED".to_string()
}

fn default_approval() -> String {
    "APPROVED".to_string()
}

impl Default for ReviewMarkers {
    fn default() -> Self {
        Self {
            rework: default_rework(),
            approval: default_approval(),
        }
    }
}

impl ReviewMarkers {
    /// Creates markers with custom tokens.
    #[must_use]
    pub fn new(rework: impl Into<String>, approval: impl Into<String>) -> Self {
        Self {
            rework: rework.into(),
            approval: approval.into(),
        }
    }

    /// Classifies reviewer output. The rework marker wins when both appear.
    #[must_use]
    pub fn classify(&self, content: &str) -> ReviewVerdict {
        if content.contains(&self.rework) {
            ReviewVerdict::Rework
        } else if content.contains(&self.approval) {
            ReviewVerdict::Approved
        } else {
            ReviewVerdict::Ambiguous
        }
    }

    /// Validates the markers.
    ///
    /// # Errors
    ///
    /// Returns an error if a marker is blank or the two markers are equal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rework.trim().is_empty() {
            return Err(ConfigError::invalid_value("markers.rework", "must not be blank"));
        }
        if self.approval.trim().is_empty() {
            return Err(ConfigError::invalid_value("markers.approval", "must not be blank"));
        }
        if self.rework == self.approval {
            return Err(ConfigError::invalid_value(
                "markers",
                "rework and approval markers must differ",
            ));
        }
        Ok(())
    }
}
