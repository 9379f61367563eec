//! Request validation.

use crate::errors::{ConfigError, WorkflowError};
use serde::{Deserialize, Serialize};

/// Bounds on the natural-language request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestLimits {
    /// Maximum length in characters, after trimming.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

fn default_max_chars() -> usize {
    5000
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
        }
    }
}

impl RequestLimits {
    /// Sets the maximum length.
    #[must_use]
    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    pub(crate) fn validate(self) -> Result<(), ConfigError> {
        if self.max_chars == 0 {
            return Err(ConfigError::invalid_value("request_limits.max_chars", "must be positive"));
        }
        Ok(())
    }
}

/// Checks a request and returns it trimmed.
///
/// # Errors
///
/// Returns [`WorkflowError::InvalidRequest`] for a blank or oversized request.
pub fn validate_request(request: &str, limits: RequestLimits) -> Result<&str, WorkflowError> {
    let trimmed = request.trim();
    if trimmed.is_empty() {
        return Err(WorkflowError::InvalidRequest("request must not be empty".to_string()));
    }
    let chars = trimmed.chars().count();
    if chars > limits.max_chars {
        return Err(WorkflowError::InvalidRequest(format!(
            "request is too long ({chars} characters, maximum {})",
            limits.max_chars
        )));
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_request_is_trimmed() {
        let request = validate_request("  build a calculator \n", RequestLimits::default()).unwrap();
        assert_eq!(request, "build a calculator");
    }

    #[test]
    fn test_blank_request_rejected() {
        for request in ["", "   ", "\n\t"] {
            let err = validate_request(request, RequestLimits::default()).unwrap_err();
            assert_eq!(err.to_result_message(), "InvalidRequest: request must not be empty");
        }
    }

    #[test]
    fn test_length_counted_in_chars() {
        let limits = RequestLimits::default().with_max_chars(3);
        assert!(validate_request("äöü", limits).is_ok());
        let err = validate_request("äöüß", limits).unwrap_err();
        assert!(err.to_string().contains("4 characters"));
    }

    #[test]
    fn test_zero_limit_invalid() {
        assert!(RequestLimits::default().with_max_chars(0).validate().is_err());
    }
}
