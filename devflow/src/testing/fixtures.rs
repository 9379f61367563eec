//! Fixtures for building stage output and test results.

use crate::core::{StageId, TestStatus};
use crate::extract::DelimiterConfig;
use crate::verification::TestOutcome;

/// Renders a file block with the default delimiters.
#[must_use]
pub fn file_block(name: &str, body: &str) -> String {
    DelimiterConfig::default().render(name, body)
}

/// A passing outcome for `file` with `tests_run` tests.
#[must_use]
pub fn passing_outcome(file: &str, tests_run: u32) -> TestOutcome {
    TestOutcome {
        file: file.to_string(),
        status: TestStatus::Passed,
        tests_run,
        failures: 0,
        errors: 0,
        output: format!("Ran {tests_run} tests in 0.001s\n\nOK\n"),
    }
}

/// Speakers of an approved run through the standard pipeline.
#[must_use]
pub fn standard_sequence() -> Vec<StageId> {
    StageId::ALL.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_block_format() {
        assert_eq!(
            file_block("calc.py", "x = 1"),
            "===BEGIN_FILE:calc.py===\nx = 1\n===END_FILE==="
        );
    }

    #[test]
    fn test_standard_sequence_starts_with_request() {
        let sequence = standard_sequence();
        assert_eq!(sequence.first(), Some(&StageId::Start));
        assert_eq!(sequence.last(), Some(&StageId::Interface));
        assert_eq!(sequence.len(), 8);
    }
}
