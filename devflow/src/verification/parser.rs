//! Parsing of test runner summaries.

use regex::Regex;
use std::sync::LazyLock;

static UNITTEST_RAN: LazyLock<Regex> = LazyLock::new(|| re(r"(?m)^Ran (\d+) tests? in "));
static UNITTEST_FAILED: LazyLock<Regex> = LazyLock::new(|| re(r"(?m)^FAILED \(([^)]*)\)"));
static KEY_COUNT: LazyLock<Regex> = LazyLock::new(|| re(r"(failures|errors)=(\d+)"));
static PYTEST_COUNT: LazyLock<Regex> = LazyLock::new(|| re(r"(\d+) (passed|failed|errors?)\b"));

#[allow(clippy::expect_used)]
fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("summary patterns are string literals checked by the parser tests")
}

/// Counts read from a runner's output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestSummary {
    /// Tests executed.
    pub tests_run: u32,
    /// Failed tests.
    pub failures: u32,
    /// Errored tests.
    pub errors: u32,
}

/// Reads the summary from unittest output, falling back to pytest's format.
///
/// Returns `None` when neither format is recognized.
#[must_use]
pub fn parse_summary(output: &str) -> Option<TestSummary> {
    parse_unittest(output).or_else(|| parse_pytest(output))
}

fn parse_unittest(output: &str) -> Option<TestSummary> {
    let tests_run = UNITTEST_RAN
        .captures_iter(output)
        .last()
        .and_then(|c| c[1].parse().ok())?;

    let mut summary = TestSummary {
        tests_run,
        ..TestSummary::default()
    };

    if let Some(failed) = UNITTEST_FAILED.captures_iter(output).last() {
        for kv in KEY_COUNT.captures_iter(&failed[1]) {
            let count = kv[2].parse().unwrap_or(0);
            match &kv[1] {
                "failures" => summary.failures = count,
                _ => summary.errors = count,
            }
        }
    }

    Some(summary)
}

fn parse_pytest(output: &str) -> Option<TestSummary> {
    let line = output
        .lines()
        .rev()
        .find(|l| l.contains(" passed") || l.contains(" failed") || l.contains(" error"))?;

    let mut passed = 0u32;
    let mut summary = TestSummary::default();
    let mut matched = false;

    for caps in PYTEST_COUNT.captures_iter(line) {
        let count: u32 = caps[1].parse().unwrap_or(0);
        matched = true;
        match &caps[2] {
            "passed" => passed = count,
            "failed" => summary.failures = count,
            _ => summary.errors = count,
        }
    }

    if !matched {
        return None;
    }
    summary.tests_run = passed + summary.failures + summary.errors;
    Some(summary)
}
