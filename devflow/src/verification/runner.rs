//! Subprocess-based test capability.

use super::parser::parse_summary;
use super::{TestAggregate, TestCapability, TestOutcome};
use crate::core::TestStatus;
use crate::errors::{ConfigError, TestRunnerError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Settings for [`SubprocessTestRunner`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRunnerConfig {
    /// Program used to run each file.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    /// Arguments placed before the file path.
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    /// Extension of test files, without the dot.
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Per-file time budget.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_args() -> Vec<String> {
    vec!["-m".to_string(), "unittest".to_string(), "-v".to_string()]
}

fn default_extension() -> String {
    "py".to_string()
}

fn default_timeout_seconds() -> u64 {
    60
}

impl Default for TestRunnerConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            args: default_args(),
            extension: default_extension(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl TestRunnerConfig {
    /// Sets the interpreter and its arguments.
    #[must_use]
    pub fn with_command(mut self, interpreter: impl Into<String>, args: Vec<String>) -> Self {
        self.interpreter = interpreter.into();
        self.args = args;
        self
    }

    /// Sets the test file extension.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Sets the per-file timeout.
    #[must_use]
    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// The per-file timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty interpreter or extension, or a zero timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interpreter.trim().is_empty() {
            return Err(ConfigError::invalid_value("test_runner.interpreter", "must not be empty"));
        }
        if self.extension.trim().is_empty() || self.extension.contains('.') {
            return Err(ConfigError::invalid_value(
                "test_runner.extension",
                "must be a bare extension such as 'py'",
            ));
        }
        if self.timeout_seconds == 0 {
            return Err(ConfigError::invalid_value("test_runner.timeout_seconds", "must be positive"));
        }
        Ok(())
    }

    fn is_test_file(&self, file_name: &str) -> bool {
        let Some(stem) = file_name.strip_suffix(&format!(".{}", self.extension)) else {
            return false;
        };
        (stem.starts_with("test_") && stem.len() > "test_".len())
            || (stem.ends_with("_test") && stem.len() > "_test".len())
    }
}

/// Runs each discovered test file in its own child process.
#[derive(Debug, Clone, Default)]
pub struct SubprocessTestRunner {
    config: TestRunnerConfig,
}

impl SubprocessTestRunner {
    /// Creates a runner.
    #[must_use]
    pub fn new(config: TestRunnerConfig) -> Self {
        Self { config }
    }

    /// The runner's settings.
    #[must_use]
    pub fn config(&self) -> &TestRunnerConfig {
        &self.config
    }

    /// Finds test files under `workspace`, as sorted relative paths.
    ///
    /// Hidden directories and `__pycache__` are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the workspace is missing or cannot be read.
    pub async fn discover(&self, workspace: &Path) -> Result<Vec<PathBuf>, TestRunnerError> {
        if !tokio::fs::try_exists(workspace).await.unwrap_or(false) {
            return Err(TestRunnerError::WorkspaceMissing {
                path: workspace.to_path_buf(),
            });
        }

        let mut found = Vec::new();
        let mut pending = vec![workspace.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let discovery = |source| TestRunnerError::Discovery {
                path: dir.clone(),
                source,
            };
            let mut entries = tokio::fs::read_dir(&dir).await.map_err(discovery)?;
            while let Some(entry) = entries.next_entry().await.map_err(discovery)? {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                let file_type = entry.file_type().await.map_err(discovery)?;

                if file_type.is_dir() {
                    if !name.starts_with('.') && name != crate::extract::CACHE_DIR {
                        pending.push(entry.path());
                    }
                } else if self.config.is_test_file(&name) {
                    if let Ok(relative) = entry.path().strip_prefix(workspace) {
                        found.push(relative.to_path_buf());
                    }
                }
            }
        }

        found.sort();
        Ok(found)
    }

    async fn run_file(&self, workspace: &Path, file: &Path) -> TestOutcome {
        let shown = file.to_string_lossy().replace('\\', "/");
        debug!(file = %shown, interpreter = %self.config.interpreter, "Running test file");

        let child = Command::new(&self.config.interpreter)
            .args(&self.config.args)
            .arg(file)
            .current_dir(workspace)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let mut outcome = TestOutcome {
            file: shown,
            status: TestStatus::Error,
            tests_run: 0,
            failures: 0,
            errors: 0,
            output: String::new(),
        };

        let output = match tokio::time::timeout(self.config.timeout(), child).await {
            Err(_) => {
                warn!(file = %outcome.file, timeout_s = self.config.timeout_seconds, "Test file timed out");
                outcome.status = TestStatus::Timeout;
                outcome.output = format!("timed out after {}s", self.config.timeout_seconds);
                return outcome;
            }
            Ok(Err(e)) => {
                warn!(file = %outcome.file, "Could not start test process: {}", e);
                outcome.output = format!("failed to run '{}': {e}", self.config.interpreter);
                return outcome;
            }
            Ok(Ok(output)) => output,
        };

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        let summary = parse_summary(&text).unwrap_or_default();

        outcome.tests_run = summary.tests_run;
        outcome.failures = summary.failures;
        outcome.errors = summary.errors;
        outcome.status = if output.status.success() {
            TestStatus::Passed
        } else if summary.failures > 0 || summary.errors > 0 {
            TestStatus::Failed
        } else {
            TestStatus::Error
        };
        outcome.output = text;

        if outcome.status == TestStatus::Passed {
            debug!(file = %outcome.file, tests = outcome.tests_run, "Test file passed");
        } else {
            warn!(
                file = %outcome.file,
                status = %outcome.status,
                failures = outcome.failures,
                errors = outcome.errors,
                "Test file did not pass"
            );
        }
        outcome
    }
}

#[async_trait]
impl TestCapability for SubprocessTestRunner {
    async fn run_tests(&self, workspace: &Path) -> Result<TestAggregate, TestRunnerError> {
        let files = self.discover(workspace).await?;
        if files.is_empty() {
            info!(workspace = %workspace.display(), "No test files found");
            return Ok(TestAggregate::no_tests());
        }

        info!(count = files.len(), "Running generated tests");
        let mut outcomes = Vec::with_capacity(files.len());
        for file in &files {
            outcomes.push(self.run_file(workspace, file).await);
        }

        let aggregate = TestAggregate::from_outcomes(outcomes);
        info!(
            status = %aggregate.status,
            total = aggregate.total_tests,
            passed = aggregate.total_passed,
            failed = aggregate.total_failed,
            errors = aggregate.total_errors,
            "Test execution completed"
        );
        Ok(aggregate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AggregateStatus;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "").unwrap();
    }

    #[test]
    fn test_is_test_file() {
        let config = TestRunnerConfig::default();
        assert!(config.is_test_file("test_calc.py"));
        assert!(config.is_test_file("calc_test.py"));
        assert!(!config.is_test_file("calc.py"));
        assert!(!config.is_test_file("test_.py"));
        assert!(!config.is_test_file("test_calc.pyc"));
        assert!(!config.is_test_file("testing.py"));
    }

    #[tokio::test]
    async fn test_discover_skips_hidden_and_cache() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "test_b.py");
        touch(root, "pkg/a_test.py");
        touch(root, "calc.py");
        touch(root, ".venv/test_vendor.py");
        touch(root, "__pycache__/test_b.py");

        let files = SubprocessTestRunner::default().discover(root).await.unwrap();

        assert_eq!(files, vec![PathBuf::from("pkg/a_test.py"), PathBuf::from("test_b.py")]);
    }

    #[tokio::test]
    async fn test_missing_workspace_is_error() {
        let dir = TempDir::new().unwrap();
        let err = SubprocessTestRunner::default()
            .run_tests(&dir.path().join("missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, TestRunnerError::WorkspaceMissing { .. }));
    }

    #[tokio::test]
    async fn test_empty_workspace_is_no_tests() {
        let dir = TempDir::new().unwrap();
        let aggregate = SubprocessTestRunner::default().run_tests(dir.path()).await.unwrap();
        assert_eq!(aggregate.status, AggregateStatus::NoTests);
    }

    #[test]
    fn test_config_validation() {
        assert!(TestRunnerConfig::default().validate().is_ok());
        assert!(TestRunnerConfig::default().with_timeout_seconds(0).validate().is_err());
        assert!(TestRunnerConfig::default().with_extension(".py").validate().is_err());
    }

    #[test]
    fn test_config_defaults_from_json() {
        let config: TestRunnerConfig = serde_json::from_str(r#"{"timeout_seconds": 5}"#).unwrap();
        assert_eq!(config.interpreter, "python3");
        assert_eq!(config.args, vec!["-m", "unittest", "-v"]);
        assert_eq!(config.timeout(), Duration::from_secs(5));
    }

    #[cfg(unix)]
    mod subprocess {
        use super::*;
        use pretty_assertions::assert_eq;

        fn sh_runner(timeout_seconds: u64) -> SubprocessTestRunner {
            SubprocessTestRunner::new(
                TestRunnerConfig::default()
                    .with_command("sh", Vec::new())
                    .with_extension("sh")
                    .with_timeout_seconds(timeout_seconds),
            )
        }

        #[tokio::test]
        async fn test_runs_and_aggregates_files() {
            let dir = TempDir::new().unwrap();
            std::fs::write(
                dir.path().join("test_ok.sh"),
                "echo 'Ran 3 tests in 0.001s'\necho\necho OK\n",
            )
            .unwrap();
            std::fs::write(
                dir.path().join("test_bad.sh"),
                "echo 'Ran 3 tests in 0.002s' >&2\necho 'FAILED (failures=2)' >&2\nexit 1\n",
            )
            .unwrap();

            let aggregate = sh_runner(10).run_tests(dir.path()).await.unwrap();

            assert_eq!(aggregate.status, AggregateStatus::Failed);
            assert_eq!(aggregate.total_tests, 6);
            assert_eq!(aggregate.total_passed, 4);
            assert_eq!(aggregate.total_failed, 2);
            assert_eq!(aggregate.per_file[0].file, "test_bad.sh");
            assert_eq!(aggregate.per_file[0].status, TestStatus::Failed);
            assert_eq!(aggregate.per_file[1].status, TestStatus::Passed);
        }

        #[tokio::test]
        async fn test_nonzero_exit_without_counts_is_error() {
            let dir = TempDir::new().unwrap();
            std::fs::write(dir.path().join("test_syntax.sh"), "echo 'SyntaxError' >&2\nexit 2\n").unwrap();

            let aggregate = sh_runner(10).run_tests(dir.path()).await.unwrap();

            assert_eq!(aggregate.per_file[0].status, TestStatus::Error);
            assert!(aggregate.per_file[0].output.contains("SyntaxError"));
            assert_eq!(aggregate.status, AggregateStatus::Failed);
        }

        #[tokio::test]
        async fn test_timeout_is_reported() {
            let dir = TempDir::new().unwrap();
            std::fs::write(dir.path().join("test_slow.sh"), "sleep 10\n").unwrap();

            let aggregate = sh_runner(1).run_tests(dir.path()).await.unwrap();

            assert_eq!(aggregate.per_file[0].status, TestStatus::Timeout);
        }

        #[tokio::test]
        async fn test_missing_interpreter_is_error_outcome() {
            let dir = TempDir::new().unwrap();
            std::fs::write(dir.path().join("test_x.sh"), "").unwrap();
            let runner = SubprocessTestRunner::new(
                TestRunnerConfig::default()
                    .with_command("definitely-not-a-real-interpreter", Vec::new())
                    .with_extension("sh"),
            );

            let aggregate = runner.run_tests(dir.path()).await.unwrap();

            assert_eq!(aggregate.per_file[0].status, TestStatus::Error);
        }
    }
}
