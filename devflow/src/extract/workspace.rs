//! The directory generated files are written to.

use super::ExtractionFailure;
use crate::core::Artifact;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Directory name skipped when listing files.
pub(crate) const CACHE_DIR: &str = "__pycache__";

/// A directory holding the artifacts of a run.
///
/// Files are named exactly as their artifact names. There is no manifest and
/// no locking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Creates a handle for `root`. Nothing is touched on disk.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The workspace directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the directory if it is missing.
    pub async fn ensure(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root).await
    }

    /// Writes one artifact and returns its path.
    pub async fn write(&self, artifact: &Artifact) -> io::Result<PathBuf> {
        let path = self.root.join(&artifact.name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, &artifact.content).await?;
        Ok(path)
    }

    /// Writes every artifact, collecting failures instead of stopping.
    ///
    /// Returns the names that were written.
    pub async fn write_all(&self, artifacts: &[Artifact]) -> (Vec<String>, Vec<ExtractionFailure>) {
        let mut written = Vec::with_capacity(artifacts.len());
        let mut failures = Vec::new();

        if let Err(e) = self.ensure().await {
            warn!(root = %self.root.display(), "Could not create workspace: {}", e);
        }

        for artifact in artifacts {
            match self.write(artifact).await {
                Ok(path) => {
                    info!(
                        name = %artifact.name,
                        path = %path.display(),
                        bytes = artifact.len(),
                        "Saved artifact"
                    );
                    written.push(artifact.name.clone());
                }
                Err(e) => {
                    warn!(name = %artifact.name, "Failed to save artifact: {}", e);
                    failures.push(ExtractionFailure::write_failed(artifact, e.to_string()));
                }
            }
        }

        (written, failures)
    }

    /// Removes everything in the workspace and recreates the empty directory.
    pub async fn clear(&self) -> io::Result<()> {
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        self.ensure().await?;
        info!(root = %self.root.display(), "Workspace cleared");
        Ok(())
    }

    /// Relative paths of all files, sorted, skipping cache directories.
    ///
    /// A missing workspace lists as empty.
    pub async fn list_files(&self) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        if !fs::try_exists(&self.root).await? {
            return Ok(files);
        }

        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    if entry.file_name() != CACHE_DIR {
                        pending.push(path);
                    }
                } else if let Ok(relative) = path.strip_prefix(&self.root) {
                    files.push(relative.to_path_buf());
                }
            }
        }

        files.sort();
        Ok(files)
    }

    /// Deletes every `__pycache__` directory under the workspace.
    ///
    /// Returns how many were removed.
    pub async fn remove_cache_dirs(&self) -> io::Result<usize> {
        if !fs::try_exists(&self.root).await? {
            return Ok(0);
        }

        let mut removed = 0;
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                if !entry.file_type().await?.is_dir() {
                    continue;
                }
                if entry.file_name() == CACHE_DIR {
                    fs::remove_dir_all(entry.path()).await?;
                    debug!(path = %entry.path().display(), "Removed cache directory");
                    removed += 1;
                } else {
                    pending.push(entry.path());
                }
            }
        }
        Ok(removed)
    }
}
