//! ToolContext - execution context shared by all tools of one task
//!
//! Confines every path to the task's working directory and buffers the
//! file changes a single iteration makes. The loop drains the buffer at
//! iteration end and attaches it to the iteration record.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::ToolError;
use crate::domain::FileChange;

#[derive(Clone)]
pub struct ToolContext {
    /// All file and shell operations are confined here
    working_dir: PathBuf,

    /// File changes made since the last drain
    changes: Arc<Mutex<Vec<FileChange>>>,
}

impl ToolContext {
    pub fn new(working_dir: PathBuf) -> Self {
        Self {
            working_dir,
            changes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Resolve a path and verify it stays inside the working directory.
    ///
    /// The check runs on the canonical form, after symlink resolution, so a
    /// symlink pointing outside the root cannot smuggle an escape. For paths
    /// that do not exist yet the nearest existing parent is canonicalized
    /// instead.
    pub fn confine_path(&self, path: &Path) -> Result<PathBuf, ToolError> {
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir.join(path)
        };

        let canonical = if joined.exists() {
            joined.canonicalize().unwrap_or_else(|_| joined.clone())
        } else if let Some(parent) = joined.parent() {
            if parent.exists() {
                let canonical_parent = parent.canonicalize().unwrap_or_else(|_| parent.to_path_buf());
                canonical_parent.join(joined.file_name().unwrap_or_default())
            } else {
                joined.clone()
            }
        } else {
            joined.clone()
        };

        let root = self.working_dir.canonicalize().unwrap_or_else(|_| self.working_dir.clone());

        if canonical.starts_with(&root) {
            Ok(canonical)
        } else {
            Err(ToolError::SandboxViolation {
                path: path.to_path_buf(),
                working_dir: self.working_dir.clone(),
            })
        }
    }

    /// Record a file change into the current iteration's buffer
    pub async fn record_change(&self, change: FileChange) {
        self.changes.lock().await.push(change);
    }

    /// Take all buffered changes, leaving the buffer empty
    pub async fn drain_changes(&self) -> Vec<FileChange> {
        std::mem::take(&mut *self.changes.lock().await)
    }
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext").field("working_dir", &self.working_dir).finish()
    }
}
