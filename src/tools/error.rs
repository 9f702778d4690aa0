//! Tool error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during tool execution
///
/// These never escape the toolkit: every failure is flattened into the
/// `{error}` payload recorded on the tool call.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Path {path} is outside working directory {working_dir}")]
    SandboxViolation { path: PathBuf, working_dir: PathBuf },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("Dangerous command blocked: {fragment}")]
    CommandDenied { fragment: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
