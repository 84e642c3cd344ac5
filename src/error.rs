//! Error types shared across modules. Each layer owns its own enum; the
//! command layer wraps them in `anyhow` with context.
use std::path::PathBuf;

use crate::executor::{ExecutorError, SubmitError};
use crate::ledger::LedgerError;
use crate::metadata::MetadataError;
use crate::remote::RemoteError;

/// JSON files on disk (config, library index).
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to access {}: {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },
    #[error("invalid JSON in {}: {source}", path.display())]
    Json { path: PathBuf, source: serde_json::Error },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid name substitutions: {0}")]
    Substitutions(String),
    #[error("max concurrency must be at least 1, got {0}")]
    Concurrency(usize),
    #[error("no file extensions configured")]
    NoExtensions,
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("cannot read directory {}: {source}", path.display())]
    Io { path: PathBuf, source: std::io::Error },

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("upload declined by user")]
    Declined,

    #[error("{} upload(s) failed in {}: {}", failures.len(), dir.display(), failures.first().map(String::as_str).unwrap_or(""))]
    Upload { dir: PathBuf, failures: Vec<String> },

    #[error("{submitted} upload task(s) submitted in {} but only {finished} reported back", dir.display())]
    LostTasks { dir: PathBuf, submitted: usize, finished: usize },

    #[error("album '{album}' rejected all {count} item(s) of a batch: {first_error}")]
    BatchRejected { album: String, count: usize, first_error: String },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}
