//! Error taxonomy for the import pipeline.
//!
//! `PathNotFound` and `StoreUnavailable` abort a run. `Parse` and
//! `MissingKeyField` are recorded in the [`ImportReport`](crate::import::ImportReport)
//! and the run carries on.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("import root does not exist or is not a directory: {}", .0.display())]
    PathNotFound(PathBuf),
    #[error("failed to parse {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },
    #[error("record has no `{field}` field")]
    MissingKeyField { field: String },
    #[error("document store unavailable: {0:#}")]
    StoreUnavailable(anyhow::Error),
}

impl ImportError {
    pub fn parse(path: &Path, reason: impl Display) -> Self {
        ImportError::Parse {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Whether the whole run must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ImportError::PathNotFound(_) | ImportError::StoreUnavailable(_)
        )
    }
}
