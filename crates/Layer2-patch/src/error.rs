//! Setup errors
//!
//! Per-instruction failures are [`crate::FailureReason`]s inside a report;
//! `PatchError` only covers building an applier.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("workspace root {} is not accessible: {source}", .path.display())]
    InvalidRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("workspace root {} is not a directory", .0.display())]
    RootNotDirectory(PathBuf),

    #[error("invalid protected path pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}
