//! Apply results

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

use crate::guard::PathViolation;
use crate::instruction::Action;

/// Why one instruction was not applied
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("path violation: {violation}")]
    PathViolation { violation: PathViolation },

    #[error("'{path}' does not exist; a ranged replace needs an existing file")]
    TargetMissing { path: String },

    #[error("lines {start}-{end} are out of range for '{path}' ({line_count} lines)")]
    InvalidRange {
        path: String,
        start: usize,
        end: usize,
        line_count: usize,
    },

    #[error("I/O failure on '{path}': {message}")]
    IoFailure { path: String, message: String },
}

impl FailureReason {
    pub fn io(path: impl Into<String>, err: &std::io::Error) -> Self {
        FailureReason::IoFailure {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Short machine-readable kind
    pub fn kind(&self) -> &'static str {
        match self {
            FailureReason::PathViolation { .. } => "path_violation",
            FailureReason::TargetMissing { .. } => "target_missing",
            FailureReason::InvalidRange { .. } => "invalid_range",
            FailureReason::IoFailure { .. } => "io_failure",
        }
    }

    pub fn is_security(&self) -> bool {
        matches!(self, FailureReason::PathViolation { .. })
    }
}

impl From<PathViolation> for FailureReason {
    fn from(violation: PathViolation) -> Self {
        FailureReason::PathViolation { violation }
    }
}

/// A successful (or, in a dry run, would-be) file change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedChange {
    pub file_path: String,
    pub resolved_path: PathBuf,
    pub action: Action,
    /// The file did not exist before
    pub created: bool,
    pub lines_before: usize,
    pub lines_after: usize,
    pub bytes_written: usize,
    /// Content before the change; `None` when `created`
    #[serde(skip)]
    pub previous: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ApplyOutcome {
    Applied(AppliedChange),
    Failed { reason: FailureReason },
}

/// Result for one instruction, in document order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyEntry {
    pub index: usize,
    pub file_path: String,
    pub action: Action,
    pub outcome: ApplyOutcome,
}

impl ApplyEntry {
    pub fn change(&self) -> Option<&AppliedChange> {
        match &self.outcome {
            ApplyOutcome::Applied(change) => Some(change),
            ApplyOutcome::Failed { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        match &self.outcome {
            ApplyOutcome::Applied(_) => None,
            ApplyOutcome::Failed { reason } => Some(reason),
        }
    }

    pub fn is_applied(&self) -> bool {
        self.change().is_some()
    }
}

/// Per-instruction report of a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyReport {
    pub entries: Vec<ApplyEntry>,
    /// Nothing was written
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplySummary {
    pub total: usize,
    pub applied: usize,
    pub failed: usize,
    pub created: usize,
}

impl fmt::Display for ApplySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} applied, {} failed", self.applied, self.failed)?;
        if self.created > 0 {
            write!(f, " ({} created)", self.created)?;
        }
        Ok(())
    }
}

/// Outcome of [`ApplyReport::rollback`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackOutcome {
    pub restored: usize,
    pub failures: Vec<FailureReason>,
}

impl RollbackOutcome {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl ApplyReport {
    pub fn new(dry_run: bool) -> Self {
        Self {
            entries: Vec::new(),
            dry_run,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn applied(&self) -> impl Iterator<Item = &AppliedChange> {
        self.entries.iter().filter_map(ApplyEntry::change)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&ApplyEntry, &FailureReason)> {
        self.entries
            .iter()
            .filter_map(|entry| entry.failure().map(|reason| (entry, reason)))
    }

    /// Every instruction applied
    pub fn is_success(&self) -> bool {
        self.entries.iter().all(ApplyEntry::is_applied)
    }

    pub fn summary(&self) -> ApplySummary {
        let applied = self.applied().count();
        ApplySummary {
            total: self.entries.len(),
            applied,
            failed: self.entries.len() - applied,
            created: self.applied().filter(|c| c.created).count(),
        }
    }

    /// Distinct changed paths, first occurrence order
    pub fn changed_files(&self) -> Vec<&str> {
        let mut files: Vec<&str> = Vec::new();
        for change in self.applied() {
            if !files.contains(&change.file_path.as_str()) {
                files.push(&change.file_path);
            }
        }
        files
    }

    /// Undo every applied change, newest first
    ///
    /// Created files are removed; modified files get their previous content
    /// back. Directories created along the way are left in place. A dry-run
    /// report has nothing to undo.
    pub fn rollback(&self) -> RollbackOutcome {
        let mut outcome = RollbackOutcome::default();
        if self.dry_run {
            return outcome;
        }

        for change in self.applied().collect::<Vec<_>>().into_iter().rev() {
            let path = &change.resolved_path;
            let result = match (&change.previous, change.created) {
                (_, true) => match std::fs::remove_file(path) {
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                    other => other,
                },
                (Some(previous), false) => std::fs::write(path, previous),
                (None, false) => Ok(()),
            };

            match result {
                Ok(()) => outcome.restored += 1,
                Err(e) => {
                    warn!("rollback of {} failed: {}", change.file_path, e);
                    outcome.failures.push(FailureReason::io(&change.file_path, &e));
                }
            }
        }

        info!(
            "rolled back {} changes ({} failures)",
            outcome.restored,
            outcome.failures.len()
        );
        outcome
    }
}
